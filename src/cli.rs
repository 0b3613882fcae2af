use clap::Parser;
use guess_rent::*;
use rand::Rng;
use std::path::PathBuf;

/// 用随机出价模拟一局猜租金游戏
#[derive(Parser, Debug)]
#[command(name = "guess-rent", version, about)]
struct Args {
    /// 房源 JSON 文件，缺省时使用内置演示房源
    listings: Option<PathBuf>,

    /// 提交成绩使用的用户名
    #[arg(long, default_value = "guest")]
    username: String,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let username = args.username;

    let settings = Settings::default();
    let source: Box<dyn ListingSource> = match &args.listings {
        Some(path) => Box::new(JsonFileSource::new(path, settings.max_listings)),
        None => Box::new(StaticSource::new(demo_listings())),
    };

    // 开始一局游戏并加载房源
    let mut session = Session::new();
    session.begin()?;
    if let Phase::Failed { cause } = session.load_from(source.as_ref())? {
        anyhow::bail!("无法开始游戏：{}", cause);
    }

    let mut rng = rand::thread_rng();
    while let Some(listing) = session.current_listing() {
        // 在真实租金上下 40% 内随机出价
        let rent = listing.rent;
        let guess = ((rent * rng.gen_range(0.6..1.4)).round() as u32).max(1);
        println!("第 {} 套：{}（{}）", session.current_index() + 1, listing.name, listing.address);

        let result = session.submit_guess(guess)?;
        println!(
            "  出价 ${}，实际 ${}，相差 ${}（{}%）{}",
            result.user_guess(),
            result.actual_rent(),
            result.difference(),
            result.percentage_diff(),
            if result.is_correct() { "，猜中了！" } else { "" }
        );

        session.proceed()?;
    }

    let accuracy = session
        .accuracy()
        .ok_or_else(|| anyhow::anyhow!("session did not complete"))?;
    println!(
        "共 {} 轮，平均误差 {:.1}%，准确率 {:.1}%；",
        session.percentage_diffs().len(),
        100.0 - accuracy,
        accuracy
    );

    // AI 基准成绩写入排行榜，然后提交玩家成绩
    let store = ScoreStore::new(settings.username_max_len);
    let baselines = agent_baselines(session.listings());
    for baseline in &baselines {
        println!(
            "{}：{} 套有效估价，平均误差 {:.1}%，准确率 {:.1}%；",
            baseline.name, baseline.predictions, baseline.mean_error, baseline.score
        );
    }
    store.seed_agents(&baselines)?;

    let user = store.create_user(&username)?;
    let entry = store.submit_score(&user.id, score_value(accuracy) as i64)?;

    let scores = store.scores(LeaderboardScope::Today, chrono::Utc::now());
    let board = Leaderboard::new(&scores, &settings.agents);
    println!("今日排行榜：");
    for ranked in board.top_humans_with_agents(settings.leaderboard_top_humans) {
        println!(
            "{}. {}{}：{}%",
            ranked.display_rank,
            ranked.entry.username,
            if ranked.is_ai_agent { "（AI）" } else { "" },
            ranked.entry.score_value
        );
    }

    if let Some(rank) = board.rank_of(&entry.id) {
        println!("你排在第 {} 名。", rank);
    }
    if beat_all_agents(accuracy, &scores, &settings.agents) {
        println!("你战胜了所有 AI 模型！");
    } else {
        println!("还没有战胜所有 AI 模型。");
    }

    Ok(())
}
