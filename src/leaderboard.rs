use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 持久化层返回的一条分数记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    /// 0 到 100 的准确率
    pub score_value: u8,
    pub created_at: DateTime<Utc>,
}

/// 排好名次的分数记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    #[serde(flatten)]
    pub entry: ScoreEntry,

    /// 在全部记录中的名次，从 1 开始
    pub display_rank: usize,

    /// 是否为 AI 模型
    pub is_ai_agent: bool,
}

/// 作为基准的 AI 模型名单，用户名包含其中任一名字即视为 AI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct AgentRoster {
    names: Vec<String>,
}

impl Default for AgentRoster {
    fn default() -> Self {
        Self::new(["Sonnet 4", "GPT-4.1", "Gemini 2.5 Pro"])
    }
}

impl AgentRoster {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut roster = Self { names: vec![] };
        for name in names {
            let name = name.into();
            let name = name.trim();
            // 空名字会匹配所有用户
            if !name.is_empty() && !roster.names.iter().any(|n| n == name) {
                roster.names.push(name.to_string());
            }
        }
        roster
    }

    /// 空名单
    pub fn empty() -> Self {
        Self { names: vec![] }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn is_agent(&self, username: &str) -> bool {
        self.names.iter().any(|name| username.contains(name.as_str()))
    }
}

impl From<Vec<String>> for AgentRoster {
    fn from(names: Vec<String>) -> Self {
        Self::new(names)
    }
}

impl From<AgentRoster> for Vec<String> {
    fn from(roster: AgentRoster) -> Self {
        roster.names
    }
}

/// 按分数从高到低排名，同分保持输入顺序
pub fn rank(entries: &[ScoreEntry], agents: &AgentRoster) -> Vec<RankedEntry> {
    let mut sorted: Vec<&ScoreEntry> = entries.iter().collect();
    // sort_by 是稳定排序
    sorted.sort_by(|a, b| b.score_value.cmp(&a.score_value));

    sorted
        .into_iter()
        .enumerate()
        .map(|(position, entry)| RankedEntry {
            entry: entry.clone(),
            display_rank: position + 1,
            is_ai_agent: agents.is_agent(&entry.username),
        })
        .collect()
}

/// 玩家是否严格高于所有 AI 模型的分数
///
/// 没有任何 AI 记录时视为胜出。
pub fn beat_all_agents(human_accuracy: f64, entries: &[ScoreEntry], agents: &AgentRoster) -> bool {
    entries
        .iter()
        .filter(|entry| agents.is_agent(&entry.username))
        .all(|entry| human_accuracy > f64::from(entry.score_value))
}

/// 一次排名的结果
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Leaderboard {
    entries: Vec<RankedEntry>,
}

impl Leaderboard {
    pub fn new(entries: &[ScoreEntry], agents: &AgentRoster) -> Self {
        Self {
            entries: rank(entries, agents),
        }
    }

    /// 全部记录，按名次排列
    pub fn entries(&self) -> &[RankedEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn humans(&self) -> impl Iterator<Item = &RankedEntry> {
        self.entries.iter().filter(|e| !e.is_ai_agent)
    }

    pub fn agents(&self) -> impl Iterator<Item = &RankedEntry> {
        self.entries.iter().filter(|e| e.is_ai_agent)
    }

    /// 前 `n` 名玩家加上所有 AI 模型，名次仍是全局名次
    pub fn top_humans_with_agents(&self, n: usize) -> Vec<&RankedEntry> {
        let mut humans = 0;
        self.entries
            .iter()
            .filter(|e| {
                if e.is_ai_agent {
                    true
                } else if humans < n {
                    humans += 1;
                    true
                } else {
                    false
                }
            })
            .collect()
    }

    /// 某条分数记录的名次
    pub fn rank_of(&self, score_id: &Uuid) -> Option<usize> {
        self.entries
            .iter()
            .find(|e| e.entry.id == *score_id)
            .map(|e| e.display_rank)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn entry(username: &str, score_value: u8) -> ScoreEntry {
        ScoreEntry {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            username: username.to_string(),
            score_value,
            created_at: Utc::now(),
        }
    }

    fn sonnet() -> AgentRoster {
        AgentRoster::new(["Sonnet4"])
    }

    #[test]
    fn ranks_descending_and_stable_on_ties() {
        let entries = vec![entry("A", 80), entry("AI-Sonnet4", 90), entry("B", 80)];
        let ranked = rank(&entries, &sonnet());

        let order: Vec<_> = ranked
            .iter()
            .map(|e| (e.entry.username.as_str(), e.display_rank, e.is_ai_agent))
            .collect();
        assert_eq!(
            order,
            vec![("AI-Sonnet4", 1, true), ("A", 2, false), ("B", 3, false)]
        );
    }

    #[test]
    fn ties_keep_input_order() {
        let entries = vec![entry("C", 50), entry("A", 50), entry("B", 50)];
        let ranked = rank(&entries, &AgentRoster::empty());
        let names: Vec<_> = ranked.iter().map(|e| e.entry.username.as_str()).collect();
        assert_eq!(names, vec!["C", "A", "B"]);
        let ranks: Vec<_> = ranked.iter().map(|e| e.display_rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[test]
    fn beat_all_agents_is_strict() {
        let entries = vec![entry("A", 80), entry("AI-Sonnet4", 90), entry("B", 80)];
        assert!(!beat_all_agents(85.0, &entries, &sonnet()));
        assert!(!beat_all_agents(90.0, &entries, &sonnet()));
        assert!(beat_all_agents(90.5, &entries, &sonnet()));
        assert!(beat_all_agents(95.0, &entries, &sonnet()));
    }

    #[test]
    fn beat_all_agents_without_agents_is_true() {
        let entries = vec![entry("A", 99), entry("B", 100)];
        assert!(beat_all_agents(0.0, &entries, &AgentRoster::empty()));
        assert!(beat_all_agents(0.0, &entries, &sonnet()));
        assert!(beat_all_agents(0.0, &[], &sonnet()));
    }

    #[test]
    fn beat_all_agents_checks_every_agent() {
        let roster = AgentRoster::new(["Sonnet 4", "GPT-4.1"]);
        let entries = vec![entry("Sonnet 4", 70), entry("GPT-4.1", 88), entry("human", 99)];
        assert!(!beat_all_agents(80.0, &entries, &roster));
        assert!(beat_all_agents(89.0, &entries, &roster));
    }

    #[test]
    fn roster_matches_substrings_and_skips_blank_names() {
        let roster = AgentRoster::new(["Sonnet 4", "  ", "Sonnet 4", ""]);
        assert_eq!(roster.names(), &["Sonnet 4".to_string()]);
        assert!(roster.is_agent("Claude Sonnet 4"));
        assert!(!roster.is_agent("sonnet 4"));
        assert!(!roster.is_agent("alice"));
    }

    #[test]
    fn top_humans_keep_global_ranks() {
        let entries = vec![
            entry("h1", 95),
            entry("Sonnet4", 91),
            entry("h2", 90),
            entry("h3", 85),
            entry("h4", 60),
            entry("AI-Sonnet4-mini", 40),
        ];
        let board = Leaderboard::new(&entries, &sonnet());
        let shown: Vec<_> = board
            .top_humans_with_agents(2)
            .iter()
            .map(|e| (e.entry.username.as_str(), e.display_rank))
            .collect();
        assert_eq!(
            shown,
            vec![("h1", 1), ("Sonnet4", 2), ("h2", 3), ("AI-Sonnet4-mini", 6)]
        );
        assert_eq!(board.humans().count(), 4);
        assert_eq!(board.agents().count(), 2);
    }

    #[test]
    fn rank_of_finds_score() {
        let entries = vec![entry("A", 10), entry("B", 20)];
        let board = Leaderboard::new(&entries, &AgentRoster::empty());
        assert_eq!(board.rank_of(&entries[0].id), Some(2));
        assert_eq!(board.rank_of(&Uuid::new_v4()), None);
    }
}
