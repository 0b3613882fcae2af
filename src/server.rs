use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Extension, Query, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use guess_rent::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    let server = Server::new(&config);
    server.seed_agents().await;

    let app = Router::new()
        .route("/", get(root))
        .route("/listings", get(list_listings))
        .route("/users", post(create_user))
        .route("/scores", post(submit_score))
        .route("/leaderboard", get(leaderboard))
        .route("/ws", get(ws_handler))
        .layer(Extension(server))
        .layer(TraceLayer::new_for_http());

    tracing::info!(addr = %config.addr, listings = %config.listings_path.display(), "server started");
    axum::Server::bind(&config.addr)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

#[derive(Debug, Clone)]
struct Server {
    store: ScoreStore,
    source: Arc<JsonFileSource>,
    settings: Arc<Settings>,
}

impl Server {
    fn new(config: &Config) -> Self {
        Self {
            store: ScoreStore::new(config.settings.username_max_len),
            source: Arc::new(JsonFileSource::new(
                &config.listings_path,
                config.settings.max_listings,
            )),
            settings: Arc::new(config.settings.clone()),
        }
    }

    /// 在阻塞线程池中读取房源
    async fn fetch_listings(&self) -> Result<Vec<Listing>> {
        let source = self.source.clone();
        tokio::task::spawn_blocking(move || source.fetch())
            .await
            .unwrap_or_else(|e| Err(Error::DataUnavailable(e.to_string())))
    }

    /// 用房源上的 AI 估价生成基准分数
    async fn seed_agents(&self) {
        let listings = match self.fetch_listings().await {
            Ok(listings) => listings,
            Err(e) => {
                tracing::warn!(error = %e, "skipping agent baselines");
                return;
            }
        };
        let baselines = agent_baselines(&listings);
        match self.store.seed_agents(&baselines) {
            Ok(entries) => tracing::info!(agents = entries.len(), "agent baselines seeded"),
            Err(e) => tracing::warn!(error = %e, "failed to seed agent baselines"),
        }
    }

    fn ranked_scores(&self, scope: LeaderboardScope) -> (Vec<ScoreEntry>, Leaderboard) {
        let scores = self.store.scores(scope, chrono::Utc::now());
        let board = Leaderboard::new(&scores, &self.settings.agents);
        (scores, board)
    }
}

type ApiResult<T> = std::result::Result<Json<T>, (StatusCode, Json<Value>)>;

fn api_error(e: Error) -> (StatusCode, Json<Value>) {
    let status = match e {
        Error::InvalidInput(_) | Error::InvalidUsername(_) | Error::InvalidScore(_) => {
            StatusCode::BAD_REQUEST
        }
        Error::UserNotFound => StatusCode::NOT_FOUND,
        Error::InvalidOperation => StatusCode::CONFLICT,
        Error::DataUnavailable(_) | Error::SubmissionFailure(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(json!({ "detail": e.to_string() })))
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "Guess That Rent API is running!" }))
}

async fn list_listings(Extension(server): Extension<Server>) -> ApiResult<Value> {
    let listings = server.fetch_listings().await.map_err(|e| {
        tracing::warn!(error = %e, "failed to fetch listings");
        api_error(e)
    })?;
    Ok(Json(json!({
        "success": true,
        "count": listings.len(),
        "listings": listings,
    })))
}

#[derive(Debug, Deserialize)]
struct CreateUser {
    username: String,
}

async fn create_user(
    Extension(server): Extension<Server>,
    Json(request): Json<CreateUser>,
) -> ApiResult<User> {
    server
        .store
        .create_user(&request.username)
        .map(Json)
        .map_err(api_error)
}

#[derive(Debug, Deserialize)]
struct SubmitScore {
    user_id: Uuid,
    score_value: i64,
}

async fn submit_score(
    Extension(server): Extension<Server>,
    Json(request): Json<SubmitScore>,
) -> ApiResult<ScoreEntry> {
    server
        .store
        .submit_score(&request.user_id, request.score_value)
        .map(Json)
        .map_err(api_error)
}

#[derive(Debug, Deserialize)]
struct LeaderboardQuery {
    #[serde(default)]
    scope: LeaderboardScope,
}

async fn leaderboard(
    Extension(server): Extension<Server>,
    Query(query): Query<LeaderboardQuery>,
) -> Json<Value> {
    let (_, board) = server.ranked_scores(query.scope);
    Json(json!({ "scores": board.entries() }))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(server): Extension<Server>,
) -> impl IntoResponse {
    ws.on_upgrade(|s| async move {
        if let Err(e) = handle_ws(s, server).await {
            tracing::warn!(error = %e, "websocket error");
        }
    })
}

async fn handle_ws(mut socket: WebSocket, server: Server) -> anyhow::Result<()> {
    // 每个连接独占一局游戏
    let mut session = Session::new();
    tracing::debug!(session = %session.id(), "player connected");

    while let Some(message) = socket.recv().await.transpose()? {
        match message {
            Message::Text(request) => {
                let response = match serde_json::from_str::<PlayRequest>(&request) {
                    Ok(request) => handle_request(request, &mut session, &server).await,
                    Err(e) => PlayResponse::GameError {
                        cause: Error::InvalidInput(e.to_string()),
                    },
                };
                socket
                    .send(Message::Text(serde_json::to_string(&response)?))
                    .await?;
            }
            Message::Close(c) => {
                match c {
                    Some(c) => tracing::debug!(code = c.code, reason = %c.reason, "connection closed"),
                    None => tracing::debug!("connection closed without close frame"),
                }
                break;
            }
            _ => {}
        }
    }

    Ok(())
}

async fn handle_request(request: PlayRequest, session: &mut Session, server: &Server) -> PlayResponse {
    let outcome = match request {
        PlayRequest::Begin => match session.begin() {
            Ok(()) => load(session, server).await,
            Err(e) => Err(e),
        },
        PlayRequest::Retry => match session.retry() {
            Ok(()) => load(session, server).await,
            Err(e) => Err(e),
        },
        PlayRequest::Guess { value } => {
            // 非法输入不进入状态机
            let result = parse_guess(&value).and_then(|guess| session.submit_guess(guess));
            return match result {
                Ok(result) => PlayResponse::Guessed {
                    result,
                    state: SessionView::of(session),
                },
                Err(cause) => PlayResponse::GameError { cause },
            };
        }
        PlayRequest::Continue => session.proceed().map(|_| ()),
        PlayRequest::Reset => {
            session.reset();
            Ok(())
        }
        PlayRequest::Submit { username } => return submit(session, server, &username),
    };

    match outcome {
        Ok(()) => PlayResponse::State {
            state: SessionView::of(session),
        },
        Err(cause) => PlayResponse::GameError { cause },
    }
}

async fn load(session: &mut Session, server: &Server) -> Result<()> {
    let listings = server.fetch_listings().await;
    session.load(listings).map(|_| ())
}

/// 提交成绩；每局只提交一次，失败不影响本地准确率
fn submit(session: &mut Session, server: &Server, username: &str) -> PlayResponse {
    let accuracy = match session.accuracy() {
        Some(accuracy) if session.submitted().is_none() => accuracy,
        _ => {
            return PlayResponse::GameError {
                cause: Error::InvalidOperation,
            }
        }
    };

    let stored = server
        .store
        .create_user(username)
        .and_then(|user| server.store.submit_score(&user.id, score_value(accuracy) as i64));
    let entry = match stored {
        Ok(entry) => entry,
        Err(e) => {
            tracing::warn!(session = %session.id(), error = %e, "score submission failed");
            return PlayResponse::SubmitFailed {
                accuracy,
                cause: Error::SubmissionFailure(e.to_string()),
            };
        }
    };
    if let Err(cause) = session.record_submission(entry.id) {
        return PlayResponse::GameError { cause };
    }

    let (scores, board) = server.ranked_scores(LeaderboardScope::Today);
    PlayResponse::Submitted {
        accuracy,
        rank: board.rank_of(&entry.id),
        beat_all_agents: beat_all_agents(accuracy, &scores, &server.settings.agents),
        leaderboard: board
            .top_humans_with_agents(server.settings.leaderboard_top_humans)
            .into_iter()
            .cloned()
            .collect(),
        score: entry,
    }
}

/// 发给客户端的游戏状态
#[derive(Debug, Serialize)]
struct SessionView {
    #[serde(flatten)]
    phase: Phase,
    listing: Option<Listing>,
    round: usize,
    total: usize,
    rounds_completed: usize,
}

impl SessionView {
    fn of(session: &Session) -> Self {
        Self {
            phase: session.phase().clone(),
            listing: session.current_listing().cloned(),
            round: session.current_index() + 1,
            total: session.listings().len(),
            rounds_completed: session.percentage_diffs().len(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "action")]
enum PlayRequest {
    Begin,
    Guess { value: String },
    Continue,
    Retry,
    Reset,
    Submit { username: String },
}

#[derive(Debug, Serialize)]
#[serde(tag = "resp")]
enum PlayResponse {
    State {
        state: SessionView,
    },
    Guessed {
        result: GuessResult,
        state: SessionView,
    },
    Submitted {
        accuracy: f64,
        score: ScoreEntry,
        rank: Option<usize>,
        beat_all_agents: bool,
        leaderboard: Vec<RankedEntry>,
    },
    SubmitFailed {
        accuracy: f64,
        cause: Error,
    },
    GameError {
        cause: Error,
    },
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Utc;
    use tempfile::NamedTempFile;

    fn server_over(document: &Value) -> (Server, NamedTempFile) {
        let file = NamedTempFile::new().unwrap();
        serde_json::to_writer(file.as_file(), document).unwrap();
        let config = Config {
            listings_path: file.path().to_path_buf(),
            ..Config::from_lookup(|_| None)
        };
        (Server::new(&config), file)
    }

    async fn demo_server() -> (Server, NamedTempFile) {
        let (server, file) = server_over(&json!({ "listings": demo_listings() }));
        server.seed_agents().await;
        (server, file)
    }

    async fn play(session: &mut Session, server: &Server, guesses: &[u32]) {
        let response = handle_request(PlayRequest::Begin, session, server).await;
        assert!(matches!(response, PlayResponse::State { .. }), "{:?}", response);
        for guess in guesses {
            let value = guess.to_string();
            let response = handle_request(PlayRequest::Guess { value }, session, server).await;
            assert!(matches!(response, PlayResponse::Guessed { .. }), "{:?}", response);
            handle_request(PlayRequest::Continue, session, server).await;
        }
        assert!(session.phase().is_complete());
    }

    fn submit_as(username: &str) -> PlayRequest {
        PlayRequest::Submit {
            username: username.to_string(),
        }
    }

    #[tokio::test]
    async fn perfect_game_is_ranked_first_and_beats_agents() {
        let (server, _file) = demo_server().await;
        let mut session = Session::new();
        play(&mut session, &server, &[3450, 2875, 2650]).await;

        match handle_request(submit_as("alice"), &mut session, &server).await {
            PlayResponse::Submitted {
                accuracy,
                score,
                rank,
                beat_all_agents,
                leaderboard,
            } => {
                assert_eq!(accuracy, 100.0);
                assert_eq!(score.score_value, 100);
                assert_eq!(rank, Some(1));
                assert!(beat_all_agents);
                assert_eq!(leaderboard.len(), 4);
                assert_eq!(leaderboard.iter().filter(|e| e.is_ai_agent).count(), 3);
                assert_eq!(session.submitted(), Some(&score.id));
            }
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[tokio::test]
    async fn second_submit_is_rejected() {
        let (server, _file) = demo_server().await;
        let mut session = Session::new();
        play(&mut session, &server, &[3450, 2875, 2650]).await;

        let first = handle_request(submit_as("alice"), &mut session, &server).await;
        assert!(matches!(first, PlayResponse::Submitted { .. }), "{:?}", first);
        let second = handle_request(submit_as("alice"), &mut session, &server).await;
        assert!(matches!(
            second,
            PlayResponse::GameError {
                cause: Error::InvalidOperation
            }
        ));

        let humans = server
            .store
            .scores(LeaderboardScope::Week, Utc::now())
            .into_iter()
            .filter(|s| !server.settings.agents.is_agent(&s.username))
            .count();
        assert_eq!(humans, 1);
        assert_eq!(session.accuracy(), Some(100.0));
    }

    #[tokio::test]
    async fn weak_game_does_not_beat_agents() {
        let (server, _file) = demo_server().await;
        let mut session = Session::new();
        play(&mut session, &server, &[1, 1, 1]).await;

        match handle_request(submit_as("bob"), &mut session, &server).await {
            PlayResponse::Submitted {
                accuracy,
                rank,
                beat_all_agents,
                ..
            } => {
                assert_eq!(accuracy, 0.0);
                assert_eq!(rank, Some(4));
                assert!(!beat_all_agents);
            }
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[tokio::test]
    async fn submit_before_complete_is_rejected() {
        let (server, _file) = demo_server().await;
        let mut session = Session::new();

        let response = handle_request(submit_as("alice"), &mut session, &server).await;
        assert!(matches!(
            response,
            PlayResponse::GameError {
                cause: Error::InvalidOperation
            }
        ));

        handle_request(PlayRequest::Begin, &mut session, &server).await;
        let response = handle_request(submit_as("alice"), &mut session, &server).await;
        assert!(matches!(
            response,
            PlayResponse::GameError {
                cause: Error::InvalidOperation
            }
        ));
        assert!(session.submitted().is_none());
        assert_eq!(server.store.scores(LeaderboardScope::Week, Utc::now()).len(), 3);
    }

    #[tokio::test]
    async fn failed_submission_keeps_accuracy_and_allows_another_try() {
        let (server, _file) = demo_server().await;
        let mut session = Session::new();
        play(&mut session, &server, &[3000, 3000, 3000]).await;
        let accuracy = session.accuracy().unwrap();

        let too_long = "x".repeat(server.settings.username_max_len + 1);
        match handle_request(submit_as(&too_long), &mut session, &server).await {
            PlayResponse::SubmitFailed {
                accuracy: reported,
                cause,
            } => {
                assert_eq!(reported, accuracy);
                assert!(matches!(cause, Error::SubmissionFailure(_)));
            }
            other => panic!("unexpected response {:?}", other),
        }
        assert_eq!(session.accuracy(), Some(accuracy));
        assert!(session.phase().is_complete());
        assert!(session.submitted().is_none());

        let response = handle_request(submit_as("carol"), &mut session, &server).await;
        assert!(matches!(response, PlayResponse::Submitted { .. }), "{:?}", response);
    }

    #[tokio::test]
    async fn bad_guess_text_does_not_count_a_round() {
        let (server, _file) = demo_server().await;
        let mut session = Session::new();
        handle_request(PlayRequest::Begin, &mut session, &server).await;

        let value = "about 3k".to_string();
        let response = handle_request(PlayRequest::Guess { value }, &mut session, &server).await;
        assert!(matches!(
            response,
            PlayResponse::GameError {
                cause: Error::InvalidInput(_)
            }
        ));
        assert_eq!(session.phase(), &Phase::Playing { index: 0 });
        assert!(session.percentage_diffs().is_empty());
    }

    #[tokio::test]
    async fn missing_listing_file_fails_and_retry_stays_failed() {
        let (server, file) = server_over(&json!({ "listings": [] }));
        let path = file.path().to_path_buf();
        drop(file);
        assert!(!path.exists());

        let mut session = Session::new();
        for request in [PlayRequest::Begin, PlayRequest::Retry] {
            match handle_request(request, &mut session, &server).await {
                PlayResponse::State { state } => {
                    assert!(matches!(
                        state.phase,
                        Phase::Failed {
                            cause: Error::DataUnavailable(_)
                        }
                    ));
                    assert!(state.listing.is_none());
                }
                other => panic!("unexpected response {:?}", other),
            }
        }
        let response = handle_request(
            PlayRequest::Guess {
                value: "2000".to_string(),
            },
            &mut session,
            &server,
        )
        .await;
        assert!(matches!(
            response,
            PlayResponse::GameError {
                cause: Error::InvalidOperation
            }
        ));
    }

    #[tokio::test]
    async fn leaderboard_keeps_agents_after_the_seeding_day() {
        let (server, _file) = demo_server().await;
        let alice = server.store.create_user("alice").unwrap();
        server
            .store
            .submit_score_at(&alice.id, 50, Utc::now() - chrono::Duration::days(2))
            .unwrap();

        let (scores, board) = server.ranked_scores(LeaderboardScope::Today);
        assert_eq!(board.agents().count(), 3);
        assert_eq!(board.humans().count(), 0);
        assert!(!beat_all_agents(50.0, &scores, &server.settings.agents));
    }
}
