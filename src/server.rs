//! HTTP API
//!
//! Thin JSON adapters over the message store, the text-intelligence
//! operations and per-user analysis sessions.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Liveness and version |
//! | `GET`    | `/api/status` | Credential presence and provider usage |
//! | `GET`    | `/api/channels` | Channels visible to the caller |
//! | `POST`   | `/api/messages` | Filtered messages and populated days of a window |
//! | `POST`   | `/api/topics/extract` | Topic labels for ad-hoc messages |
//! | `POST`   | `/api/topics/summarize` | Free-form conversation summary |
//! | `POST`   | `/api/topics/suggest` | Ticket suggestion for a topic |
//! | `POST`   | `/api/analysis` | Select channel and range, returns the matrix |
//! | `GET`    | `/api/analysis` | Current session state and cells |
//! | `POST`   | `/api/cells` | Enrich one cell (caller deadline applies) |
//! | `DELETE` | `/api/cells` | Cancel an in-flight cell |
//! | `POST`   | `/api/cells/ticket` | Mark a cell's suggestion as acted upon |
//!
//! The caller is identified by the `x-user-id` header, defaulting to
//! `source.user_id`.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_authorized", "message": "Not authorized: ...", "retryable": false } }
//! ```

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::ai::{SummaryContext, UsageSummary};
use crate::analysis::{AnalysisSession, CellInsight, SessionSnapshot, TopicDiscovery};
use crate::cli::util::{AppContext, parse_bound};
use crate::types::{CellKey, ChannelId, ChannelInfo, ErrorKind, Message, Topic, TopicError, UserId};

pub const USER_HEADER: &str = "x-user-id";

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    ctx: AppContext,
    sessions: Arc<DashMap<UserId, Arc<AnalysisSession>>>,
}

impl AppState {
    pub fn new(ctx: AppContext) -> Self {
        Self {
            ctx,
            sessions: Arc::new(DashMap::new()),
        }
    }

    fn caller(&self, headers: &HeaderMap) -> UserId {
        headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(UserId::from)
            .unwrap_or_else(|| self.ctx.default_user())
    }

    fn session(&self, user: &UserId) -> Arc<AnalysisSession> {
        self.sessions
            .entry(user.clone())
            .or_insert_with(|| self.ctx.session(user.clone()))
            .clone()
    }

    fn bounds(
        &self,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>), AppError> {
        let offset = self.ctx.adapter.offset();
        let start = start.map(|s| parse_bound(s, offset, false)).transpose()?;
        let end = end.map(|s| parse_bound(s, offset, true)).transpose()?;
        Ok((start, end))
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/status", get(handle_status))
        .route("/api/channels", get(handle_channels))
        .route("/api/messages", post(handle_messages))
        .route("/api/topics/extract", post(handle_extract))
        .route("/api/topics/summarize", post(handle_summarize))
        .route("/api/topics/suggest", post(handle_suggest))
        .route("/api/analysis", post(handle_select).get(handle_session))
        .route("/api/cells", post(handle_cell).delete(handle_cancel_cell))
        .route("/api/cells/ticket", post(handle_ticket))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind to `server.bind` and serve until Ctrl-C
pub async fn run_server(ctx: AppContext) -> anyhow::Result<()> {
    let bind = ctx.config.server.bind.clone();
    let app = router(AppState::new(ctx));

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;
    Ok(())
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
    retryable: bool,
}

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
    retryable: bool,
}

impl AppError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "invalid_input".to_string(),
            message: message.into(),
            retryable: false,
        }
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotAuthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::SourceUnavailable
        | ErrorKind::ClassificationFailed
        | ErrorKind::SummarizationFailed
        | ErrorKind::SuggestionFailed => StatusCode::BAD_GATEWAY,
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Timeout => StatusCode::REQUEST_TIMEOUT,
        ErrorKind::Cancelled => StatusCode::CONFLICT,
        ErrorKind::Config | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<TopicError> for AppError {
    fn from(err: TopicError) -> Self {
        let kind = err.kind();
        let status = status_for(kind);
        if status.is_server_error() {
            error!("Request failed: {}", err);
        }
        Self {
            status,
            code: kind.to_string().to_lowercase(),
            message: err.to_string(),
            retryable: kind.is_retryable(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
                retryable: self.retryable,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, AppError>;

// =============================================================================
// Request Bodies
// =============================================================================

#[derive(Debug, Deserialize)]
struct WindowRequest {
    #[serde(alias = "channelId")]
    channel_id: String,
    #[serde(default, alias = "startDate")]
    start: Option<String>,
    #[serde(default, alias = "endDate")]
    end: Option<String>,
}

impl WindowRequest {
    fn channel(&self) -> Result<ChannelId, AppError> {
        let id = self.channel_id.trim();
        if id.is_empty() {
            return Err(AppError::bad_request("channel_id is required"));
        }
        Ok(ChannelId::from(id))
    }
}

/// Plain line, or an authored message
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IncomingMessage {
    Line(String),
    Authored {
        #[serde(default)]
        user: Option<String>,
        text: String,
    },
}

impl IncomingMessage {
    fn into_message(self, now: DateTime<Utc>) -> Message {
        match self {
            Self::Line(text) => Message::new("Unknown", text, now),
            Self::Authored { user, text } => {
                Message::new(user.unwrap_or_else(|| "Unknown".to_string()), text, now)
            }
        }
    }

    fn into_line(self) -> String {
        match self {
            Self::Line(text) => text,
            Self::Authored { user: Some(user), text } => format!("{}: {}", user, text),
            Self::Authored { user: None, text } => text,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExtractRequest {
    messages: Vec<IncomingMessage>,
}

#[derive(Debug, Deserialize)]
struct SummarizeRequest {
    messages: Vec<IncomingMessage>,
    #[serde(default, alias = "channelName")]
    channel_name: Option<String>,
    #[serde(default, alias = "dateRange")]
    date_range: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SuggestRequest {
    topic: String,
    messages: Vec<IncomingMessage>,
}

#[derive(Debug, Deserialize)]
struct CellRequest {
    topic: String,
    day: NaiveDate,
}

impl CellRequest {
    fn key(&self) -> CellKey {
        CellKey::new(self.topic.clone(), self.day)
    }
}

// =============================================================================
// Handlers
// =============================================================================

async fn handle_health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    user: UserId,
    is_connected: bool,
    source: String,
    provider: String,
    usage: UsageSummary,
}

async fn handle_status(State(state): State<AppState>, headers: HeaderMap) -> Json<StatusResponse> {
    let user = state.caller(&headers);
    Json(StatusResponse {
        is_connected: state.ctx.adapter.is_connected(&user),
        user,
        source: state.ctx.adapter.source_name().to_string(),
        provider: state.ctx.provider_name.clone(),
        usage: state.ctx.metrics.snapshot(),
    })
}

#[derive(Debug, Serialize)]
struct ChannelsResponse {
    channels: Vec<ChannelInfo>,
}

async fn handle_channels(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<ChannelsResponse> {
    let user = state.caller(&headers);
    let channels = state.ctx.adapter.list_channels(&user).await?;
    Ok(Json(ChannelsResponse { channels }))
}

#[derive(Debug, Serialize)]
struct MessagesResponse {
    messages: Vec<Message>,
    days: Vec<NaiveDate>,
}

async fn handle_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<WindowRequest>,
) -> ApiResult<MessagesResponse> {
    let user = state.caller(&headers);
    let channel = req.channel()?;
    let (start, end) = state.bounds(req.start.as_deref(), req.end.as_deref())?;

    let window = state
        .ctx
        .adapter
        .fetch_messages(&user, &channel, start, end)
        .await?;
    Ok(Json(MessagesResponse {
        messages: window.messages,
        days: window.days,
    }))
}

#[derive(Debug, Serialize)]
struct TopicsResponse {
    topics: Vec<Topic>,
}

async fn handle_extract(
    State(state): State<AppState>,
    Json(req): Json<ExtractRequest>,
) -> ApiResult<TopicsResponse> {
    let now = Utc::now();
    let messages: Vec<Message> = req.messages.into_iter().map(|m| m.into_message(now)).collect();

    let discovery = TopicDiscovery::new(
        state.ctx.intelligence.clone(),
        state.ctx.config.analysis.max_topics,
    );
    let topics = discovery.discover(&messages).await?;
    Ok(Json(TopicsResponse { topics }))
}

async fn handle_summarize(
    State(state): State<AppState>,
    Json(req): Json<SummarizeRequest>,
) -> ApiResult<Value> {
    if req.messages.is_empty() {
        return Err(AppError::bad_request("a non-empty messages array is required"));
    }
    let lines: Vec<String> = req.messages.into_iter().map(IncomingMessage::into_line).collect();
    let context = SummaryContext {
        channel_name: req.channel_name,
        date_range: req.date_range,
        ..Default::default()
    };

    let summary = state.ctx.intelligence.summarize(&lines, &context).await?;
    Ok(Json(json!({ "summary": summary })))
}

async fn handle_suggest(
    State(state): State<AppState>,
    Json(req): Json<SuggestRequest>,
) -> ApiResult<Value> {
    if req.topic.trim().is_empty() {
        return Err(AppError::bad_request("topic is required"));
    }
    let lines: Vec<String> = req.messages.into_iter().map(IncomingMessage::into_line).collect();

    let suggestion = state.ctx.intelligence.suggest_ticket(req.topic.trim(), &lines).await?;
    Ok(Json(json!(suggestion)))
}

async fn handle_select(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<WindowRequest>,
) -> ApiResult<Value> {
    let user = state.caller(&headers);
    let channel = req.channel()?;
    let (start, end) = state.bounds(req.start.as_deref(), req.end.as_deref())?;

    let session = state.session(&user);
    let matrix = session.select(channel, start, end).await?;
    Ok(Json(json!({
        "session": session.id(),
        "matrix": matrix,
    })))
}

async fn handle_session(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Value> {
    let user = state.caller(&headers);
    let snapshot = match state.sessions.get(&user) {
        Some(session) => session.snapshot(),
        None => SessionSnapshot::unselected(user),
    };
    Ok(Json(serde_json::to_value(snapshot).map_err(TopicError::from)?))
}

async fn handle_cell(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CellRequest>,
) -> ApiResult<CellInsight> {
    let user = state.caller(&headers);
    let session = state.session(&user);
    let insight = session
        .run_cell(&req.key(), state.ctx.insight_timeout())
        .await?;
    Ok(Json(insight))
}

async fn handle_cancel_cell(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CellRequest>,
) -> ApiResult<Value> {
    let user = state.caller(&headers);
    let cancelled = state.session(&user).cancel_cell(&req.key());
    Ok(Json(json!({ "cancelled": cancelled })))
}

async fn handle_ticket(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CellRequest>,
) -> ApiResult<Value> {
    let user = state.caller(&headers);
    let ticket = state.session(&user).act_on_ticket(&req.key())?;
    Ok(Json(json!({ "ticket": ticket })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::create_shared_metrics;
    use crate::config::Config;
    use crate::source::{InMemoryCredentialStore, MessageStoreAdapter};
    use crate::testing::{FakeIntelligence, FakeSource, at, raw};
    use crate::types::ChannelInfo;

    fn context(source: FakeSource, ai: FakeIntelligence) -> AppContext {
        let config = Config::default();
        let credentials = Arc::new(InMemoryCredentialStore::seeded(
            UserId::new(&config.source.user_id),
            Some("xoxb-test".to_string()),
        ));
        let adapter =
            MessageStoreAdapter::new(Arc::new(source), credentials.clone(), &config.source).unwrap();
        AppContext {
            config: Arc::new(config),
            metrics: create_shared_metrics(),
            intelligence: Arc::new(ai),
            credentials,
            adapter: Arc::new(adapter),
            provider_name: "fake (test)".to_string(),
        }
    }

    fn source() -> FakeSource {
        FakeSource {
            channels: vec![ChannelInfo {
                id: "C1".to_string(),
                name: "general".to_string(),
                is_private: false,
                member_count: 3,
            }],
            ..FakeSource::with_history(vec![
                raw("U1", "login is broken", at(2024, 3, 1, 9, 0)),
                raw("U2", "deploy went fine", at(2024, 3, 1, 10, 0)),
                raw("U1", "login still broken", at(2024, 3, 2, 9, 0)),
            ])
        }
    }

    async fn serve(ctx: AppContext) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(AppState::new(ctx));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn window() -> Value {
        json!({ "channel_id": "C1", "start": "2024-03-01", "end": "2024-03-02" })
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(ErrorKind::NotAuthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(ErrorKind::SummarizationFailed), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for(ErrorKind::Cancelled), StatusCode::CONFLICT);

        let err = AppError::from(TopicError::NotFound("cell".into()));
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.code, "not_found");
    }

    #[test]
    fn test_incoming_message_shapes() {
        let parsed: Vec<IncomingMessage> =
            serde_json::from_value(json!(["plain", { "user": "ann", "text": "hi" }])).unwrap();
        let lines: Vec<String> = parsed.into_iter().map(IncomingMessage::into_line).collect();
        assert_eq!(lines, vec!["plain", "ann: hi"]);
    }

    #[tokio::test]
    async fn test_health_and_status() {
        let base = serve(context(source(), FakeIntelligence::default())).await;
        let client = reqwest::Client::new();

        let health: Value = client.get(format!("{}/health", base)).send().await.unwrap().json().await.unwrap();
        assert_eq!(health["status"], "ok");

        let status: Value = client.get(format!("{}/api/status", base)).send().await.unwrap().json().await.unwrap();
        assert_eq!(status["is_connected"], true);

        let other: Value = client
            .get(format!("{}/api/status", base))
            .header(USER_HEADER, "someone-else")
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(other["is_connected"], false);
    }

    #[tokio::test]
    async fn test_unknown_user_is_unauthorized() {
        let base = serve(context(source(), FakeIntelligence::default())).await;
        let resp = reqwest::Client::new()
            .get(format!("{}/api/channels", base))
            .header(USER_HEADER, "stranger")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "not_authorized");
        assert_eq!(body["error"]["retryable"], false);
    }

    #[tokio::test]
    async fn test_messages_endpoint_accepts_original_field_names() {
        let base = serve(context(source(), FakeIntelligence::default())).await;
        let body: Value = reqwest::Client::new()
            .post(format!("{}/api/messages", base))
            .json(&json!({ "channelId": "C1", "startDate": "2024-03-01", "endDate": "2024-03-02" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["messages"].as_array().unwrap().len(), 3);
        assert_eq!(body["days"], json!(["2024-03-01", "2024-03-02"]));
    }

    #[tokio::test]
    async fn test_summarize_requires_messages() {
        let base = serve(context(source(), FakeIntelligence::default())).await;
        let resp = reqwest::Client::new()
            .post(format!("{}/api/topics/summarize", base))
            .json(&json!({ "messages": [] }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_extract_normalizes_topics() {
        let base = serve(context(source(), FakeIntelligence::with_topics(&["Login", "login "]))).await;
        let body: Value = reqwest::Client::new()
            .post(format!("{}/api/topics/extract", base))
            .json(&json!({ "messages": ["login broke", { "user": "ann", "text": "still broken" }] }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["topics"], json!(["Login"]));
    }

    #[tokio::test]
    async fn test_analysis_cell_and_ticket_flow() {
        let ai = FakeIntelligence::with_topics(&["Login"]).ticket("Fix login", "two reports");
        let base = serve(context(source(), ai)).await;
        let client = reqwest::Client::new();

        let selected: Value = client
            .post(format!("{}/api/analysis", base))
            .json(&window())
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(selected["matrix"]["values"], json!([[50, 100]]));
        assert_eq!(selected["matrix"]["trends"], json!([[0, 50]]));

        let cell = json!({ "topic": "login", "day": "2024-03-01" });
        let insight: Value = client
            .post(format!("{}/api/cells", base))
            .json(&cell)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(insight["relevant_messages"].as_array().unwrap().len(), 1);
        assert_eq!(insight["suggested_ticket"]["title"], "Fix login");

        let ticket: Value = client
            .post(format!("{}/api/cells/ticket", base))
            .json(&cell)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(ticket["ticket"]["acted_upon"], true);

        let snapshot: Value = client
            .get(format!("{}/api/analysis", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(snapshot["status"], "ready");
        assert_eq!(snapshot["cells"][0]["phase"], "ready");
    }

    #[tokio::test]
    async fn test_cell_outside_matrix_is_not_found() {
        let base = serve(context(source(), FakeIntelligence::with_topics(&["Login"]))).await;
        let client = reqwest::Client::new();
        client.post(format!("{}/api/analysis", base)).json(&window()).send().await.unwrap();

        let resp = client
            .post(format!("{}/api/cells", base))
            .json(&json!({ "topic": "payments", "day": "2024-03-01" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_session_body_has_one_shape_before_selection() {
        let state = AppState::new(context(source(), FakeIntelligence::default()));
        state.session(&UserId::from("with-session"));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let app = router(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = reqwest::Client::new();
        let fetch = |user: &'static str| {
            let request = client
                .get(format!("{}/api/analysis", base))
                .header(USER_HEADER, user);
            async move { request.send().await.unwrap().json::<Value>().await.unwrap() }
        };
        let fresh = fetch("no-session").await;
        let existing = fetch("with-session").await;

        for body in [&fresh, &existing] {
            assert_eq!(body["status"], "unselected");
            assert_eq!(body["selection"], Value::Null);
            assert_eq!(body["cells"], json!([]));
        }
        assert_eq!(fresh["user"], "no-session");
        assert_eq!(fresh["id"], Value::Null);
        assert!(existing["id"].is_string());

        let keys = |v: &Value| {
            let mut k: Vec<String> = v.as_object().unwrap().keys().cloned().collect();
            k.sort();
            k
        };
        assert_eq!(keys(&fresh), keys(&existing));
    }
}
