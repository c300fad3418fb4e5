use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tower_http::cors::CorsLayer;

use crate::config::MAX_TOP_N;
use crate::engine::Recommender;
use crate::metrics::Metrics;
use crate::scorer::Weights;
use crate::store::{ConversationEntry, ConversationLog, JsonHistoryStore, UserInsights};

pub const RECOMMEND_PATH_HEADER: &str = "x-recommend-path";
const DEFAULT_HISTORY_LIMIT: usize = 10;
const MAX_MESSAGE_CHARS: usize = 2_000;

#[derive(Clone)]
pub struct AppState {
    pub recommender: Recommender,
    pub watch_history: Arc<JsonHistoryStore>,
    pub conversations: Arc<ConversationLog>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub fn router(state: AppState, metrics: Option<&Metrics>) -> Router {
    let mut app = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/chat", post(chat))
        .route("/api/history/{user_id}", get(conversation_history))
        .route("/api/history/{user_id}/watched", post(add_watched))
        .route("/api/analytics/user/{user_id}/insights", get(insights))
        .with_state(state);
    if let Some(m) = metrics {
        app = app.merge(m.router());
    }
    app.layer(CorsLayer::very_permissive())
}

#[derive(Debug, Deserialize)]
pub struct ChatReq {
    pub user_id: String,
    pub message: String,
    #[serde(default)]
    pub top_n: Option<usize>,
    #[serde(default)]
    pub weights: Option<Weights>,
    /// Recorded as watched before ranking.
    #[serde(default)]
    pub watched_title: Option<String>,
}

async fn chat(State(state): State<AppState>, Json(body): Json<ChatReq>) -> Result<Response, ApiError> {
    let user_id = body.user_id.trim();
    if user_id.is_empty() {
        return Err(ApiError::InvalidInput("user_id must not be empty".into()));
    }
    let message = body.message.trim();
    if message.is_empty() {
        return Err(ApiError::InvalidInput("message must not be empty".into()));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::InvalidInput(format!(
            "message longer than {MAX_MESSAGE_CHARS} characters"
        )));
    }

    if let Some(title) = body.watched_title.clone() {
        let store = state.watch_history.clone();
        let uid = user_id.to_string();
        blocking(move || store.add_watched(&uid, &title)).await?;
    }

    let top_n = request_top_n(body.top_n, state.recommender.state().default_top_n);
    let rec = state
        .recommender
        .get_recommendations(user_id, message, top_n, body.weights)
        .await;

    let log = state.conversations.clone();
    let (uid, msg, logged) = (user_id.to_string(), message.to_string(), rec.response.clone());
    if let Err(e) = blocking(move || log.record(&uid, &msg, &logged)).await {
        tracing::warn!(target: "recommender", error = %e, "conversation log write failed");
    }

    let mut resp = Json(rec.response).into_response();
    resp.headers_mut().insert(
        HeaderName::from_static(RECOMMEND_PATH_HEADER),
        HeaderValue::from_static(rec.path.as_str()),
    );
    Ok(resp)
}

// Missing `top_n` uses the configured default; any request is capped at MAX_TOP_N.
fn request_top_n(requested: Option<usize>, default_top_n: usize) -> usize {
    requested.unwrap_or(default_top_n).min(MAX_TOP_N)
}

/// Store writes hit the filesystem; keep them off the async workers.
async fn blocking<T, F>(f: F) -> anyhow::Result<T>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

async fn conversation_history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(q): Query<HistoryQuery>,
) -> Json<Vec<ConversationEntry>> {
    let limit = q.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    Json(state.conversations.recent(&user_id, limit))
}

#[derive(Debug, Deserialize)]
pub struct WatchedReq {
    pub title: String,
}

async fn add_watched(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<WatchedReq>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.title.trim().is_empty() {
        return Err(ApiError::InvalidInput("title must not be empty".into()));
    }
    let store = state.watch_history.clone();
    let (uid, title) = (user_id.clone(), body.title);
    let added = blocking(move || store.add_watched(&uid, &title)).await?;
    Ok(Json(json!({
        "user_id": user_id,
        "added": added,
        "watch_history_count": state.watch_history.count(&user_id),
    })))
}

async fn insights(State(state): State<AppState>, Path(user_id): Path<String>) -> Json<UserInsights> {
    let watched = state.watch_history.count(&user_id);
    Json(state.conversations.insights(&user_id, watched))
}
