//! REST endpoints for inspecting sessions and their message log.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::store::{MessageLog, SessionRepository};

const DEFAULT_LOG_LIMIT: usize = 50;
const MAX_LOG_LIMIT: usize = 500;

/// Shared state for session routes.
#[derive(Clone)]
pub struct SessionRouteState {
    pub sessions: Arc<dyn SessionRepository>,
    pub log: Arc<dyn MessageLog>,
}

#[derive(Debug, Deserialize)]
struct LogQuery {
    limit: Option<usize>,
}

/// GET /api/sessions/{sender_id}
///
/// Returns the stored session, or 404 if the sender never wrote in.
async fn get_session(
    State(state): State<SessionRouteState>,
    Path(sender_id): Path<String>,
) -> impl IntoResponse {
    match state.sessions.get(&sender_id).await {
        Ok(Some(session)) => Json(serde_json::to_value(session).unwrap_or_default()).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "No session for this sender"})),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(sender = %sender_id, error = %e, "Session lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "storage unavailable"})),
            )
                .into_response()
        }
    }
}

/// GET /api/sessions/{sender_id}/log?limit=N
async fn get_log(
    State(state): State<SessionRouteState>,
    Path(sender_id): Path<String>,
    Query(query): Query<LogQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT).clamp(1, MAX_LOG_LIMIT);
    match state.log.recent_log(&sender_id, limit).await {
        Ok(entries) => Json(serde_json::json!({ "entries": entries })).into_response(),
        Err(e) => {
            tracing::warn!(sender = %sender_id, error = %e, "Message log lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "storage unavailable"})),
            )
                .into_response()
        }
    }
}

/// Build the session REST routes.
pub fn session_routes(state: SessionRouteState) -> Router {
    Router::new()
        .route("/api/sessions/{sender_id}", get(get_session))
        .route("/api/sessions/{sender_id}/log", get(get_log))
        .with_state(state)
}
