//! HTTP surface: WhatsApp webhook handshake and events, health, and the
//! session inspection API.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::channels::whatsapp::parse_webhook_payload;
use crate::session::{ConversationMachine, SessionRouteState, session_routes};

/// Shared state for the webhook routes.
#[derive(Clone)]
pub struct WebhookState {
    pub machine: Arc<ConversationMachine>,
    pub verify_token: String,
    /// Sending phone number; events addressed elsewhere are dropped.
    pub phone_number_id: Option<String>,
}

/// Decide the subscription handshake.
///
/// Returns the challenge to echo when `mode` is `subscribe`, the token matches
/// a non-empty `expected_token`, and the challenge is non-empty.
pub fn verify_subscription<'a>(
    mode: Option<&str>,
    token: Option<&str>,
    challenge: Option<&'a str>,
    expected_token: &str,
) -> Option<&'a str> {
    let challenge = challenge.filter(|c| !c.is_empty())?;
    if mode == Some("subscribe") && !expected_token.is_empty() && token == Some(expected_token) {
        Some(challenge)
    } else {
        None
    }
}

/// GET /webhook
async fn verify(
    State(state): State<WebhookState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let challenge = verify_subscription(
        params.get("hub.mode").map(String::as_str),
        params.get("hub.verify_token").map(String::as_str),
        params.get("hub.challenge").map(String::as_str),
        &state.verify_token,
    );

    match challenge {
        Some(challenge) => {
            tracing::info!("Webhook subscription verified");
            (StatusCode::OK, challenge.to_string()).into_response()
        }
        None => {
            tracing::warn!("Webhook verification rejected");
            (StatusCode::FORBIDDEN, "Forbidden").into_response()
        }
    }
}

/// POST /webhook
///
/// Acknowledges at once; the event's messages are handled in order on a
/// spawned task.
async fn receive(State(state): State<WebhookState>, body: Bytes) -> impl IntoResponse {
    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring unparseable webhook body");
            return (StatusCode::OK, "ok");
        }
    };

    let messages = parse_webhook_payload(&payload, state.phone_number_id.as_deref());
    if messages.is_empty() {
        return (StatusCode::OK, "ok");
    }

    tracing::debug!(count = messages.len(), "Webhook event received");
    let machine = Arc::clone(&state.machine);
    tokio::spawn(async move {
        for message in messages {
            machine
                .handle_message(&message.sender_id, &message.text)
                .await;
        }
    });

    (StatusCode::OK, "ok")
}

/// GET /health
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "essay-bot",
    }))
}

/// Build the webhook routes.
pub fn webhook_routes(state: WebhookState) -> Router {
    Router::new()
        .route("/webhook", get(verify).post(receive))
        .with_state(state)
}

/// Build the complete application router.
pub fn app_router(webhook: WebhookState, sessions: SessionRouteState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .merge(webhook_routes(webhook))
        .merge(session_routes(sessions))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_matching_subscription() {
        assert_eq!(
            verify_subscription(Some("subscribe"), Some("secret"), Some("12345"), "secret"),
            Some("12345")
        );
    }

    #[test]
    fn rejects_wrong_token_or_mode() {
        assert!(verify_subscription(Some("subscribe"), Some("nope"), Some("1"), "secret").is_none());
        assert!(verify_subscription(Some("unsubscribe"), Some("secret"), Some("1"), "secret").is_none());
        assert!(verify_subscription(None, Some("secret"), Some("1"), "secret").is_none());
        assert!(verify_subscription(Some("subscribe"), None, Some("1"), "secret").is_none());
    }

    #[test]
    fn rejects_empty_challenge_or_unconfigured_token() {
        assert!(verify_subscription(Some("subscribe"), Some("secret"), Some(""), "secret").is_none());
        assert!(verify_subscription(Some("subscribe"), Some("secret"), None, "secret").is_none());
        assert!(verify_subscription(Some("subscribe"), Some(""), Some("1"), "").is_none());
    }
}
