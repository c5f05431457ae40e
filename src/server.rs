use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::broadcast::{BroadcastOptions, Dispatcher};
use crate::events::{EventHandler, Update};
use crate::telegram::Recipient;

const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

#[derive(Clone)]
pub struct AppState {
    pub events: Arc<EventHandler>,
    pub dispatcher: Arc<Dispatcher>,
    pub secret_token: Option<String>,
    pub admin_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    pub recipients: Vec<Recipient>,
    #[serde(default)]
    pub text: String,
    #[serde(flatten)]
    pub options: BroadcastOptions,
}

pub fn router(state: AppState, webhook_path: &str) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(webhook_path, post(receive_update))
        .route("/broadcast", post(broadcast))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Constant-time comparison so the secret cannot be guessed byte by byte.
fn secrets_match(expected: &str, provided: &str) -> bool {
    let (a, b) = (expected.as_bytes(), provided.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}

/// Bodies are decoded only after the caller is authenticated.
fn decode<T: DeserializeOwned>(body: &Bytes) -> Result<T, Response> {
    serde_json::from_slice(body).map_err(|e| {
        warn!("Rejected malformed request body: {}", e);
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": format!("invalid JSON body: {}", e)})),
        )
            .into_response()
    })
}

/// Telegram only needs a prompt 200; the update is processed in the background.
async fn receive_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(secret) = state.secret_token.as_deref() {
        if !secrets_match(secret, header(&headers, SECRET_TOKEN_HEADER)) {
            warn!("Rejected webhook delivery with a bad secret token");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }

    let update: Update = match decode(&body) {
        Ok(update) => update,
        Err(response) => return response,
    };

    info!("Received update {} from Telegram", update.update_id);
    let events = state.events.clone();
    tokio::spawn(async move {
        events.handle(update).await;
    });

    StatusCode::OK.into_response()
}

async fn broadcast(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(admin_token) = state.admin_token.as_deref() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let provided = header(&headers, "authorization")
        .strip_prefix("Bearer ")
        .unwrap_or("");
    if !secrets_match(admin_token, provided) {
        warn!("Rejected broadcast request with a bad admin token");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "invalid admin token"})),
        )
            .into_response();
    }

    let request: BroadcastRequest = match decode(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    info!(
        "Broadcast requested for {} recipient(s)",
        request.recipients.len()
    );

    match state
        .dispatcher
        .broadcast(request.recipients, &request.text, request.options)
        .await
    {
        Ok(report) => Json(report).into_response(),
        Err(e) => {
            warn!("Rejected broadcast request: {}", e);
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({"error": e.to_string()})),
            )
                .into_response()
        }
    }
}
