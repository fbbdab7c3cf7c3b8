// src/api/chat.rs
// Synchronous and SSE chat endpoints. Grounded on mira-chat/src/server.rs's
// `chat_sync_handler` (collect-all-events-into-one-response) and
// `chat_stream_handler` (mpsc::channel -> async_stream::stream! -> Sse).

use std::convert::Infallible;

use async_stream::stream;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::agents::runtime::Event;
use crate::api::AppState;
use crate::events::{bridge, ChatEvent};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub user_id: String,
    pub session_id: String,
}

fn short_id(prefix: &str) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{prefix}_{}", &hex[..8])
}

/// Fills in missing ids the way spec.md §6 requires: `user_<8 hex>`,
/// `session_<8 hex>`.
fn resolve_ids(user_id: Option<String>, session_id: Option<String>) -> (String, String) {
    (
        user_id.unwrap_or_else(|| short_id("user")),
        session_id.unwrap_or_else(|| short_id("session")),
    )
}

fn empty_message_response() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "message must not be empty" })),
    )
        .into_response()
}

pub async fn chat_sync(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Response {
    if request.message.trim().is_empty() {
        return empty_message_response();
    }

    let (user_id, session_id) = resolve_ids(request.user_id, request.session_id);

    match state.chat(&session_id, &user_id, &request.message).await {
        Ok(response) => Json(ChatResponse {
            response,
            user_id,
            session_id,
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn chat_stream(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Response {
    if request.message.trim().is_empty() {
        return empty_message_response();
    }

    let (user_id, session_id) = resolve_ids(request.user_id, request.session_id);

    let mut rx = match state.chat_stream(&session_id, &user_id, &request.message).await {
        Ok(rx) => rx,
        Err(e) => return e.into_response(),
    };

    let sessions = state.sessions.clone();
    let persist_user_id = user_id.clone();
    let persist_session_id = session_id.clone();

    let stream = stream! {
        let mut accumulated = String::new();
        let mut error_text: Option<String> = None;

        while let Some(event) = rx.recv().await {
            if let Event::Error(ref message) = event {
                error_text = Some(message.clone());
            }
            if let Some(frame) = bridge(event, &mut accumulated) {
                let data = serde_json::to_string(&frame).unwrap_or_default();
                yield Ok::<_, Infallible>(SseEvent::default().data(data));
            }
        }

        // AgentError terminates the turn with the error frame already
        // forwarded above; no synthetic `complete` frame follows it, and
        // the error text (not the empty accumulator) is what's persisted.
        let persisted_text = match &error_text {
            Some(message) => message.clone(),
            None => {
                let complete = ChatEvent::complete(
                    accumulated.clone(),
                    persist_user_id.clone(),
                    persist_session_id.clone(),
                );
                let data = serde_json::to_string(&complete).unwrap_or_default();
                yield Ok(SseEvent::default().data(data));
                accumulated.clone()
            }
        };

        let _ = sessions
            .add_message(&persist_session_id, &persist_user_id, "assistant", &persisted_text)
            .await;
    };

    Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
}
