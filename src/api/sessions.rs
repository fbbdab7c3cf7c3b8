// src/api/sessions.rs
// Session CRUD endpoints. Grounded on backend/src/api/http/mod.rs's
// resource-handler shape (Path extractor, typed 404 via IntoResponse) and
// session_store.py's own list/get/delete surface.

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::json;

use crate::api::AppState;
use crate::error::OrchestratorError;

/// `user_id` is optional: present, it scopes the listing to that user;
/// absent, every session on disk is listed — matches spec's `list(user_id?)`
/// and session_store.py's `list_sessions(user_id=None)`.
#[derive(Debug, Deserialize)]
pub struct SessionsQuery {
    #[serde(default)]
    user_id: Option<String>,
}

pub async fn list_sessions(
    State(state): State<AppState>,
    Query(params): Query<SessionsQuery>,
) -> Response {
    match state.sessions.list_sessions(params.user_id.as_deref()).await {
        Ok(summaries) => Json(summaries).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn get_session(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.sessions.get_session(&id).await {
        Ok(Some(session)) => Json(session).into_response(),
        Ok(None) => OrchestratorError::SessionNotFound(id).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn delete_session(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.sessions.delete_session(&id).await {
        Ok(true) => Json(json!({ "status": "deleted", "session_id": id })).into_response(),
        Ok(false) => OrchestratorError::SessionNotFound(id).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Returns the full session so the caller can re-seed its local view and
/// continue the conversation. Rejects with 404 if the session is absent —
/// "resume" is meaningless for a session that was never created.
pub async fn resume_session(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.sessions.get_session(&id).await {
        Ok(Some(session)) => Json(session).into_response(),
        Ok(None) => OrchestratorError::SessionNotFound(id).into_response(),
        Err(e) => e.into_response(),
    }
}

