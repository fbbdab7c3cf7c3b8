// src/api/mod.rs
// HTTP/SSE surface. Grounded on mira-chat/src/server.rs's `create_router`
// (CORS layer, DefaultBodyLimit on the request-heavy route, state shared
// via an Arc) and backend/src/api/mod.rs's route nesting.

pub mod chat;
pub mod http;
pub mod sessions;

use std::sync::Arc;

use axum::http::{header, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::orchestrator::Orchestrator;

pub type AppState = Arc<Orchestrator>;

/// Request bodies larger than this are rejected before they reach a
/// handler, mirroring mira-chat/src/server.rs's `SYNC_MAX_BODY_BYTES`.
const CHAT_MAX_BODY_BYTES: usize = 256 * 1024;

pub fn build_router(state: AppState, static_dir: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/health", get(http::health))
        .route("/servers", get(http::servers))
        .route(
            "/chat",
            post(chat::chat_sync).layer(axum::extract::DefaultBodyLimit::max(CHAT_MAX_BODY_BYTES)),
        )
        .route(
            "/chat/stream",
            post(chat::chat_stream).layer(axum::extract::DefaultBodyLimit::max(CHAT_MAX_BODY_BYTES)),
        )
        .route("/sessions", get(sessions::list_sessions))
        .route("/sessions/{id}", get(sessions::get_session))
        .route("/sessions/{id}", delete(sessions::delete_session))
        .route("/sessions/{id}/resume", post(sessions::resume_session))
        .fallback_service(ServeDir::new(static_dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
