// src/error.rs
// Crate-wide error taxonomy. Typed variants for anything a caller needs to
// match on; `anyhow::Error` is used internally for context chains that
// only ever get logged or turned into one of these variants at the edge.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// Missing or invalid startup configuration. Fatal: the process never
    /// reaches a state where this is handled per-request.
    #[error("configuration error: {0}")]
    Config(String),

    /// A configured peer is unreachable or unhealthy.
    #[error("peer unavailable: {0}")]
    PeerUnavailable(String),

    /// JSON-RPC / SSE transport failure talking to a peer.
    #[error("transport error: {0}")]
    Transport(String),

    /// A peer reported a tool-level error (the call reached it, but failed).
    #[error("tool error: {0}")]
    Tool(String),

    /// The agent runtime failed independent of any specific tool or peer.
    #[error("agent error: {0}")]
    Agent(String),

    /// Referenced a session id that has no file on disk.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// The client disconnected or the caller dropped the stream.
    #[error("cancelled")]
    Cancelled,
}

impl IntoResponse for OrchestratorError {
    fn into_response(self) -> Response {
        let status = match &self {
            OrchestratorError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            OrchestratorError::PeerUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            OrchestratorError::Transport(_) => StatusCode::BAD_GATEWAY,
            OrchestratorError::Tool(_) => StatusCode::BAD_GATEWAY,
            OrchestratorError::Agent(_) => StatusCode::INTERNAL_SERVER_ERROR,
            OrchestratorError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            OrchestratorError::Cancelled => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
