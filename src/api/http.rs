// src/api/http.rs
// Health/status endpoints. Grounded on mira-chat/src/server.rs's
// `status_handler` and backend/src/api/http/health.rs's richer per-peer
// health reporting.

use axum::extract::State;
use axum::response::Json;
use serde::Serialize;
use serde_json::{json, Value};

use crate::api::AppState;
use crate::mcp::health::ServerHealth;

#[derive(Serialize)]
struct PeerStatus {
    name: String,
    connected: bool,
    consecutive_failures: u32,
    success_rate: f64,
    last_error: Option<String>,
}

impl PeerStatus {
    fn from_parts(name: String, health: ServerHealth) -> Self {
        Self {
            name,
            connected: health.connected,
            consecutive_failures: health.consecutive_failures,
            success_rate: health.success_rate(),
            last_error: health.last_error,
        }
    }
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let health = state.peer_health().await;
    let all_connected = health.values().all(|h| h.connected);

    Json(json!({
        "status": if all_connected { "healthy" } else { "error" },
        "model": state.model_name(),
        "mcp_servers": state.peer_names(),
    }))
}

pub async fn servers(State(state): State<AppState>) -> Json<Value> {
    let health = state.peer_health().await;
    let peers: Vec<PeerStatus> = health
        .into_iter()
        .map(|(name, status)| PeerStatus::from_parts(name, status))
        .collect();

    Json(json!({ "servers": peers }))
}
