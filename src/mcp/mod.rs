// src/mcp/mod.rs
// MCP Peer Connector. Grounded on backend/src/mcp/mod.rs's McpManager:
// connect_all tolerates per-peer failures, get_all_tools aggregates across
// peers, call_tool routes to the owning peer and records health.

pub mod health;
pub mod protocol;
pub mod transport;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::config::{OrchestratorConfig, PeerConfig, PeerTransport};
use crate::error::OrchestratorError;
use health::HealthMonitor;
use protocol::{JsonRpcRequest, ListToolsResult, McpTool, ToolResult};
use transport::{McpTransport, SseTransport, StreamableHttpTransport};

/// One connected peer: its declared config plus the transport used to
/// reach it.
pub struct Peer {
    pub config: PeerConfig,
    transport: Arc<dyn McpTransport>,
}

impl Peer {
    pub fn new(config: PeerConfig, transport: Arc<dyn McpTransport>) -> Self {
        Self { config, transport }
    }

    pub async fn list_tools(&self) -> Result<Vec<McpTool>, OrchestratorError> {
        let request = JsonRpcRequest::new(0, "tools/list", None);
        let response = self.transport.send(request).await?;
        if let Some(err) = response.error {
            return Err(OrchestratorError::Transport(err.message));
        }
        let result: ListToolsResult = serde_json::from_value(response.result.unwrap_or_default())
            .map_err(|e| OrchestratorError::Transport(e.to_string()))?;
        Ok(result.tools)
    }

    pub async fn call_tool(&self, name: &str, args: Value) -> Result<ToolResult, OrchestratorError> {
        let params = serde_json::json!({ "name": name, "arguments": args });
        let request = JsonRpcRequest::new(0, "tools/call", Some(params));
        let response = self.transport.send(request).await?;
        if let Some(err) = response.error {
            return Err(OrchestratorError::Tool(err.message));
        }
        let result: ToolResult = serde_json::from_value(response.result.unwrap_or_default())
            .map_err(|e| OrchestratorError::Tool(e.to_string()))?;
        if result.is_error {
            return Err(OrchestratorError::Tool(result.as_text()));
        }
        Ok(result)
    }
}

/// Connects to and holds every configured peer, tracking health and
/// exposing the raw per-peer tool lists the registry aggregates.
///
/// `order` carries registration order from `config.peers` — plain
/// `HashMap` iteration order is arbitrary per-process, but the query
/// router's tie-break and the RCA coordinator's report ordering both
/// depend on a fixed, configuration-driven peer order.
pub struct PeerManager {
    peers: HashMap<String, Arc<Peer>>,
    order: Vec<String>,
    health: Arc<HealthMonitor>,
}

impl PeerManager {
    fn build_transport(peer: &PeerConfig, config: &OrchestratorConfig) -> Arc<dyn McpTransport> {
        match peer.transport {
            PeerTransport::Sse => {
                Arc::new(SseTransport::new(peer.url.clone(), peer.headers.clone(), config.mcp))
            }
            PeerTransport::StreamableHttp => Arc::new(StreamableHttpTransport::new(
                peer.url.clone(),
                peer.headers.clone(),
                config.mcp,
            )),
        }
    }

    /// Connects to every enabled peer. A peer that fails to connect is
    /// logged and skipped rather than aborting startup — mirrors
    /// McpManager::connect_all's per-server try/catch.
    pub async fn connect_all(config: &OrchestratorConfig) -> Self {
        let health = Arc::new(HealthMonitor::new());
        let mut peers = HashMap::new();
        let mut order = Vec::new();

        for peer_config in &config.peers {
            if !peer_config.enabled {
                continue;
            }
            health.register(&peer_config.name).await;
            let transport = Self::build_transport(peer_config, config);
            let peer = Peer::new(peer_config.clone(), transport);

            match peer.list_tools().await {
                Ok(tools) => {
                    info!(peer = %peer_config.name, tool_count = tools.len(), "connected to MCP peer");
                    health.record_success(&peer_config.name).await;
                    order.push(peer_config.name.clone());
                    peers.insert(peer_config.name.clone(), Arc::new(peer));
                }
                Err(e) => {
                    warn!(peer = %peer_config.name, error = %e, "failed to connect to MCP peer");
                    health.record_failure(&peer_config.name, e.to_string()).await;
                }
            }
        }

        Self { peers, order, health }
    }

    pub fn peer(&self, name: &str) -> Option<Arc<Peer>> {
        self.peers.get(name).cloned()
    }

    /// Registration order, not `HashMap` iteration order — the query
    /// router's tie-break and the RCA coordinator's per-peer report
    /// sections both require this to be fixed by configuration.
    pub fn peer_names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub async fn all_tools(&self) -> HashMap<String, Vec<McpTool>> {
        let mut out = HashMap::new();
        for (name, peer) in &self.peers {
            match peer.list_tools().await {
                Ok(tools) => {
                    out.insert(name.clone(), tools);
                }
                Err(e) => {
                    warn!(peer = %name, error = %e, "failed to list tools");
                }
            }
        }
        out
    }

    pub async fn call_tool(
        &self,
        peer_name: &str,
        tool_name: &str,
        args: Value,
    ) -> Result<ToolResult, OrchestratorError> {
        let peer = self
            .peer(peer_name)
            .ok_or_else(|| OrchestratorError::PeerUnavailable(peer_name.to_string()))?;

        match peer.call_tool(tool_name, args).await {
            Ok(result) => {
                self.health.record_success(peer_name).await;
                Ok(result)
            }
            Err(e) => {
                self.health.record_failure(peer_name, e.to_string()).await;
                Err(e)
            }
        }
    }

    pub fn health(&self) -> Arc<HealthMonitor> {
        self.health.clone()
    }
}
