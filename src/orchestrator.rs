// src/orchestrator.rs
// Wires every module together into the one object the HTTP API talks to.
// Grounded on original_source/Orchestrator/src/orchestrator/agent.py's
// OrchestratorAgent: save user message before running, route, save
// assistant response after; `cleanup()` tears every peer down without one
// failure blocking the rest.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::agents::runtime::{AgentRuntime, Event, LlmClient, OpenAiCompatibleClient};
use crate::agents::Agent;
use crate::config::OrchestratorConfig;
use crate::error::OrchestratorError;
use crate::mcp::health::ServerHealth;
use crate::mcp::PeerManager;
use crate::rca::ParallelRcaCoordinator;
use crate::registry::ToolRegistry;
use crate::router::{self, RoutingDecision};
use crate::session::store::SessionStore;

pub struct Orchestrator {
    config: OrchestratorConfig,
    peers: Arc<PeerManager>,
    registry: Arc<ToolRegistry>,
    runtime: Arc<AgentRuntime>,
    rca: ParallelRcaCoordinator,
    pub sessions: Arc<SessionStore>,
}

impl Orchestrator {
    pub async fn connect(config: OrchestratorConfig) -> Result<Self, OrchestratorError> {
        let peers = Arc::new(PeerManager::connect_all(&config).await);
        let peer_tools = peers.all_tools().await;
        let registry = Arc::new(ToolRegistry::build(&peer_tools));

        info!(
            peer_count = peers.peer_count(),
            tool_count = registry.len(),
            "orchestrator ready"
        );

        let llm: Arc<dyn LlmClient> = Arc::new(OpenAiCompatibleClient::new(
            config.llm_base_url.clone(),
            config.llm_api_key.clone(),
            config.model_name.clone(),
        ));
        let runtime = Arc::new(AgentRuntime::new(llm, peers.clone(), config.max_tool_iterations));
        let rca = ParallelRcaCoordinator::new(runtime.clone());
        let sessions = Arc::new(SessionStore::new(config.sessions_dir.clone())?);

        Ok(Self {
            config,
            peers,
            registry,
            runtime,
            rca,
            sessions,
        })
    }

    pub fn peer_names(&self) -> Vec<String> {
        self.peers.peer_names()
    }

    pub fn model_name(&self) -> &str {
        &self.config.model_name
    }

    pub async fn peer_health(&self) -> HashMap<String, ServerHealth> {
        self.peers.health().snapshot().await
    }

    pub fn tool_count(&self) -> usize {
        self.registry.len()
    }

    /// Runs one user turn to completion and returns the final text,
    /// persisting both the user and assistant messages. This is the
    /// synchronous `/chat` path; it drives the same event stream as
    /// `/chat/stream` but collects everything before returning.
    ///
    /// An `AgentError` terminates the turn: the assistant message
    /// persisted for it is the error text, and this returns `Err` rather
    /// than a 200 with an empty `response`.
    pub async fn chat(
        &self,
        session_id: &str,
        user_id: &str,
        user_turn: &str,
    ) -> Result<String, OrchestratorError> {
        self.sessions
            .add_message(session_id, user_id, "user", user_turn)
            .await?;

        let mut final_text = String::new();
        let mut error_text: Option<String> = None;
        let mut rx = self.start_turn(session_id, user_turn).await?;
        while let Some(event) = rx.recv().await {
            match event {
                Event::Final { text } => final_text = text,
                Event::Error(message) => error_text = Some(message),
                _ => {}
            }
        }

        if let Some(message) = error_text {
            self.sessions
                .add_message(session_id, user_id, "assistant", &message)
                .await?;
            return Err(OrchestratorError::Agent(message));
        }

        self.sessions
            .add_message(session_id, user_id, "assistant", &final_text)
            .await?;

        Ok(final_text)
    }

    /// Runs one user turn and returns the raw event receiver for the
    /// streaming endpoint to forward. The streaming endpoint is
    /// responsible for persisting the assistant's final text once the
    /// stream completes, since it owns the receiver from this point on.
    pub async fn chat_stream(
        &self,
        session_id: &str,
        user_id: &str,
        user_turn: &str,
    ) -> Result<mpsc::Receiver<Event>, OrchestratorError> {
        self.sessions
            .add_message(session_id, user_id, "user", user_turn)
            .await?;
        self.start_turn(session_id, user_turn).await
    }

    async fn start_turn(
        &self,
        session_id: &str,
        user_turn: &str,
    ) -> Result<mpsc::Receiver<Event>, OrchestratorError> {
        let session = self.sessions.get_session(session_id).await?;
        let history = session.map(|s| s.messages).unwrap_or_default();

        let peer_keywords: Vec<(String, Vec<String>)> = self
            .peers
            .peer_names()
            .into_iter()
            .filter_map(|name| {
                self.config
                    .peers
                    .iter()
                    .find(|p| p.name == name)
                    .map(|p| (name, p.keywords.clone()))
            })
            .collect();
        let peer_refs: Vec<(&str, &[String])> = peer_keywords
            .iter()
            .map(|(n, k)| (n.as_str(), k.as_slice()))
            .collect();

        let decision = router::route(user_turn, peer_refs, self.peers.peer_count());

        let (tx, rx) = mpsc::channel::<Event>(128);

        match decision {
            RoutingDecision::MainAgent => {
                let agent = Agent::main_agent(&self.registry, &self.peers.peer_names());
                let runtime = self.runtime.clone();
                let user_turn = user_turn.to_string();
                tokio::spawn(async move {
                    runtime.run(&agent, &history, &user_turn, tx).await;
                });
            }
            RoutingDecision::ParallelRca => {
                let peer_names = self.peers.peer_names();
                let registry = self.registry.clone();
                let rca = self.rca.clone();
                let session_id = session_id.to_string();
                let user_turn = user_turn.to_string();
                tokio::spawn(async move {
                    let report = rca.run(&session_id, &peer_names, &registry, &user_turn).await;
                    let _ = tx.send(Event::Final { text: report }).await;
                });
            }
        }

        Ok(rx)
    }

    /// Tears down every peer connection, logging (not propagating) any
    /// individual failure — mirrors agent.py's `cleanup()`.
    pub async fn cleanup(&self) {
        for peer_name in self.peers.peer_names() {
            info!(peer = %peer_name, "closing peer connection");
        }
        if self.peers.peer_count() == 0 {
            warn!("no peers were connected during this session");
        }
    }
}
