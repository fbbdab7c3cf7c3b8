// src/agents/runtime.rs
// Agent Runtime Adapter: wraps an external LLM behind a stream of Events,
// cancellation-aware via the outbound mpsc channel closing. Grounded on
// mira-chat/src/server.rs's process_chat tool loop (bounded iterations,
// events emitted as they occur) and slb350-open-agent-sdk-rust's
// Message/ContentBlock/ToolUseBlock correlation-by-id.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::agents::Agent;
use crate::error::OrchestratorError;
use crate::mcp::PeerManager;
use crate::registry::ToolRegistry;
use crate::session::store::ConversationMessage;

/// Internal event union produced while an agent runs a single turn.
/// Converted to outbound SSE frames by `crate::events`.
#[derive(Debug, Clone)]
pub enum Event {
    Status(String),
    ToolCall { name: String, args: Value },
    ToolResult { name: String, output: String },
    Text(String),
    Error(String),
    Final { text: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// What one call to the underlying LLM returns: either it's done talking,
/// or it wants to call tools before continuing.
pub enum CompletionOutcome {
    Text(String),
    ToolCalls(Vec<ToolCallRequest>),
}

/// The seam behind which the actual LLM lives. The LLM's own reasoning is
/// out of scope (spec.md Non-goal); this trait is the black-box boundary.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        system: &str,
        history: &[ChatMessage],
        tool_schemas: &[Value],
    ) -> Result<CompletionOutcome, OrchestratorError>;
}

/// An `LlmClient` backed by any OpenAI-compatible `/chat/completions`
/// endpoint, grounded on slb350-open-agent-sdk-rust's `AgentOptions`
/// (model/base_url/api_key/temperature) and OpenAI wire types.
pub struct OpenAiCompatibleClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiCompatibleClient {
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn complete(
        &self,
        system: &str,
        history: &[ChatMessage],
        tool_schemas: &[Value],
    ) -> Result<CompletionOutcome, OrchestratorError> {
        let mut messages = vec![serde_json::json!({ "role": "system", "content": system })];
        for msg in history {
            messages.push(serde_json::json!({ "role": msg.role, "content": msg.content }));
        }

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });
        if !tool_schemas.is_empty() {
            body["tools"] = Value::Array(tool_schemas.to_vec());
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| OrchestratorError::Agent(e.to_string()))?;

        let payload: Value = response
            .json()
            .await
            .map_err(|e| OrchestratorError::Agent(e.to_string()))?;

        let choice = &payload["choices"][0]["message"];

        if let Some(calls) = choice.get("tool_calls").and_then(|v| v.as_array()) {
            if !calls.is_empty() {
                let mut requests = Vec::with_capacity(calls.len());
                for call in calls {
                    let id = call["id"].as_str().unwrap_or_default().to_string();
                    let name = call["function"]["name"].as_str().unwrap_or_default().to_string();
                    let raw_args = call["function"]["arguments"].as_str().unwrap_or("{}");
                    let arguments = serde_json::from_str(raw_args).unwrap_or(Value::Null);
                    requests.push(ToolCallRequest { id, name, arguments });
                }
                return Ok(CompletionOutcome::ToolCalls(requests));
            }
        }

        let text = choice["content"].as_str().unwrap_or_default().to_string();
        Ok(CompletionOutcome::Text(text))
    }
}

/// Drives one agent through a single user turn, invoking tools via the
/// peer manager and emitting Events as it goes.
pub struct AgentRuntime {
    llm: Arc<dyn LlmClient>,
    peers: Arc<PeerManager>,
    max_tool_iterations: u32,
}

impl AgentRuntime {
    pub fn new(llm: Arc<dyn LlmClient>, peers: Arc<PeerManager>, max_tool_iterations: u32) -> Self {
        Self {
            llm,
            peers,
            max_tool_iterations,
        }
    }

    fn tool_schemas(agent: &Agent) -> Vec<Value> {
        agent
            .tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": t.qualified_name,
                        "description": t.tool.description,
                        "parameters": t.tool.input_schema,
                    }
                })
            })
            .collect()
    }

    /// Runs `agent` against `user_turn`, given the prior conversation as
    /// `session_view`, streaming Events to `tx`. Cancellation-aware: once
    /// `tx`'s receiver is dropped, any tool call already in flight is
    /// raced against the channel closing and abandoned rather than
    /// awaited to completion.
    pub async fn run(
        &self,
        agent: &Agent,
        session_view: &[ConversationMessage],
        user_turn: &str,
        tx: mpsc::Sender<Event>,
    ) {
        let mut history: Vec<ChatMessage> = session_view
            .iter()
            .map(|m| ChatMessage {
                role: m.role.clone(),
                content: m.content.clone(),
            })
            .collect();
        history.push(ChatMessage {
            role: "user".to_string(),
            content: user_turn.to_string(),
        });

        let schemas = Self::tool_schemas(agent);
        let mut accumulated = String::new();

        for iteration in 0..self.max_tool_iterations {
            if tx.is_closed() {
                debug!("agent run cancelled before iteration {iteration}");
                return;
            }

            let outcome = match self.llm.complete(&agent.instruction, &history, &schemas).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    let _ = tx.send(Event::Error(e.to_string())).await;
                    return;
                }
            };

            match outcome {
                CompletionOutcome::Text(text) => {
                    accumulated.push_str(&text);
                    let _ = tx.send(Event::Text(text.clone())).await;
                    let _ = tx.send(Event::Final { text: accumulated }).await;
                    return;
                }
                CompletionOutcome::ToolCalls(calls) => {
                    history.push(ChatMessage {
                        role: "assistant".to_string(),
                        content: format!("(requested {} tool call(s))", calls.len()),
                    });

                    for call in calls {
                        let _ = tx
                            .send(Event::ToolCall {
                                name: call.name.clone(),
                                args: call.arguments.clone(),
                            })
                            .await;

                        let Some((peer_name, local_name)) = call.name.split_once("::") else {
                            warn!(tool = %call.name, "tool call name is not qualified as peer::tool");
                            continue;
                        };

                        let result = tokio::select! {
                            _ = tx.closed() => {
                                debug!("agent run cancelled mid tool-call, abandoning");
                                return;
                            }
                            result = self.peers.call_tool(peer_name, local_name, call.arguments.clone()) => result,
                        };

                        let output = match result {
                            Ok(tool_result) => tool_result.as_text(),
                            Err(e) => format!("error: {e}"),
                        };

                        let _ = tx
                            .send(Event::ToolResult {
                                name: call.name.clone(),
                                output: output.clone(),
                            })
                            .await;

                        history.push(ChatMessage {
                            role: "tool".to_string(),
                            content: output,
                        });
                    }
                }
            }
        }

        let _ = tx
            .send(Event::Error(format!(
                "exceeded max tool iterations ({})",
                self.max_tool_iterations
            )))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::Agent;
    use crate::config::OrchestratorConfig;
    use crate::mcp::PeerManager;
    use std::sync::Mutex as StdMutex;

    fn no_peers_config() -> OrchestratorConfig {
        OrchestratorConfig {
            model_name: "test-model".to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            sessions_dir: "/tmp/does-not-matter".to_string(),
            peers: Vec::new(),
            llm_api_key: "unused".to_string(),
            llm_base_url: "http://127.0.0.1:0".to_string(),
            mcp: crate::config::McpTuning {
                connect_timeout_ms: 1,
                request_timeout_ms: 1,
                max_retries: 0,
                retry_backoff_ms: 1,
            },
            max_tool_iterations: 3,
        }
    }

    async fn empty_peer_manager() -> Arc<PeerManager> {
        Arc::new(PeerManager::connect_all(&no_peers_config()).await)
    }

    struct ScriptedLlm {
        outcomes: StdMutex<Vec<CompletionOutcome>>,
    }

    impl ScriptedLlm {
        fn new(outcomes: Vec<CompletionOutcome>) -> Self {
            // Reverse so `pop()` yields them in call order.
            let mut outcomes = outcomes;
            outcomes.reverse();
            Self {
                outcomes: StdMutex::new(outcomes),
            }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(
            &self,
            _system: &str,
            _history: &[ChatMessage],
            _tool_schemas: &[Value],
        ) -> Result<CompletionOutcome, OrchestratorError> {
            Ok(self
                .outcomes
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(CompletionOutcome::Text(String::new())))
        }
    }

    struct FailingLlm;

    #[async_trait]
    impl LlmClient for FailingLlm {
        async fn complete(
            &self,
            _system: &str,
            _history: &[ChatMessage],
            _tool_schemas: &[Value],
        ) -> Result<CompletionOutcome, OrchestratorError> {
            Err(OrchestratorError::Agent("upstream LLM timed out".to_string()))
        }
    }

    fn plain_agent() -> Agent {
        Agent {
            name: "main".to_string(),
            instruction: "you are a test agent".to_string(),
            tools: Vec::new(),
        }
    }

    #[tokio::test]
    async fn text_only_reply_emits_text_then_final_and_stops() {
        let llm: Arc<dyn LlmClient> = Arc::new(ScriptedLlm::new(vec![CompletionOutcome::Text(
            "hello world".to_string(),
        )]));
        let runtime = AgentRuntime::new(llm, empty_peer_manager().await, 3);
        let (tx, mut rx) = mpsc::channel(16);

        runtime
            .run(&plain_agent(), &[], "hi", tx)
            .await;

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        assert!(matches!(&events[0], Event::Text(t) if t == "hello world"));
        assert!(matches!(&events[1], Event::Final { text } if text == "hello world"));
    }

    #[tokio::test]
    async fn llm_error_emits_error_event_and_no_final() {
        let llm: Arc<dyn LlmClient> = Arc::new(FailingLlm);
        let runtime = AgentRuntime::new(llm, empty_peer_manager().await, 3);
        let (tx, mut rx) = mpsc::channel(16);

        runtime.run(&plain_agent(), &[], "hi", tx).await;

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], Event::Error(msg) if msg.contains("upstream LLM timed out")));
    }

    #[tokio::test]
    async fn unqualified_tool_name_is_skipped_and_loop_eventually_errors() {
        // Every completion asks for an unqualified tool call, which the
        // runtime can't route to any peer, so it keeps looping until it
        // exhausts max_tool_iterations and emits an Error.
        let unqualified_call = CompletionOutcome::ToolCalls(vec![ToolCallRequest {
            id: "1".to_string(),
            name: "not_qualified".to_string(),
            arguments: serde_json::json!({}),
        }]);
        let llm: Arc<dyn LlmClient> = Arc::new(ScriptedLlm::new(vec![
            unqualified_call.clone_outcome(),
            unqualified_call.clone_outcome(),
            unqualified_call.clone_outcome(),
        ]));
        let runtime = AgentRuntime::new(llm, empty_peer_manager().await, 3);
        let (tx, mut rx) = mpsc::channel(16);

        runtime.run(&plain_agent(), &[], "hi", tx).await;

        let mut last = None;
        while let Some(event) = rx.recv().await {
            last = Some(event);
        }
        assert!(matches!(last, Some(Event::Error(msg)) if msg.contains("exceeded max tool iterations")));
    }

    #[tokio::test]
    async fn cancellation_stops_the_run_once_receiver_is_dropped() {
        let llm: Arc<dyn LlmClient> = Arc::new(ScriptedLlm::new(vec![CompletionOutcome::Text(
            "should never be observed".to_string(),
        )]));
        let runtime = AgentRuntime::new(llm, empty_peer_manager().await, 3);
        let (tx, rx) = mpsc::channel(16);
        drop(rx);

        // tx.is_closed() is checked at the top of the loop, so this
        // returns immediately without panicking on a closed channel send.
        runtime.run(&plain_agent(), &[], "hi", tx).await;
    }

    impl CompletionOutcome {
        fn clone_outcome(&self) -> Self {
            match self {
                CompletionOutcome::Text(t) => CompletionOutcome::Text(t.clone()),
                CompletionOutcome::ToolCalls(calls) => CompletionOutcome::ToolCalls(calls.clone()),
            }
        }
    }
}
