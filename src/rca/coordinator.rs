// src/rca/coordinator.rs
// Parallel RCA Coordinator: fans out to every connected specialist
// concurrently, waits for all of them, and synthesizes a single report
// mechanically (no further LLM call). Concurrency shape grounded on
// src/advisory/mod.rs's `council()` (futures::future::join_all over
// per-branch async blocks, errors captured rather than short-circuiting
// the batch); report text grounded verbatim on
// original_source/Orchestrator/src/orchestrator/agent.py's
// `_parallel_rca` / `_combine_rca_results`.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc;

use crate::agents::runtime::{AgentRuntime, Event};
use crate::agents::{rca_envelope, Agent};
use crate::registry::ToolRegistry;
use crate::session::store::ConversationMessage;

#[derive(Clone)]
pub struct ParallelRcaCoordinator {
    runtime: Arc<AgentRuntime>,
}

/// One specialist's finished investigation: either its report text, or the
/// formatted error line if that branch failed.
struct BranchResult {
    peer_name: String,
    report: String,
}

impl ParallelRcaCoordinator {
    pub fn new(runtime: Arc<AgentRuntime>) -> Self {
        Self { runtime }
    }

    /// Runs every specialist concurrently against `user_input`, in the
    /// registration order given by `peer_names`, and returns the combined
    /// mechanical synthesis.
    pub async fn run(
        &self,
        session_id: &str,
        peer_names: &[String],
        registry: &ToolRegistry,
        user_input: &str,
    ) -> String {
        let envelope = rca_envelope(user_input);

        let branches = peer_names.iter().map(|peer_name| {
            let runtime = self.runtime.clone();
            let agent = Agent::specialist(peer_name, registry);
            let envelope = envelope.clone();
            let peer_name = peer_name.clone();
            let branch_session_id = format!("{session_id}_{peer_name}");

            async move {
                let (tx, mut rx) = mpsc::channel::<Event>(64);
                let run_handle = tokio::spawn(async move {
                    runtime.run(&agent, &[] as &[ConversationMessage], &envelope, tx).await;
                });

                let mut final_text: Option<String> = None;
                let mut error: Option<String> = None;

                while let Some(event) = rx.recv().await {
                    match event {
                        Event::Final { text } => final_text = Some(text),
                        Event::Error(message) => error = Some(message),
                        _ => {}
                    }
                }

                let _ = run_handle.await;

                let report = match (final_text, error) {
                    (Some(text), _) => text,
                    (None, Some(message)) => format!("❌ Error during investigation: {message}"),
                    (None, None) => {
                        "❌ Error during investigation: no response from specialist agent".to_string()
                    }
                };

                tracing::debug!(session_id = %branch_session_id, peer = %peer_name, "specialist branch complete");

                BranchResult { peer_name, report }
            }
        });

        let results = join_all(branches).await;
        Self::combine(user_input, &results)
    }

    /// Deterministic, mechanical synthesis — no LLM involved. Order
    /// follows `results`, which preserves registration order because
    /// `join_all` returns outputs in the same order as its input futures
    /// regardless of completion order.
    fn combine(original_query: &str, results: &[BranchResult]) -> String {
        let platforms = results
            .iter()
            .map(|r| r.peer_name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        let mut out = String::new();
        out.push_str("# 🔍 Parallel Root Cause Analysis Report\n\n");
        out.push_str(&format!("**Issue**: {original_query}\n\n"));
        out.push_str(&format!("**Platforms Investigated**: {platforms}\n\n"));
        out.push_str("---\n\n");

        for result in results {
            out.push_str(&format!("## 📊 {} Investigation\n\n", result.peer_name.to_uppercase()));
            out.push_str(&result.report);
            out.push_str("\n\n---\n\n");
        }

        out.push_str("## 📋 Combined Summary\n\n");
        out.push_str("Review the findings above from each platform to identify the root cause.\n");
        out.push_str("Cross-reference issues that appear in multiple platforms.");

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_preserves_registration_order_and_fixed_framing() {
        let results = vec![
            BranchResult {
                peer_name: "jenkins".to_string(),
                report: "all clear".to_string(),
            },
            BranchResult {
                peer_name: "kubernetes".to_string(),
                report: "❌ Error during investigation: timeout".to_string(),
            },
        ];

        let combined = ParallelRcaCoordinator::combine("builds are failing", &results);

        assert!(combined.starts_with("# 🔍 Parallel Root Cause Analysis Report"));
        assert!(combined.contains("**Issue**: builds are failing"));
        assert!(combined.contains("**Platforms Investigated**: jenkins, kubernetes"));
        let jenkins_pos = combined.find("## 📊 JENKINS Investigation").unwrap();
        let k8s_pos = combined.find("## 📊 KUBERNETES Investigation").unwrap();
        assert!(jenkins_pos < k8s_pos, "jenkins must appear before kubernetes");
        assert!(combined.contains("❌ Error during investigation: timeout"));
        assert!(combined.ends_with(
            "Review the findings above from each platform to identify the root cause.\n\
             Cross-reference issues that appear in multiple platforms."
        ));
    }
}
