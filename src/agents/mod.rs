// src/agents/mod.rs
// Agent definitions: the main orchestrator agent (tools = union of every
// peer's tools) and one specialist per peer (tools = that peer's tools
// only, instruction = the fixed RCA report template). Grounded on
// original_source/Orchestrator/src/orchestrator/agent.py's agent
// construction and on slb350-open-agent-sdk-rust's AgentOptions shape for
// how a Rust agent config is assembled.

pub mod runtime;

use crate::registry::{RegisteredTool, ToolRegistry};

/// The fixed, verbatim specialist report template every specialist agent
/// is instructed to follow.
pub const SPECIALIST_REPORT_TEMPLATE: &str = "\
**🔍 {PEER_NAME} Investigation Report**

**Status**: [✅ No Issues / ⚠️ Issues Found / ❌ Critical Issues]

**Evidence Collected**:
...

**Findings**:
...

**Root Cause** (if identified):
...

**Recommendations**:
...";

/// Wraps a user query in the RCA investigation envelope every specialist
/// receives, verbatim from agent.py.
pub fn rca_envelope(user_input: &str) -> String {
    format!(
        "Investigate this issue and perform Root Cause Analysis:\n\n\
         {user_input}\n\n\
         Use your tools to:\n\
         1. Check relevant logs and events\n\
         2. Check resource status and health\n\
         3. Look for errors or anomalies\n\
         4. Identify potential root causes\n\n\
         Provide a detailed investigation report."
    )
}

#[derive(Debug, Clone)]
pub struct Agent {
    pub name: String,
    pub instruction: String,
    pub tools: Vec<RegisteredTool>,
}

impl Agent {
    /// The main orchestrator agent: sees every connected peer's tools.
    pub fn main_agent(registry: &ToolRegistry, peer_names: &[String]) -> Self {
        let instruction = format!(
            "You are the main orchestrator agent. You have access to tools from \
             the following platforms: {}. Use the tool whose platform matches \
             the user's request. For open-ended troubleshooting questions that \
             aren't specific to one platform, investigate using whichever tools \
             are relevant and explain your findings clearly.",
            peer_names.join(", ")
        );
        Self {
            name: "orchestrator_agent".to_string(),
            instruction,
            tools: registry.all().into_iter().cloned().collect(),
        }
    }

    /// A specialist agent scoped to one peer, instructed to always produce
    /// the fixed 5-section RCA report.
    pub fn specialist(peer_name: &str, registry: &ToolRegistry) -> Self {
        let template = SPECIALIST_REPORT_TEMPLATE.replace("{PEER_NAME}", &peer_name.to_uppercase());
        let instruction = format!(
            "You are the {peer_name} investigation specialist. You only have \
             access to {peer_name} tools. When asked to investigate, always \
             respond using exactly this report format:\n\n{template}"
        );
        Self {
            name: format!("{peer_name}_specialist"),
            instruction,
            tools: registry.for_peer(peer_name).into_iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rca_envelope_contains_user_input_and_numbered_steps() {
        let envelope = rca_envelope("the build is broken");
        assert!(envelope.contains("the build is broken"));
        assert!(envelope.contains("1. Check relevant logs and events"));
        assert!(envelope.ends_with("Provide a detailed investigation report."));
    }

    #[test]
    fn specialist_instruction_embeds_uppercased_peer_name() {
        let registry = ToolRegistry::new();
        let agent = Agent::specialist("jenkins", &registry);
        assert!(agent.instruction.contains("**🔍 JENKINS Investigation Report**"));
        assert_eq!(agent.name, "jenkins_specialist");
    }
}
