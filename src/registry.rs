// src/registry.rs
// Tool Registry: aggregates tools across all connected peers into one flat
// namespace, qualifying names as `<peer>::<tool>`. Grounded on
// backend/src/mcp/mod.rs's McpManager::get_all_tools aggregation loop and
// backend/src/mcp/protocol.rs's McpTool::to_openai_format qualification.

use std::collections::HashMap;

use tracing::warn;

use crate::mcp::protocol::McpTool;

#[derive(Debug, Clone)]
pub struct RegisteredTool {
    pub qualified_name: String,
    pub peer_name: String,
    pub tool: McpTool,
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from a peer -> tools map, last-registered-wins on
    /// a bare-name collision (two peers advertising a tool with the same
    /// local name), logging a warning when that happens.
    pub fn build(peer_tools: &HashMap<String, Vec<McpTool>>) -> Self {
        let mut registry = Self::new();
        let mut seen_bare_names: HashMap<String, String> = HashMap::new();

        for (peer_name, tools) in peer_tools {
            for tool in tools {
                if let Some(existing_peer) = seen_bare_names.get(&tool.name) {
                    warn!(
                        tool = %tool.name,
                        previous_peer = %existing_peer,
                        new_peer = %peer_name,
                        "tool name collision across peers; last-registered wins"
                    );
                }
                seen_bare_names.insert(tool.name.clone(), peer_name.clone());

                let qualified_name = tool.qualified_name(peer_name);
                if registry.tools.contains_key(&qualified_name) {
                    warn!(tool = %qualified_name, "duplicate tool registration; last-registered wins");
                }
                registry.tools.insert(
                    qualified_name.clone(),
                    RegisteredTool {
                        qualified_name,
                        peer_name: peer_name.clone(),
                        tool: tool.clone(),
                    },
                );
            }
        }

        registry
    }

    pub fn resolve(&self, qualified_name: &str) -> Option<&RegisteredTool> {
        self.tools.get(qualified_name)
    }

    pub fn all(&self) -> Vec<&RegisteredTool> {
        self.tools.values().collect()
    }

    pub fn for_peer(&self, peer_name: &str) -> Vec<&RegisteredTool> {
        self.tools
            .values()
            .filter(|t| t.peer_name == peer_name)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn tool(name: &str) -> McpTool {
        McpTool {
            name: name.to_string(),
            description: String::new(),
            input_schema: Value::Null,
        }
    }

    #[test]
    fn qualifies_tools_by_peer() {
        let mut peer_tools = HashMap::new();
        peer_tools.insert("jenkins".to_string(), vec![tool("build")]);
        peer_tools.insert("kubernetes".to_string(), vec![tool("get_pods")]);

        let registry = ToolRegistry::build(&peer_tools);
        assert_eq!(registry.len(), 2);
        assert!(registry.resolve("jenkins::build").is_some());
        assert!(registry.resolve("kubernetes::get_pods").is_some());
    }

    #[test]
    fn for_peer_filters_correctly() {
        let mut peer_tools = HashMap::new();
        peer_tools.insert("jenkins".to_string(), vec![tool("build"), tool("deploy")]);
        peer_tools.insert("kubernetes".to_string(), vec![tool("get_pods")]);

        let registry = ToolRegistry::build(&peer_tools);
        assert_eq!(registry.for_peer("jenkins").len(), 2);
        assert_eq!(registry.for_peer("kubernetes").len(), 1);
    }

    #[test]
    fn colliding_bare_names_both_survive_under_distinct_qualified_names() {
        let mut peer_tools = HashMap::new();
        peer_tools.insert("jenkins".to_string(), vec![tool("status")]);
        peer_tools.insert("kubernetes".to_string(), vec![tool("status")]);

        let registry = ToolRegistry::build(&peer_tools);
        // Qualification keeps both reachable even though the bare name collides.
        assert_eq!(registry.len(), 2);
        assert!(registry.resolve("jenkins::status").is_some());
        assert!(registry.resolve("kubernetes::status").is_some());
    }
}
