// src/mcp/protocol.rs
// JSON-RPC 2.0 wire types for talking to MCP peers, and the tool descriptor
// shape peers advertise. Grounded on backend/src/mcp/protocol.rs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: Option<u64>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id: Some(id),
            method: method.into(),
            params,
        }
    }

    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id: None,
            method: method.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// A single tool as advertised by a peer's `tools/list` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpTool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
}

impl McpTool {
    /// Qualifies this tool's name with its owning peer, so the registry can
    /// disambiguate identically-named tools across peers.
    pub fn qualified_name(&self, peer_name: &str) -> String {
        format!("{peer_name}::{}", self.name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListToolsResult {
    pub tools: Vec<McpTool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultContent {
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: Vec<ToolResultContent>,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResult {
    /// Flattens the content blocks into one string for display/prompting.
    pub fn as_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| c.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_with_id() {
        let req = JsonRpcRequest::new(1, "tools/list", None);
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["id"], 1);
        assert_eq!(v["method"], "tools/list");
        assert!(v.get("params").is_none());
    }

    #[test]
    fn notification_has_no_id() {
        let req = JsonRpcRequest::notification("initialized", None);
        let v = serde_json::to_value(&req).unwrap();
        assert!(v["id"].is_null());
    }

    #[test]
    fn qualified_name_uses_double_colon() {
        let tool = McpTool {
            name: "build".to_string(),
            description: String::new(),
            input_schema: Value::Null,
        };
        assert_eq!(tool.qualified_name("jenkins"), "jenkins::build");
    }
}
