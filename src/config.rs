// src/config.rs
// Startup configuration, composed from environment variables the way
// MiraConfig composes its domain configs in the teacher backend.

use crate::error::OrchestratorError;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct PeerConfig {
    pub name: String,
    pub url: String,
    pub transport: PeerTransport,
    pub enabled: bool,
    /// Keywords that make a user turn "specific" to this peer (Query Router).
    pub keywords: Vec<String>,
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerTransport {
    Sse,
    StreamableHttp,
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub model_name: String,
    pub host: String,
    pub port: u16,
    pub sessions_dir: String,
    pub peers: Vec<PeerConfig>,
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub mcp: McpTuning,
    pub max_tool_iterations: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct McpTuning {
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl McpTuning {
    fn from_env() -> Self {
        Self {
            connect_timeout_ms: env_u64("MCP_CONNECT_TIMEOUT_MS", 5_000),
            request_timeout_ms: env_u64("MCP_REQUEST_TIMEOUT_MS", 30_000),
            max_retries: env_u64("MCP_MAX_RETRIES", 3) as u32,
            retry_backoff_ms: env_u64("MCP_RETRY_BACKOFF_MS", 500),
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl OrchestratorConfig {
    pub fn from_env() -> Result<Self, OrchestratorError> {
        dotenvy::dotenv().ok();

        let llm_api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        if llm_api_key.trim().is_empty() {
            print_missing_api_key_instructions();
            return Err(OrchestratorError::Config(
                "OPENAI_API_KEY is not set".to_string(),
            ));
        }

        Ok(Self {
            model_name: env_str("ORCHESTRATOR_MODEL", "gpt-4o-mini"),
            host: env_str("ORCHESTRATOR_HOST", "0.0.0.0"),
            port: env_str("ORCHESTRATOR_PORT", "8080")
                .parse()
                .unwrap_or(8080),
            sessions_dir: env_str("ORCHESTRATOR_SESSIONS_DIR", "./sessions"),
            peers: load_peers(),
            llm_base_url: env_str("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            llm_api_key,
            mcp: McpTuning::from_env(),
            max_tool_iterations: env_u64("ORCHESTRATOR_MAX_TOOL_ITERATIONS", 10) as u32,
        })
    }
}

/// Builds the peer list the way `config.py`'s `_load_mcp_servers` does:
/// one well-known block per platform, each independently enabled.
fn load_peers() -> Vec<PeerConfig> {
    let mut peers = Vec::new();

    if env_bool("JENKINS_MCP_ENABLED", true) {
        peers.push(PeerConfig {
            name: "jenkins".to_string(),
            url: env_str("JENKINS_MCP_URL", "http://localhost:8000/sse"),
            transport: PeerTransport::Sse,
            enabled: true,
            keywords: vec![
                "jenkins".into(),
                "pipeline".into(),
                "build job".into(),
                "jenkins job".into(),
                "jenkinsfile".into(),
                "ci/cd pipeline".into(),
            ],
            headers: HashMap::new(),
        });
    }

    if env_bool("KUBERNETES_MCP_ENABLED", false) {
        peers.push(PeerConfig {
            name: "kubernetes".to_string(),
            url: env_str("KUBERNETES_MCP_URL", "http://localhost:8001/sse"),
            transport: PeerTransport::Sse,
            enabled: true,
            keywords: vec![
                "kubernetes".into(),
                "k8s".into(),
                "pod".into(),
                "deployment".into(),
                "kubectl".into(),
                "namespace".into(),
                "container".into(),
                "helm".into(),
                "kube".into(),
            ],
            headers: HashMap::new(),
        });
    }

    if env_bool("GITHUB_MCP_ENABLED", false) {
        let mut headers = HashMap::new();
        if let Ok(token) = std::env::var("GITHUB_TOKEN") {
            if !token.is_empty() {
                headers.insert("Authorization".to_string(), format!("Bearer {token}"));
            }
        }
        peers.push(PeerConfig {
            name: "github".to_string(),
            url: env_str("GITHUB_MCP_URL", "https://api.githubcopilot.com/mcp/"),
            transport: PeerTransport::StreamableHttp,
            enabled: true,
            keywords: vec!["github".into(), "pull request".into(), "issue".into()],
            headers,
        });
    }

    peers
}

/// Fatal startup failure: print a boxed instruction block, mirroring
/// `original_source/Orchestrator/src/orchestrator/config.py`'s
/// `check_api_key()`.
fn print_missing_api_key_instructions() {
    eprintln!(
        "\n\
         ╔══════════════════════════════════════════════════════════════╗\n\
         ║  Missing OPENAI_API_KEY                                        ║\n\
         ║                                                                  ║\n\
         ║  Set it before starting the orchestrator, e.g.:                 ║\n\
         ║    export OPENAI_API_KEY=sk-...                                 ║\n\
         ║  or place it in a .env file in the working directory.           ║\n\
         ╚══════════════════════════════════════════════════════════════╝\n"
    );
}
