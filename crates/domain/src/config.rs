//! Runtime configuration types shared across crates.
//!
//! `ProviderConfig`/`ProviderKind`/`AuthConfig`/`AuthMode` are trimmed from
//! the teacher's `config/llm.rs`: the `RoleConfig`/`RouterConfig`/smart-router
//! classifier machinery built around model-role fallback chains has no
//! counterpart here (there's only ever one selected `provider/model`), so it
//! is dropped rather than ported. `McpServerConfig` is restructured from the
//! teacher's `config/mcp.rs` array-of-servers-with-`id` shape into the
//! map-keyed-by-name shape the CLI's `--mcp-config` file uses.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which wire protocol a provider speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Google,
    GoogleVertex,
    OpenaiCompat,
}

/// How credentials are obtained for a provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Environment variable holding the API key (e.g. `GOOGLE_API_KEY`).
    #[serde(default)]
    pub env: Option<String>,
    /// Literal key, for programmatic construction or tests. Never logged.
    #[serde(default)]
    pub key: Option<String>,
}

impl AuthConfig {
    pub fn from_env(var: impl Into<String>) -> Self {
        Self {
            env: Some(var.into()),
            key: None,
        }
    }
}

/// One configured LLM backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub kind: ProviderKind,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub auth: AuthConfig,
    pub default_model: String,
    /// Vertex-only: GCP project id.
    #[serde(default)]
    pub project: Option<String>,
    /// Vertex-only: GCP region, e.g. `us-central1`.
    #[serde(default)]
    pub location: Option<String>,
}

/// Transport an MCP server is reached over (spec §6 config file shape).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum McpTransportKind {
    Stdio,
    Sse,
    Http,
}

/// One entry of the `servers` map in an `--mcp-config` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    #[serde(rename = "type")]
    pub transport: McpTransportKind,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub include_tools: Option<Vec<String>>,
    #[serde(default)]
    pub exclude_tools: Option<Vec<String>>,
}

impl McpServerConfig {
    /// Whether a tool named `name` passes this server's include/exclude
    /// filters (spec §6: MCP config's `include_tools`/`exclude_tools`).
    pub fn allows_tool(&self, name: &str) -> bool {
        if let Some(include) = &self.include_tools {
            if !include.iter().any(|t| t == name) {
                return false;
            }
        }
        if let Some(exclude) = &self.exclude_tools {
            if exclude.iter().any(|t| t == name) {
                return false;
            }
        }
        true
    }
}

/// Top-level `--mcp-config <file>` document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub servers: HashMap<String, McpServerConfig>,
}

/// Output rendering mode for the Display Pipeline (spec §6 `--output-format`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Rich,
    Plain,
    Json,
}

/// Fully resolved run configuration: the result of merging CLI flags,
/// environment variables, and defaults (spec §6's auto-detection order).
#[derive(Debug, Clone)]
pub struct Config {
    pub session_name: String,
    pub db_path: std::path::PathBuf,
    pub provider: ProviderConfig,
    pub mcp: McpConfig,
    pub output_format: OutputFormat,
    pub typewriter: bool,
    pub enable_thinking: bool,
    pub thinking_budget: Option<u32>,
    /// Tool dispatch default timeout, in seconds (spec §5: exec default 5m).
    pub exec_timeout_secs: u64,
    /// Hard cap on tool-call/model-turn iterations within one user turn.
    pub max_iterations: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mcp_server_include_filter() {
        let server = McpServerConfig {
            transport: McpTransportKind::Stdio,
            command: Some("mcp-fs".into()),
            args: vec![],
            url: None,
            env: HashMap::new(),
            include_tools: Some(vec!["read_file".into()]),
            exclude_tools: None,
        };
        assert!(server.allows_tool("read_file"));
        assert!(!server.allows_tool("write_file"));
    }

    #[test]
    fn mcp_server_exclude_filter() {
        let server = McpServerConfig {
            transport: McpTransportKind::Stdio,
            command: Some("mcp-fs".into()),
            args: vec![],
            url: None,
            env: HashMap::new(),
            include_tools: None,
            exclude_tools: Some(vec!["delete_file".into()]),
        };
        assert!(server.allows_tool("read_file"));
        assert!(!server.allows_tool("delete_file"));
    }

    #[test]
    fn mcp_config_json_roundtrip() {
        let json = r#"{
            "enabled": true,
            "servers": {
                "fs": {"type": "stdio", "command": "mcp-fs", "args": ["--root", "."]}
            }
        }"#;
        let cfg: McpConfig = serde_json::from_str(json).unwrap();
        assert!(cfg.enabled);
        assert!(cfg.servers.contains_key("fs"));
        assert_eq!(cfg.servers["fs"].command.as_deref(), Some("mcp-fs"));
    }
}
