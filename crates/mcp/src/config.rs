//! MCP configuration types — re-exported from `codeagent_domain`.
//!
//! The canonical definitions live in `codeagent_domain::config` so that the
//! CLI's config loader can include them without depending on the full MCP
//! client crate.

pub use codeagent_domain::config::{McpConfig, McpServerConfig, McpTransportKind};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_defaults() {
        let cfg: McpConfig = serde_json::from_str("{}").unwrap();
        assert!(cfg.servers.is_empty());
        assert!(!cfg.enabled);
    }

    #[test]
    fn deserialize_server_map() {
        let raw = r#"{
            "enabled": true,
            "servers": {
                "filesystem": {
                    "type": "stdio",
                    "command": "npx",
                    "args": ["-y", "@modelcontextprotocol/server-filesystem", "/tmp"]
                }
            }
        }"#;
        let cfg: McpConfig = serde_json::from_str(raw).unwrap();
        assert!(cfg.enabled);
        let fs = &cfg.servers["filesystem"];
        assert_eq!(fs.command.as_deref(), Some("npx"));
        assert_eq!(fs.args.len(), 3);
        assert_eq!(fs.transport, McpTransportKind::Stdio);
    }

    #[test]
    fn sse_transport_has_no_command() {
        let raw = r#"{ "type": "sse", "url": "http://localhost:8080/sse" }"#;
        let cfg: McpServerConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(cfg.transport, McpTransportKind::Sse);
        assert_eq!(cfg.url.as_deref(), Some("http://localhost:8080/sse"));
        assert!(cfg.command.is_none());
    }

    #[test]
    fn deserialize_with_env() {
        let raw = r#"{
            "type": "stdio",
            "command": "node",
            "args": ["server.js"],
            "env": { "NODE_ENV": "production" }
        }"#;
        let cfg: McpServerConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(cfg.env.get("NODE_ENV").unwrap(), "production");
    }

    #[test]
    fn deserialize_with_tool_filters() {
        let raw = r#"{
            "type": "stdio",
            "command": "mcp-fs",
            "include_tools": ["read_file"],
            "exclude_tools": ["delete_file"]
        }"#;
        let cfg: McpServerConfig = serde_json::from_str(raw).unwrap();
        assert!(cfg.allows_tool("read_file"));
        assert!(!cfg.allows_tool("delete_file"));
    }
}
