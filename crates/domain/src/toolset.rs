//! The external-toolset seam (spec §4.2 "MCP integration").
//!
//! An [`ExternalToolset`] is an opaque additional source of callable tools —
//! in practice an MCP server, exposing `ListTools`/`CallTool` the way the
//! spec names them. Defined here rather than in `crates/mcp` or
//! `crates/tools` so the Registry (in `tools`) can accept one without either
//! crate depending on the other.

use crate::tool::ToolDefinition;
use async_trait::async_trait;

#[async_trait]
pub trait ExternalToolset: Send + Sync {
    /// A label for logging (e.g. the MCP server's configured name).
    fn source_name(&self) -> &str;

    async fn list_tools(&self) -> Vec<ToolDefinition>;

    async fn call_tool(&self, name: &str, args: serde_json::Value) -> Result<serde_json::Value, String>;
}
