//! `codeagent-mcp` — MCP (Model Context Protocol) client for the agent
//! runtime kernel.
//!
//! This crate provides:
//! - JSON-RPC 2.0 protocol types for communicating with MCP servers.
//! - A stdio transport that spawns child processes and communicates over stdin/stdout.
//! - An `McpManager` that manages connections to multiple MCP servers,
//!   orchestrates tool discovery and dispatch, and implements
//!   `codeagent_domain::toolset::ExternalToolset` so the Tool Registry can
//!   fold MCP-provided tools in alongside the built-ins.
//!
//! # Usage
//!
//! ```rust,ignore
//! use codeagent_mcp::{McpConfig, McpManager};
//!
//! let config: McpConfig = /* from the --mcp-config file */;
//! let manager = McpManager::from_config(&config).await;
//! registry.register_external(Arc::new(manager));
//! ```

pub mod config;
pub mod manager;
pub mod protocol;
pub mod transport;

// Re-exports for convenience.
pub use config::{McpConfig, McpServerConfig, McpTransportKind};
pub use manager::{McpError, McpManager};
pub use protocol::McpToolDef;
