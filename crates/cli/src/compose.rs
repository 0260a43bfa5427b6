//! Composition root (spec §9's "Pass these explicitly through an
//! application struct built at `main`; avoid singletons"): wires the
//! Session Store, Tool Registry, MCP toolset, and Provider Adapter into one
//! [`Runner`], built once per process.

use std::sync::Arc;

use codeagent_domain::config::Config;
use codeagent_mcp::McpManager;
use codeagent_providers::build_provider;
use codeagent_runner::Runner;
use codeagent_store::SessionStore;
use codeagent_tools::ToolRegistry;

pub struct App {
    pub store: Arc<SessionStore>,
    pub runner: Arc<Runner>,
}

pub async fn build(config: &Config) -> anyhow::Result<App> {
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| anyhow::anyhow!("creating {}: {e}", parent.display()))?;
    }
    let store = Arc::new(SessionStore::open(&config.db_path).map_err(|e| anyhow::anyhow!("opening session store: {e}"))?);

    let mut registry = ToolRegistry::new();
    codeagent_tools::register_all(&mut registry).map_err(|e| anyhow::anyhow!("registering built-in tools: {e}"))?;

    if config.mcp.enabled && !config.mcp.servers.is_empty() {
        tracing::info!(count = config.mcp.servers.len(), "initializing MCP servers");
        let mcp = McpManager::from_config(&config.mcp).await;
        tracing::info!(servers = mcp.server_count(), tools = mcp.tool_count(), "MCP tools discovered");
        registry.register_external(Arc::new(mcp));
    }
    let registry = Arc::new(registry);

    let provider = build_provider(&config.provider).map_err(|e| anyhow::anyhow!("initializing LLM provider: {e}"))?;

    let workspace_root = std::env::current_dir().map_err(|e| anyhow::anyhow!("reading current directory: {e}"))?;

    let runner = Arc::new(Runner::new(store.clone(), registry, provider, config.max_iterations, workspace_root));

    Ok(App { store, runner })
}
