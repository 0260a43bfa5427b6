//! Tool Registry & Dispatcher (spec §4.2).
//!
//! Built-in tools are plain structs implementing [`ToolHandler`], registered
//! once at startup from the composition root — the teacher's approach of
//! package-init-side-effect self-registration doesn't translate to Rust, so
//! this follows the spec's own suggested fix (§9 REDESIGN FLAGS): an
//! explicit `ToolRegistry::new()` + `register()` factory.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use codeagent_domain::error::{Error, Result};
use codeagent_domain::tool::ToolDefinition;
use codeagent_domain::toolset::ExternalToolset;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Everything a tool handler needs to run: where on disk it's allowed to
/// touch, and the turn's cancellation signal.
pub struct ToolContext {
    pub workspace_root: PathBuf,
    pub cancel: CancellationToken,
}

#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    /// Invoke the tool. Handler-level failures are returned as `Ok` with a
    /// `{success: false, error: ...}` payload (spec §4.2: "handler errors
    /// never abort the turn loop"); `Err` is reserved for schema/registry
    /// failures the dispatcher itself detects.
    async fn invoke(&self, args: Value, ctx: &ToolContext) -> Value;
}

/// Keeps the set of callable tools (built-in + MCP-provided) and dispatches
/// invocations to them by name.
pub struct ToolRegistry {
    builtins: HashMap<String, Arc<dyn ToolHandler>>,
    external: Vec<Arc<dyn ExternalToolset>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            builtins: HashMap::new(),
            external: Vec::new(),
        }
    }

    /// Install a built-in tool under a unique name. Idempotent by name;
    /// duplicate registration is an error.
    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) -> Result<()> {
        let name = handler.definition().name;
        if self.builtins.contains_key(&name) {
            return Err(Error::InvalidInput(format!(
                "tool '{name}' is already registered"
            )));
        }
        self.builtins.insert(name, handler);
        Ok(())
    }

    /// Attach an external toolset (an already-connected MCP server). Tools
    /// whose declared names clash with a built-in are silently shadowed by
    /// the built-in; a warning is logged at registration time.
    pub fn register_external(&mut self, toolset: Arc<dyn ExternalToolset>) {
        self.external.push(toolset);
    }

    /// Snapshot of all schemas, sorted for deterministic prompt generation:
    /// category order fixed, then priority, then name (spec §4.2's
    /// `Declarations()` contract). Built-ins are listed ahead of any
    /// same-named external tool (name collisions are pre-filtered out of
    /// the external list so each name appears exactly once).
    pub async fn declarations(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.builtins.values().map(|h| h.definition()).collect();
        let known: std::collections::HashSet<String> = defs.iter().map(|d| d.name.clone()).collect();

        for toolset in &self.external {
            for def in toolset.list_tools().await {
                if known.contains(&def.name) {
                    tracing::warn!(
                        tool = %def.name,
                        source = %toolset.source_name(),
                        "external tool name collides with a built-in; shadowed"
                    );
                    continue;
                }
                defs.push(def);
            }
        }

        defs.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.priority.cmp(&b.priority)).then_with(|| a.name.cmp(&b.name)));
        defs
    }

    /// Validate `args` against the tool's schema (delegated to the handler
    /// today — no separate JSON-schema validator is pulled in), call it, and
    /// return its result. Looks up built-ins first, then each external
    /// toolset in registration order.
    pub async fn invoke(&self, name: &str, args: Value, ctx: &ToolContext) -> Result<Value> {
        if let Some(handler) = self.builtins.get(name) {
            return Ok(handler.invoke(args, ctx).await);
        }
        for toolset in &self.external {
            let declared = toolset.list_tools().await;
            if declared.iter().any(|d| d.name == name) {
                return match toolset.call_tool(name, args).await {
                    Ok(result) => Ok(result),
                    Err(message) => Ok(serde_json::json!({ "success": false, "error": message })),
                };
            }
        }
        Err(Error::UnknownTool(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeagent_domain::tool::ToolCategory;

    struct EchoTool;

    #[async_trait]
    impl ToolHandler for EchoTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "echo".into(),
                description: "echoes its input".into(),
                parameters: serde_json::json!({"type": "object"}),
                category: ToolCategory::Workspace,
                priority: 0,
                usage_hint: "echo back whatever you send it".into(),
            }
        }

        async fn invoke(&self, args: Value, _ctx: &ToolContext) -> Value {
            args
        }
    }

    fn ctx() -> ToolContext {
        ToolContext {
            workspace_root: std::env::temp_dir(),
            cancel: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn register_and_invoke_roundtrip() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();
        let result = registry
            .invoke("echo", serde_json::json!({"x": 1}), &ctx())
            .await
            .unwrap();
        assert_eq!(result, serde_json::json!({"x": 1}));
    }

    #[tokio::test]
    async fn duplicate_registration_is_an_error() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();
        let err = registry.register(Arc::new(EchoTool));
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error() {
        let registry = ToolRegistry::new();
        let err = registry.invoke("nope", serde_json::json!({}), &ctx()).await;
        assert!(matches!(err, Err(Error::UnknownTool(_))));
    }

    #[tokio::test]
    async fn declarations_are_sorted_by_category_then_name() {
        struct Named(&'static str, ToolCategory, u32);
        #[async_trait]
        impl ToolHandler for Named {
            fn definition(&self) -> ToolDefinition {
                ToolDefinition {
                    name: self.0.into(),
                    description: "".into(),
                    parameters: serde_json::json!({}),
                    category: self.1,
                    priority: self.2,
                    usage_hint: "".into(),
                }
            }
            async fn invoke(&self, _args: Value, _ctx: &ToolContext) -> Value {
                Value::Null
            }
        }

        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Named("zzz", ToolCategory::File, 0))).unwrap();
        registry.register(Arc::new(Named("aaa", ToolCategory::File, 0))).unwrap();
        registry.register(Arc::new(Named("bbb", ToolCategory::Exec, 0))).unwrap();

        let defs = registry.declarations().await;
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["aaa", "zzz", "bbb"]);
    }

    #[tokio::test]
    async fn declarations_break_category_ties_by_priority_before_name() {
        struct Named(&'static str, ToolCategory, u32);
        #[async_trait]
        impl ToolHandler for Named {
            fn definition(&self) -> ToolDefinition {
                ToolDefinition {
                    name: self.0.into(),
                    description: "".into(),
                    parameters: serde_json::json!({}),
                    category: self.1,
                    priority: self.2,
                    usage_hint: "".into(),
                }
            }
            async fn invoke(&self, _args: Value, _ctx: &ToolContext) -> Value {
                Value::Null
            }
        }

        let mut registry = ToolRegistry::new();
        // Alphabetically "high" would sort first by name, but priority 5
        // must win over "low"'s priority 1 despite the name order.
        registry.register(Arc::new(Named("high", ToolCategory::File, 5))).unwrap();
        registry.register(Arc::new(Named("low", ToolCategory::File, 1))).unwrap();

        let defs = registry.declarations().await;
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["low", "high"]);
    }
}
