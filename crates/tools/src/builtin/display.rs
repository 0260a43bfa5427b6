//! Display-category built-ins: `display_message` and `update_task_list`.
//!
//! Spec §4.5: these two tool names carry pre-formatted markdown payloads
//! that the Display Pipeline renders as-is, bypassing its generic
//! tool-result formatter. The Registry/Dispatcher treat them like any other
//! tool — the special-casing lives entirely in `crates/display`, keyed off
//! these exact names.

use async_trait::async_trait;
use codeagent_domain::tool::{ToolCategory, ToolDefinition};
use serde_json::Value;

use crate::registry::{ToolContext, ToolHandler};

pub struct DisplayMessageTool;

#[async_trait]
impl ToolHandler for DisplayMessageTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "display_message".into(),
            description: "Show a pre-formatted markdown message to the user directly.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {"markdown": {"type": "string"}},
                "required": ["markdown"]
            }),
            category: ToolCategory::Display,
            priority: 0,
            usage_hint: "show a markdown message to the user".into(),
        }
    }

    async fn invoke(&self, args: Value, _ctx: &ToolContext) -> Value {
        let markdown = args.get("markdown").and_then(Value::as_str).unwrap_or_default();
        serde_json::json!({"success": true, "markdown": markdown})
    }
}

pub struct UpdateTaskListTool;

#[async_trait]
impl ToolHandler for UpdateTaskListTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "update_task_list".into(),
            description: "Replace the visible task list with a pre-formatted markdown checklist.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {"markdown": {"type": "string"}},
                "required": ["markdown"]
            }),
            category: ToolCategory::Display,
            priority: 1,
            usage_hint: "replace the visible task list".into(),
        }
    }

    async fn invoke(&self, args: Value, _ctx: &ToolContext) -> Value {
        let markdown = args.get("markdown").and_then(Value::as_str).unwrap_or_default();
        serde_json::json!({"success": true, "markdown": markdown})
    }
}
