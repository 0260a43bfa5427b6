//! Workspace-category built-in: lets the model ask what workspace it's
//! operating in, since it has no other way to learn the root path.

use async_trait::async_trait;
use codeagent_domain::tool::{ToolCategory, ToolDefinition};
use serde_json::Value;

use crate::registry::{ToolContext, ToolHandler};

pub struct WorkspaceInfoTool;

#[async_trait]
impl ToolHandler for WorkspaceInfoTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "workspace_info".into(),
            description: "Report the workspace root path the other tools are constrained to.".into(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
            category: ToolCategory::Workspace,
            priority: 0,
            usage_hint: "report the workspace root path".into(),
        }
    }

    async fn invoke(&self, _args: Value, ctx: &ToolContext) -> Value {
        serde_json::json!({
            "success": true,
            "root": ctx.workspace_root.display().to_string(),
        })
    }
}
