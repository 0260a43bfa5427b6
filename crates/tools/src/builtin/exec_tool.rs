//! Exec-category built-in: wraps [`crate::exec`] as a [`ToolHandler`].

use async_trait::async_trait;
use codeagent_domain::tool::{ToolCategory, ToolDefinition};
use serde_json::Value;

use crate::exec::{self, ExecRequest};
use crate::registry::{ToolContext, ToolHandler};

pub struct ExecTool;

#[async_trait]
impl ToolHandler for ExecTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "exec".into(),
            description: "Run a shell command in the workspace and return its combined output. \
                          Defaults to a 5 minute timeout."
                .into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "command": {"type": "string"},
                    "workdir": {"type": "string"},
                    "timeout_sec": {"type": "integer"},
                    "env": {"type": "object", "additionalProperties": {"type": "string"}}
                },
                "required": ["command"]
            }),
            category: ToolCategory::Exec,
            priority: 0,
            usage_hint: "run a shell command in the workspace".into(),
        }
    }

    async fn invoke(&self, args: Value, ctx: &ToolContext) -> Value {
        let mut req: ExecRequest = match serde_json::from_value(args) {
            Ok(r) => r,
            Err(e) => return serde_json::json!({"success": false, "error": format!("invalid_input: {e}")}),
        };
        if req.workdir.is_none() {
            req.workdir = Some(ctx.workspace_root.display().to_string());
        }

        match exec::exec(req, &ctx.cancel).await {
            Ok(resp) => {
                let mut value = serde_json::to_value(&resp).unwrap_or(Value::Null);
                if let Value::Object(ref mut map) = value {
                    map.insert("success".into(), Value::Bool(resp.exit_code == Some(0)));
                }
                value
            }
            Err(error) => serde_json::json!({"success": false, "error": error}),
        }
    }
}
