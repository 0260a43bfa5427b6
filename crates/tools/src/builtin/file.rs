//! File-category built-ins: thin [`ToolHandler`] wrappers over
//! [`crate::file_ops`], which already implements the workspace-root
//! containment contract verbatim from the teacher.

use async_trait::async_trait;
use codeagent_domain::tool::{ToolCategory, ToolDefinition};
use serde_json::Value;

use crate::file_ops;
use crate::registry::{ToolContext, ToolHandler};

fn ok_or_error<T: serde::Serialize>(result: Result<T, String>) -> Value {
    match result {
        Ok(v) => {
            let mut v = serde_json::to_value(v).unwrap_or(Value::Null);
            if let Value::Object(ref mut map) = v {
                map.insert("success".into(), Value::Bool(true));
            }
            v
        }
        Err(error) => serde_json::json!({ "success": false, "error": error }),
    }
}

pub struct ReadFileTool;

#[async_trait]
impl ToolHandler for ReadFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "read_file".into(),
            description: "Read a file's contents, optionally a line range, within the workspace.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string"},
                    "offset": {"type": "integer"},
                    "limit": {"type": "integer"}
                },
                "required": ["path"]
            }),
            category: ToolCategory::File,
            priority: 0,
            usage_hint: "read a file, optionally a line range".into(),
        }
    }

    async fn invoke(&self, args: Value, ctx: &ToolContext) -> Value {
        let req: file_ops::FileReadRequest = match serde_json::from_value(args) {
            Ok(r) => r,
            Err(e) => return serde_json::json!({"success": false, "error": format!("invalid_input: {e}")}),
        };
        ok_or_error(file_ops::file_read(&ctx.workspace_root, req).await)
    }
}

pub struct WriteFileTool;

#[async_trait]
impl ToolHandler for WriteFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "write_file".into(),
            description: "Create or overwrite a file within the workspace.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string"},
                    "content": {"type": "string"}
                },
                "required": ["path", "content"]
            }),
            category: ToolCategory::File,
            priority: 10,
            usage_hint: "create or overwrite a file".into(),
        }
    }

    async fn invoke(&self, args: Value, ctx: &ToolContext) -> Value {
        let req: file_ops::FileWriteRequest = match serde_json::from_value(args) {
            Ok(r) => r,
            Err(e) => return serde_json::json!({"success": false, "error": format!("invalid_input: {e}")}),
        };
        ok_or_error(file_ops::file_write(&ctx.workspace_root, req).await)
    }
}

pub struct AppendFileTool;

#[async_trait]
impl ToolHandler for AppendFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "append_file".into(),
            description: "Append content to an existing file within the workspace.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string"},
                    "content": {"type": "string"}
                },
                "required": ["path", "content"]
            }),
            category: ToolCategory::File,
            priority: 11,
            usage_hint: "append content to an existing file".into(),
        }
    }

    async fn invoke(&self, args: Value, ctx: &ToolContext) -> Value {
        let req: file_ops::FileAppendRequest = match serde_json::from_value(args) {
            Ok(r) => r,
            Err(e) => return serde_json::json!({"success": false, "error": format!("invalid_input: {e}")}),
        };
        ok_or_error(file_ops::file_append(&ctx.workspace_root, req).await)
    }
}

pub struct MoveFileTool;

#[async_trait]
impl ToolHandler for MoveFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "move_file".into(),
            description: "Move or rename a file within the workspace.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "source": {"type": "string"},
                    "destination": {"type": "string"}
                },
                "required": ["source", "destination"]
            }),
            category: ToolCategory::File,
            priority: 20,
            usage_hint: "move or rename a file".into(),
        }
    }

    async fn invoke(&self, args: Value, ctx: &ToolContext) -> Value {
        let req: file_ops::FileMoveRequest = match serde_json::from_value(args) {
            Ok(r) => r,
            Err(e) => return serde_json::json!({"success": false, "error": format!("invalid_input: {e}")}),
        };
        ok_or_error(file_ops::file_move(&ctx.workspace_root, req).await)
    }
}

pub struct DeleteFileTool;

#[async_trait]
impl ToolHandler for DeleteFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "delete_file".into(),
            description: "Delete a file or empty directory within the workspace.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {"path": {"type": "string"}},
                "required": ["path"]
            }),
            category: ToolCategory::File,
            priority: 30,
            usage_hint: "delete a file or empty directory".into(),
        }
    }

    async fn invoke(&self, args: Value, ctx: &ToolContext) -> Value {
        let req: file_ops::FileDeleteRequest = match serde_json::from_value(args) {
            Ok(r) => r,
            Err(e) => return serde_json::json!({"success": false, "error": format!("invalid_input: {e}")}),
        };
        ok_or_error(file_ops::file_delete(&ctx.workspace_root, req).await)
    }
}

pub struct ListDirTool;

#[async_trait]
impl ToolHandler for ListDirTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "list_dir".into(),
            description: "List directory contents within the workspace.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {"path": {"type": "string"}}
            }),
            category: ToolCategory::File,
            priority: 1,
            usage_hint: "list a directory's contents".into(),
        }
    }

    async fn invoke(&self, args: Value, ctx: &ToolContext) -> Value {
        let req: file_ops::FileListRequest = match serde_json::from_value(args) {
            Ok(r) => r,
            Err(e) => return serde_json::json!({"success": false, "error": format!("invalid_input: {e}")}),
        };
        ok_or_error(file_ops::file_list(&ctx.workspace_root, req).await)
    }
}
