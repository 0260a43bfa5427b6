//! Edit-category built-in: an exact string replacement, the smallest patch
//! primitive a model can reliably emit (read the current content, propose an
//! `old_string`/`new_string` pair, the tool fails loudly on ambiguity rather
//! than guessing).

use async_trait::async_trait;
use codeagent_domain::tool::{ToolCategory, ToolDefinition};
use serde::Deserialize;
use serde_json::Value;
use tokio::fs;

use crate::file_ops::validate_path;
use crate::registry::{ToolContext, ToolHandler};

#[derive(Debug, Deserialize)]
struct EditFileRequest {
    path: String,
    old_string: String,
    new_string: String,
    #[serde(default)]
    replace_all: bool,
}

pub struct EditFileTool;

#[async_trait]
impl ToolHandler for EditFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "edit_file".into(),
            description: "Replace an exact substring in a workspace file with another.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string"},
                    "old_string": {"type": "string"},
                    "new_string": {"type": "string"},
                    "replace_all": {"type": "boolean"}
                },
                "required": ["path", "old_string", "new_string"]
            }),
            category: ToolCategory::Edit,
            priority: 0,
            usage_hint: "replace an exact substring in a file".into(),
        }
    }

    async fn invoke(&self, args: Value, ctx: &ToolContext) -> Value {
        let req: EditFileRequest = match serde_json::from_value(args) {
            Ok(r) => r,
            Err(e) => return serde_json::json!({"success": false, "error": format!("invalid_input: {e}")}),
        };

        let path = match validate_path(&ctx.workspace_root, &req.path) {
            Ok(p) => p,
            Err(e) => return serde_json::json!({"success": false, "error": e}),
        };

        let content = match fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) => {
                return serde_json::json!({
                    "success": false,
                    "error": format!("failed to read '{}': {e}", req.path)
                })
            }
        };

        let occurrences = content.matches(req.old_string.as_str()).count();
        if occurrences == 0 {
            return serde_json::json!({
                "success": false,
                "error": format!("old_string not found in '{}'", req.path)
            });
        }
        if occurrences > 1 && !req.replace_all {
            return serde_json::json!({
                "success": false,
                "error": format!(
                    "old_string matches {occurrences} times in '{}'; pass replace_all or give more context",
                    req.path
                )
            });
        }

        let updated = if req.replace_all {
            content.replace(&req.old_string, &req.new_string)
        } else {
            content.replacen(&req.old_string, &req.new_string, 1)
        };

        if let Err(e) = fs::write(&path, updated).await {
            return serde_json::json!({
                "success": false,
                "error": format!("failed to write '{}': {e}", req.path)
            });
        }

        serde_json::json!({
            "success": true,
            "path": req.path,
            "replacements": if req.replace_all { occurrences } else { 1 },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    fn ctx(root: &std::path::Path) -> ToolContext {
        ToolContext {
            workspace_root: root.to_path_buf(),
            cancel: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn edit_replaces_unique_match() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "foo bar baz").unwrap();

        let result = EditFileTool
            .invoke(
                serde_json::json!({"path": "a.txt", "old_string": "bar", "new_string": "qux"}),
                &ctx(dir.path()),
            )
            .await;
        assert_eq!(result["success"], true);
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "foo qux baz");
    }

    #[tokio::test]
    async fn edit_rejects_ambiguous_match_without_replace_all() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "foo foo foo").unwrap();

        let result = EditFileTool
            .invoke(
                serde_json::json!({"path": "a.txt", "old_string": "foo", "new_string": "bar"}),
                &ctx(dir.path()),
            )
            .await;
        assert_eq!(result["success"], false);
    }

    #[tokio::test]
    async fn edit_replace_all_replaces_every_occurrence() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "foo foo foo").unwrap();

        let result = EditFileTool
            .invoke(
                serde_json::json!({
                    "path": "a.txt", "old_string": "foo", "new_string": "bar", "replace_all": true
                }),
                &ctx(dir.path()),
            )
            .await;
        assert_eq!(result["success"], true);
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "bar bar bar");
    }
}
