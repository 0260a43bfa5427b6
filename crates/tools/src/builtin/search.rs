//! Search-category built-in: a plain substring grep across workspace files.
//!
//! No regex engine is pulled in for this — literal substring search is what
//! the spec's example scenario (§8) actually exercises, and the kernel's
//! scope note explicitly treats "grep" internals as an external collaborator
//! whose implementation detail doesn't matter to the Runner/Registry
//! contract.

use async_trait::async_trait;
use codeagent_domain::tool::{ToolCategory, ToolDefinition};
use serde::Deserialize;
use serde_json::Value;

use crate::file_ops::validate_path;
use crate::registry::{ToolContext, ToolHandler};

#[derive(Debug, Deserialize)]
struct GrepRequest {
    pattern: String,
    #[serde(default = "default_dot")]
    path: String,
    #[serde(default)]
    max_results: Option<usize>,
}

fn default_dot() -> String {
    ".".into()
}

pub struct GrepTool;

#[async_trait]
impl ToolHandler for GrepTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "grep".into(),
            description: "Search files under a workspace path for a literal substring.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "pattern": {"type": "string"},
                    "path": {"type": "string"},
                    "max_results": {"type": "integer"}
                },
                "required": ["pattern"]
            }),
            category: ToolCategory::Search,
            priority: 0,
            usage_hint: "search workspace files for a literal substring".into(),
        }
    }

    async fn invoke(&self, args: Value, ctx: &ToolContext) -> Value {
        let req: GrepRequest = match serde_json::from_value(args) {
            Ok(r) => r,
            Err(e) => return serde_json::json!({"success": false, "error": format!("invalid_input: {e}")}),
        };
        let root = match validate_path(&ctx.workspace_root, &req.path) {
            Ok(p) => p,
            Err(e) => return serde_json::json!({"success": false, "error": e}),
        };
        let max_results = req.max_results.unwrap_or(200);

        let mut matches = Vec::new();
        walk(&root, &req.pattern, max_results, &mut matches);

        serde_json::json!({
            "success": true,
            "matches": matches,
            "truncated": matches.len() >= max_results,
        })
    }
}

fn walk(dir: &std::path::Path, pattern: &str, max_results: usize, matches: &mut Vec<Value>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        if matches.len() >= max_results {
            return;
        }
        let path = entry.path();
        if path.is_dir() {
            if path.file_name().and_then(|n| n.to_str()) == Some(".git") {
                continue;
            }
            walk(&path, pattern, max_results, matches);
        } else if let Ok(content) = std::fs::read_to_string(&path) {
            for (lineno, line) in content.lines().enumerate() {
                if matches.len() >= max_results {
                    return;
                }
                if line.contains(pattern) {
                    matches.push(serde_json::json!({
                        "path": path.display().to_string(),
                        "line": lineno + 1,
                        "text": line,
                    }));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn grep_finds_matching_lines() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello\nworld\nhello again\n").unwrap();

        let ctx = ToolContext {
            workspace_root: dir.path().to_path_buf(),
            cancel: CancellationToken::new(),
        };
        let result = GrepTool
            .invoke(serde_json::json!({"pattern": "hello"}), &ctx)
            .await;
        assert_eq!(result["success"], true);
        assert_eq!(result["matches"].as_array().unwrap().len(), 2);
    }
}
