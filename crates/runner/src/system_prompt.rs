//! Builds the system prompt's tool-declaration section from the registry's
//! snapshot (spec §4.2 "Dynamic prompt integration", §6 "tool-declaration
//! surface to LLM"). No teacher module builds a prompt this way — its system
//! context is assembled by a much larger context-pack builder out of scope
//! here — so this is written directly from the spec's description of what
//! the model sees: one line per tool, grouped by category.

use codeagent_domain::tool::{ToolCategory, ToolDefinition};

const BASE_PROMPT: &str = "You are an autonomous coding agent. Use the tools below when they help \
you answer accurately; otherwise respond directly. Call at most the tools you need.";

/// Render the full system prompt: the fixed preamble plus a category-grouped
/// tool listing built from an already-sorted [`ToolDefinition`] snapshot.
pub fn build_system_prompt(tools: &[ToolDefinition]) -> String {
    if tools.is_empty() {
        return BASE_PROMPT.to_string();
    }

    let mut out = String::from(BASE_PROMPT);
    out.push_str("\n\nAvailable tools:\n");

    let mut current_category: Option<ToolCategory> = None;
    for tool in tools {
        if current_category != Some(tool.category) {
            out.push_str(&format!("\n{}:\n", category_label(tool.category)));
            current_category = Some(tool.category);
        }
        out.push_str(&format!("- {}: {}\n", tool.name, tool.usage_hint));
    }

    out
}

fn category_label(category: ToolCategory) -> &'static str {
    match category {
        ToolCategory::File => "File",
        ToolCategory::Search => "Search",
        ToolCategory::Edit => "Edit",
        ToolCategory::Exec => "Exec",
        ToolCategory::Display => "Display",
        ToolCategory::Workspace => "Workspace",
        ToolCategory::Mcp => "MCP",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(name: &str, category: ToolCategory) -> ToolDefinition {
        ToolDefinition {
            name: name.into(),
            description: "does a thing".into(),
            parameters: serde_json::json!({}),
            category,
            priority: 0,
            usage_hint: "does a thing, briefly".into(),
        }
    }

    #[test]
    fn empty_tools_list_yields_base_prompt_only() {
        assert_eq!(build_system_prompt(&[]), BASE_PROMPT);
    }

    #[test]
    fn groups_consecutive_same_category_tools_under_one_header() {
        let tools = vec![tool("read_file", ToolCategory::File), tool("write_file", ToolCategory::File), tool("exec", ToolCategory::Exec)];
        let prompt = build_system_prompt(&tools);
        assert_eq!(prompt.matches("File:").count(), 1);
        assert_eq!(prompt.matches("Exec:").count(), 1);
        assert!(prompt.contains("read_file"));
        assert!(prompt.contains("write_file"));
    }
}
