//! Built-in tool handlers, grouped by the categories named in spec §6
//! ("file, edit, search, exec, display, workspace").
//!
//! Individual tool implementations are explicitly out of the kernel's
//! specified scope (spec §1: "the kernel only sees them through the
//! tool-registry contract") — these exist so the crate is a runnable agent,
//! not a stub, but none of their internals are load-bearing for the kernel's
//! contracts.

pub mod display;
pub mod edit;
pub mod exec_tool;
pub mod file;
pub mod search;
pub mod workspace;

use crate::registry::ToolRegistry;
use codeagent_domain::error::Result;
use std::sync::Arc;

/// Register every built-in tool into `registry`.
pub fn register_all(registry: &mut ToolRegistry) -> Result<()> {
    registry.register(Arc::new(file::ReadFileTool))?;
    registry.register(Arc::new(file::WriteFileTool))?;
    registry.register(Arc::new(file::AppendFileTool))?;
    registry.register(Arc::new(file::MoveFileTool))?;
    registry.register(Arc::new(file::DeleteFileTool))?;
    registry.register(Arc::new(file::ListDirTool))?;
    registry.register(Arc::new(search::GrepTool))?;
    registry.register(Arc::new(edit::EditFileTool))?;
    registry.register(Arc::new(exec_tool::ExecTool))?;
    registry.register(Arc::new(display::DisplayMessageTool))?;
    registry.register(Arc::new(display::UpdateTaskListTool))?;
    registry.register(Arc::new(workspace::WorkspaceInfoTool))?;
    Ok(())
}
