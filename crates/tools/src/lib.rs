//! Built-in tools and the Tool Registry & Dispatcher (spec §4.2).

pub mod builtin;
pub mod exec;
pub mod file_ops;
pub mod registry;

pub use builtin::register_all;
pub use registry::{ToolContext, ToolHandler, ToolRegistry};
