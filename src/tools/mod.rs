//! Tool callbacks, resolution, and per-session tool search.

mod context;
mod registry;
pub mod search;
mod search_tool;
mod traits;

pub use context::ToolContext;
pub use registry::{ToolRegistry, ToolResolver, ToolSelection};
pub use search_tool::{
    DEFAULT_TOOL_SEARCH_RESULTS, MAX_TOOL_SEARCH_RESULTS, ToolSearchInput, ToolSearchTool,
};
pub use traits::{FnTool, SchemaTool, ToolCallback, ToolResult};
