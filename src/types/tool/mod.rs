//! Tool-related types.

mod definition;
mod error;
mod reference;

pub use definition::ToolDefinition;
pub use error::ToolError;
pub use reference::ToolReference;
