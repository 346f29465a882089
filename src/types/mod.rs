//! Core types shared by the search engines, tools and advisors.

pub mod content;
mod message;
pub mod search;
mod tool;

pub use content::{ContentBlock, ToolResultBlock, ToolResultContent, ToolUseBlock};
pub use message::{Message, Role};
pub use search::{SearchMetadata, SearchRequest, SearchResponse, SearchType};
pub use tool::{ToolDefinition, ToolError, ToolReference};
