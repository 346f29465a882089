//! Conversation execution.

mod model;
mod tool_loop;

pub use model::{ChatModel, ModelRequest};
pub use tool_loop::{
    ConversationResult, DEFAULT_MAX_ITERATIONS, StopReason, ToolCallLoop, ToolCallLoopBuilder,
};
