//! Tool error types.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    #[error("execution failed: {message}")]
    ExecutionFailed { message: String },

    #[error("unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("missing conversation id for {tool}")]
    MissingConversation { tool: String },
}

impl ToolError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn execution_failed(message: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            message: message.into(),
        }
    }

    pub fn unknown_tool(name: impl Into<String>) -> Self {
        Self::UnknownTool { name: name.into() }
    }

    pub fn missing_conversation(tool: impl Into<String>) -> Self {
        Self::MissingConversation { tool: tool.into() }
    }
}
