//! Chat model seam.

use async_trait::async_trait;

use crate::types::{Message, ToolDefinition};

/// One model invocation: prompt, history, and the tools exposed this turn.
#[derive(Debug, Clone, Default)]
pub struct ModelRequest {
    pub system: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
}

impl ModelRequest {
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }
}

/// A model that answers with a single assistant message, possibly containing
/// tool use blocks.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn call(&self, request: &ModelRequest) -> crate::Result<Message>;
}
