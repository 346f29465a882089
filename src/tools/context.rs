//! Per-call context handed to tool callbacks.

/// Conversation the tool invocation belongs to, when the loop knows it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolContext {
    conversation_id: Option<String>,
}

impl ToolContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_conversation(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: Some(conversation_id.into()),
        }
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }
}
