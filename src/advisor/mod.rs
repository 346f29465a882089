//! Conversation advisors: hooks that shape each model request.
//!
//! An advisor sees a conversation three times: once at the start, before every
//! model call, and once at the end. The two bundled advisors decide which tools
//! the model sees on each turn:
//!
//! - [`ToolSearchAdvisor`]: progressive disclosure. The model starts with only
//!   the `toolSearchTool` and gains the tools its searches return.
//! - [`PreSelectAdvisor`]: searches the catalog with the user's text before
//!   every call and exposes exactly the matches.

mod catalog;
mod chain;
mod discovery;
mod preselect;

pub use catalog::ConversationCatalog;
pub use chain::{AdvisorChain, StartFailure};
pub use discovery::{ToolSearchAdvisor, ToolSearchAdvisorBuilder, extract_tool_references};
pub use preselect::{PreSelectAdvisor, PreSelectAdvisorBuilder};

use crate::tools::ToolSelection;
use crate::types::Message;

/// Default position in the chain; late, so other advisors see the final tool set.
pub const DEFAULT_ADVISOR_ORDER: i32 = i32::MAX - 1000;

/// Prefix of conversation ids minted when the host supplies none.
pub const DEFAULT_CONVERSATION_PREFIX: &str = "default-";

/// A model request as seen by advisors.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub system: String,
    pub messages: Vec<Message>,
    /// Tools exposed to the model for the next call.
    pub tools: ToolSelection,
    pub conversation_id: Option<String>,
}

impl ChatRequest {
    pub fn new(system: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            ..Default::default()
        }
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_messages(mut self, messages: impl IntoIterator<Item = Message>) -> Self {
        self.messages.extend(messages);
        self
    }

    pub fn with_tools(mut self, tools: ToolSelection) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_conversation_id(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    /// Text of every user message, newline separated.
    pub fn user_text(&self) -> String {
        self.messages
            .iter()
            .filter(|m| m.is_user())
            .map(Message::text)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub(crate) fn require_conversation_id(&self, advisor: &str) -> crate::Result<&str> {
        self.conversation_id.as_deref().ok_or_else(|| {
            crate::Error::Session(format!("{advisor}: conversation was not started"))
        })
    }
}

/// Hook into the lifecycle of a tool-calling conversation.
///
/// Lower [`order`](Self::order) runs first on the way in; end hooks run in
/// reverse order.
pub trait ConversationAdvisor: Send + Sync {
    fn name(&self) -> &str;

    fn order(&self) -> i32 {
        DEFAULT_ADVISOR_ORDER
    }

    /// Runs once before the first model call.
    fn on_conversation_start(&self, request: ChatRequest) -> crate::Result<ChatRequest> {
        Ok(request)
    }

    /// Runs before every model call, on a copy of the conversation state.
    fn before_model_call(&self, request: ChatRequest) -> crate::Result<ChatRequest> {
        Ok(request)
    }

    /// Runs once when the conversation ends, including after errors.
    fn on_conversation_end(&self, _request: &ChatRequest) -> crate::Result<()> {
        Ok(())
    }
}
