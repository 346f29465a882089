//! # tool-search
//!
//! Progressive tool discovery for tool-calling language model conversations.
//!
//! Instead of sending every tool definition on every request, the catalog is
//! indexed per conversation and the model first sees a single synthetic
//! `toolSearchTool`. Tools named in its results become callable on the next
//! turn. Three interchangeable search engines back the index: regular
//! expression matching, keyword relevance ranking, and vector similarity.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use tool_search::advisor::{ChatRequest, ToolSearchAdvisor};
//! use tool_search::agent::ToolCallLoop;
//! use tool_search::tools::{FnTool, ToolCallback, ToolRegistry, ToolSelection};
//! use tool_search::tools::search::PatternSearchEngine;
//! use tool_search::types::Message;
//!
//! # async fn run(model: Arc<dyn tool_search::agent::ChatModel>) -> tool_search::Result<()> {
//! let time: Arc<dyn ToolCallback> =
//!     Arc::new(FnTool::constant("currentTime", "Current date and time", "12:00"));
//! let registry = Arc::new(ToolRegistry::with_tools([time]));
//!
//! let advisor = ToolSearchAdvisor::builder(Arc::new(PatternSearchEngine::new()))
//!     .resolver(registry.clone())
//!     .build();
//!
//! let agent = ToolCallLoop::builder(model)
//!     .advisor(advisor)
//!     .resolver(registry)
//!     .build();
//!
//! let request = ChatRequest::new("You are a helpful assistant.")
//!     .with_message(Message::user("What time is it?"))
//!     .with_tools(ToolSelection::default().with_name("currentTime"));
//! let result = agent.run(request).await?;
//! println!("{}", result.text);
//! # Ok(())
//! # }
//! ```

pub mod advisor;
pub mod agent;
pub mod config;
pub mod observability;
pub mod prompts;
pub mod tools;
pub mod types;

pub use advisor::{
    AdvisorChain, ChatRequest, ConversationAdvisor, ConversationCatalog, PreSelectAdvisor,
    ToolSearchAdvisor,
};
pub use agent::{ChatModel, ConversationResult, ModelRequest, StopReason, ToolCallLoop};
pub use config::{ConfigError, SearchBackend, ToolSearchSettings};
pub use tools::search::{
    KeywordSearchEngine, PatternSearchEngine, SearchEngine, SessionHousekeeping,
    VectorSearchEngine,
};
pub use tools::{
    FnTool, SchemaTool, ToolCallback, ToolContext, ToolRegistry, ToolResolver, ToolResult,
    ToolSearchTool, ToolSelection,
};
pub use types::{
    ContentBlock, Message, Role, SearchRequest, SearchResponse, SearchType, ToolDefinition,
    ToolError, ToolReference,
};

/// Error type for tool-search operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Keyword index could not be built, written, or queried.
    #[error("Index error: {0}")]
    Index(#[from] tantivy::TantivyError),

    /// Vector store rejected an add, delete, or similarity query.
    #[error("Vector store error: {0}")]
    VectorStore(String),

    /// Raised by [`Embedder`](tools::search::Embedder) implementations.
    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// JSON serialization or deserialization failed.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The chat model call failed. Raised by [`ChatModel`] implementations.
    #[error("Model error: {0}")]
    Model(String),

    /// Conversation state was missing or inconsistent.
    #[error("Session error: {0}")]
    Session(String),
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

/// Error category for unified error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Invalid or missing configuration
    Configuration,
    /// Index, vector store, or embedding failures
    Storage,
    /// Model or session errors that may succeed on a fresh conversation
    Transient,
    /// Malformed JSON from a host model or store
    Internal,
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) => ErrorCategory::Configuration,
            Error::Index(_) | Error::VectorStore(_) | Error::Embedding(_) => ErrorCategory::Storage,
            Error::Model(_) | Error::Session(_) => ErrorCategory::Transient,
            Error::Json(_) => ErrorCategory::Internal,
        }
    }

    /// Storage failures leave an index in an unknown state and end the conversation.
    pub fn is_fatal(&self) -> bool {
        self.category() == ErrorCategory::Storage
    }

    pub fn is_configuration_error(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }

    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }
}

/// Result type alias using the crate error.
pub type Result<T> = std::result::Result<T, Error>;
