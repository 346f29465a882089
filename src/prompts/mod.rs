//! Prompt text appended to the system prompt by the discovery advisor.

mod tool_search;

pub use tool_search::DEFAULT_SYSTEM_PROMPT_SUFFIX;
