//! Tool search instructions.

/// Appended to the system prompt when progressive tool discovery is active.
///
/// Starts with a blank line so it can be concatenated to any existing prompt.
pub const DEFAULT_SYSTEM_PROMPT_SUFFIX: &str = r#"

# Tool discovery

Only a small set of tools is loaded at first. Many more exist and can be discovered with the `toolSearchTool` tool.

- Before telling the user you cannot do something, call `toolSearchTool` with a short natural language description of the capability you need (for example "current time in a city" or "send an email").
- Each call returns the names of matching tools. Their full definitions become available on your next turn, and you can then call them directly.
- Search again with different keywords if the results do not fit the task. You can search several times in one conversation. If a tool you found earlier is no longer listed, search for it again.
- Do not guess tool names. Only call tools whose definitions you have been given.
"#;
