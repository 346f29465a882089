//! Tool use and result block types.

use serde::{Deserialize, Serialize};

use crate::tools::ToolResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUseBlock {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultBlock {
    pub tool_use_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<ToolResultContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolResultContent {
    Text(String),
    Blocks(Vec<ToolResultContentBlock>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolResultContentBlock {
    Text { text: String },
}

impl ToolResultBlock {
    pub fn success(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            content: Some(ToolResultContent::Text(content.into())),
            is_error: None,
        }
    }

    pub fn error(tool_use_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            content: Some(ToolResultContent::Text(message.into())),
            is_error: Some(true),
        }
    }

    pub fn from_tool_result(tool_use_id: &str, result: &ToolResult) -> Self {
        match result {
            ToolResult::Success(content) => Self::success(tool_use_id, content.clone()),
            ToolResult::Error(e) => Self::error(tool_use_id, e.to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }

    /// Concatenated text payload, if any.
    pub fn text(&self) -> Option<String> {
        match self.content.as_ref()? {
            ToolResultContent::Text(text) => Some(text.clone()),
            ToolResultContent::Blocks(blocks) => Some(
                blocks
                    .iter()
                    .map(|ToolResultContentBlock::Text { text }| text.as_str())
                    .collect::<Vec<_>>()
                    .join(""),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_result_success() {
        let result = ToolResultBlock::success("tool_123", "[\"weather\"]");
        assert_eq!(result.tool_use_id, "tool_123");
        assert!(!result.is_error());
        assert_eq!(result.text().as_deref(), Some("[\"weather\"]"));
    }

    #[test]
    fn test_tool_result_error() {
        let result = ToolResultBlock::error("tool_456", "unknown tool");
        assert_eq!(result.is_error, Some(true));
        assert!(result.is_error());
    }

    #[test]
    fn test_blocks_text_joined() {
        let result = ToolResultBlock {
            tool_use_id: "t".into(),
            content: Some(ToolResultContent::Blocks(vec![
                ToolResultContentBlock::Text { text: "[\"a\",".into() },
                ToolResultContentBlock::Text { text: "\"b\"]".into() },
            ])),
            is_error: None,
        };
        assert_eq!(result.text().as_deref(), Some("[\"a\",\"b\"]"));
        let bare: ToolResultBlock =
            serde_json::from_str(r#"{"tool_use_id": "t"}"#).unwrap();
        assert!(bare.text().is_none());
    }
}
