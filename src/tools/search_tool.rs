//! The synthetic tool the model calls to discover other tools.

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{debug, error};

use super::context::ToolContext;
use super::search::SearchEngine;
use super::traits::{SchemaTool, ToolResult};
use crate::types::{SearchRequest, ToolError};

/// Result count when neither the advisor nor the model picks one.
pub const DEFAULT_TOOL_SEARCH_RESULTS: usize = 5;
/// Largest result count the model may ask for.
pub const MAX_TOOL_SEARCH_RESULTS: usize = 10;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ToolSearchInput {
    /// A natural language search query describing the tool capability you need. Be specific and include relevant keywords.
    pub query: String,
    /// Maximum number of tool references to return (1-10). Default is 5.
    #[serde(default)]
    #[schemars(range(min = 1, max = 10))]
    pub max_results: Option<usize>,
    /// Optional filter to narrow search to a specific tool category.
    #[serde(default)]
    pub category_filter: Option<String>,
}

/// Searches the conversation's tool index and returns matching tool names as
/// a JSON array of strings.
///
/// The conversation id is read from the [`ToolContext`]; it doubles as the
/// search session id.
pub struct ToolSearchTool {
    engine: Arc<dyn SearchEngine>,
    max_results: Option<usize>,
}

impl ToolSearchTool {
    pub const TOOL_NAME: &'static str = "toolSearchTool";

    pub fn new(engine: Arc<dyn SearchEngine>) -> Self {
        Self {
            engine,
            max_results: None,
        }
    }

    /// Result count that always overrides the model's request.
    pub fn with_max_results(mut self, max_results: Option<usize>) -> Self {
        self.max_results = max_results;
        self
    }

    fn effective_limit(&self, requested: Option<usize>) -> usize {
        self.max_results
            .or(requested)
            .unwrap_or(DEFAULT_TOOL_SEARCH_RESULTS)
            .clamp(1, MAX_TOOL_SEARCH_RESULTS)
    }

    /// Whether `name` refers to this tool. Case-insensitive.
    pub fn is_tool_search(name: &str) -> bool {
        name.eq_ignore_ascii_case(Self::TOOL_NAME)
    }
}

#[async_trait]
impl SchemaTool for ToolSearchTool {
    type Input = ToolSearchInput;
    const NAME: &'static str = Self::TOOL_NAME;
    const DESCRIPTION: &'static str = "Search for tools in the tool registry to discover capabilities for completing the current task.\n\
        Use this when you need functionality not provided by your currently available tools.\n\
        The search queries against tool names, descriptions, and parameter information to find the most relevant tools.\n\
        Returns references to matching tools which will be expanded into full definitions you can then invoke.\n";

    async fn handle(&self, input: ToolSearchInput, context: &ToolContext) -> ToolResult {
        let Some(session_id) = context.conversation_id() else {
            return ToolResult::error(ToolError::missing_conversation(Self::TOOL_NAME));
        };

        let mut request = SearchRequest::new(session_id, &input.query)
            .with_max_results(self.effective_limit(input.max_results));
        request.category_filter = input.category_filter;

        match self.engine.search(&request) {
            Ok(response) => {
                debug!(
                    session_id,
                    query = %input.query,
                    hits = response.total_matches,
                    "Tool search completed"
                );
                ToolResult::json(&response.tool_names())
            }
            Err(e) => {
                error!(session_id, error = %e, "Tool search failed");
                ToolResult::error(ToolError::execution_failed(e.to_string()))
            }
        }
    }
}
