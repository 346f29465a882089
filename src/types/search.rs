//! Search request and response types shared by every search engine.

use serde::{Deserialize, Serialize};

use super::ToolReference;

/// Ranking strategy of a search engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchType {
    Pattern,
    Keyword,
    Semantic,
}

impl std::fmt::Display for SearchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchType::Pattern => write!(f, "pattern"),
            SearchType::Keyword => write!(f, "keyword"),
            SearchType::Semantic => write!(f, "semantic"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub session_id: String,
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<usize>,
    /// Reserved for category-aware engines; the bundled engines ignore it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_filter: Option<String>,
}

impl SearchRequest {
    pub fn new(session_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            query: query.into(),
            max_results: None,
            category_filter: None,
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    pub fn with_category_filter(mut self, category: impl Into<String>) -> Self {
        self.category_filter = Some(category.into());
        self
    }

    /// Requested result cap, falling back to `default` when unset.
    pub fn limit_or(&self, default: usize) -> usize {
        self.max_results.unwrap_or(default)
    }

    pub fn has_session(&self) -> bool {
        !self.session_id.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMetadata {
    pub search_type: SearchType,
    pub query: String,
    pub search_time_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub tool_references: Vec<ToolReference>,
    pub total_matches: usize,
    pub search_metadata: SearchMetadata,
}

impl SearchResponse {
    /// Response with no matches but populated metadata.
    pub fn empty(search_type: SearchType, query: impl Into<String>) -> Self {
        Self {
            tool_references: Vec::new(),
            total_matches: 0,
            search_metadata: SearchMetadata {
                search_type,
                query: query.into(),
                search_time_ms: 0,
            },
        }
    }

    pub fn new(
        search_type: SearchType,
        query: impl Into<String>,
        tool_references: Vec<ToolReference>,
        search_time_ms: u64,
    ) -> Self {
        Self {
            total_matches: tool_references.len(),
            tool_references,
            search_metadata: SearchMetadata {
                search_type,
                query: query.into(),
                search_time_ms,
            },
        }
    }

    pub fn with_search_time(mut self, search_time_ms: u64) -> Self {
        self.search_metadata.search_time_ms = search_time_ms;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tool_references.is_empty()
    }

    /// Matched tool names in rank order.
    pub fn tool_names(&self) -> Vec<String> {
        self.tool_references
            .iter()
            .map(|r| r.tool_name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request = SearchRequest::new("s1", "weather");
        assert_eq!(request.limit_or(10), 10);
        assert!(request.has_session());
        assert!(!SearchRequest::new("  ", "weather").has_session());
        assert_eq!(request.with_max_results(3).limit_or(10), 3);
    }

    #[test]
    fn test_empty_response() {
        let response = SearchResponse::empty(SearchType::Pattern, "weather");
        assert!(response.is_empty());
        assert_eq!(response.total_matches, 0);
        assert_eq!(response.search_metadata.query, "weather");
        assert_eq!(response.search_metadata.search_type, SearchType::Pattern);
    }

    #[test]
    fn test_response_wire_format() {
        let response = SearchResponse::new(
            SearchType::Keyword,
            "time",
            vec![ToolReference::new("currentTime", "Current time").with_score(0.9)],
            2,
        );
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["totalMatches"], 1);
        assert_eq!(json["searchMetadata"]["searchType"], "KEYWORD");
        assert_eq!(json["toolReferences"][0]["toolName"], "currentTime");
        assert_eq!(response.tool_names(), vec!["currentTime".to_string()]);
    }
}
