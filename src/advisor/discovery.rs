//! Progressive tool disclosure driven by the model's own searches.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{ChatRequest, ConversationAdvisor, ConversationCatalog, DEFAULT_ADVISOR_ORDER};
use crate::config::ToolSearchSettings;
use crate::prompts::DEFAULT_SYSTEM_PROMPT_SUFFIX;
use crate::tools::search::SearchEngine;
use crate::tools::{ToolCallback, ToolRegistry, ToolResolver, ToolSearchTool, ToolSelection};
use crate::types::Message;

/// Tool names referenced by earlier `toolSearchTool` results in `messages`.
///
/// With `accumulate` every result counts, otherwise only the most recent one.
/// Error results and payloads that are not a JSON array of strings contribute
/// nothing. Names keep first-seen order without duplicates.
pub fn extract_tool_references(messages: &[Message], accumulate: bool) -> Vec<String> {
    let search_calls: HashSet<&str> = messages
        .iter()
        .flat_map(|m| m.tool_uses())
        .filter(|tool_use| ToolSearchTool::is_tool_search(&tool_use.name))
        .map(|tool_use| tool_use.id.as_str())
        .collect();
    if search_calls.is_empty() {
        return Vec::new();
    }

    let results: Vec<_> = messages
        .iter()
        .flat_map(|m| m.tool_result_blocks())
        .filter(|result| search_calls.contains(result.tool_use_id.as_str()))
        .collect();

    // latest result wins even when it failed
    let selected = if accumulate {
        &results[..]
    } else {
        &results[results.len().saturating_sub(1)..]
    };
    let payloads = selected
        .iter()
        .filter(|result| !result.is_error())
        .filter_map(|result| result.text());

    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for payload in payloads {
        match serde_json::from_str::<Vec<String>>(&payload) {
            Ok(found) => {
                names.extend(found.into_iter().filter(|name| seen.insert(name.clone())));
            }
            Err(e) => {
                warn!(error = %e, payload = %payload, "Skipping malformed tool search result");
            }
        }
    }
    names
}

/// Advisor that hides the tool catalog behind `toolSearchTool`.
///
/// At conversation start every tool is indexed and the system prompt gets the
/// discovery instructions. Before each model call the exposed set is the
/// search tool plus every tool named by earlier search results. The index is
/// released when the conversation ends.
pub struct ToolSearchAdvisor {
    catalog: Arc<ConversationCatalog>,
    search_tool: Arc<dyn ToolCallback>,
    system_prompt_suffix: String,
    accumulate: bool,
    order: i32,
}

impl ToolSearchAdvisor {
    pub const NAME: &'static str = "ToolSearchToolCallingAdvisor";

    pub fn builder(engine: Arc<dyn SearchEngine>) -> ToolSearchAdvisorBuilder {
        ToolSearchAdvisorBuilder::new(engine)
    }

    /// Advisor over the engine configured in `settings`.
    pub fn from_settings(
        settings: &ToolSearchSettings,
        resolver: Arc<dyn ToolResolver>,
    ) -> crate::Result<Self> {
        let engine: Arc<dyn SearchEngine> = settings.build_engine()?;
        let mut builder = Self::builder(engine)
            .resolver(resolver)
            .accumulate(settings.accumulate)
            .max_results(settings.max_results)
            .order(settings.advisor_order);
        if let Some(suffix) = &settings.system_prompt_suffix {
            builder = builder.system_prompt_suffix(suffix.clone());
        }
        Ok(builder.build())
    }

    /// Shared so hosts can hand it to an
    /// [`IdleSweeper`](crate::tools::search::IdleSweeper).
    pub fn catalog(&self) -> &Arc<ConversationCatalog> {
        &self.catalog
    }

    pub fn accumulates(&self) -> bool {
        self.accumulate
    }
}

impl ConversationAdvisor for ToolSearchAdvisor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn on_conversation_start(&self, mut request: ChatRequest) -> crate::Result<ChatRequest> {
        self.catalog.open(&mut request)?;
        request.system.push_str(&self.system_prompt_suffix);
        Ok(request)
    }

    fn before_model_call(&self, mut request: ChatRequest) -> crate::Result<ChatRequest> {
        let conversation_id = request.require_conversation_id(Self::NAME)?.to_string();

        let references = extract_tool_references(&request.messages, self.accumulate);
        let mut selection = ToolSelection::new().with_callback(Arc::clone(&self.search_tool));
        self.catalog
            .select(&conversation_id, &references, &mut selection);

        debug!(
            conversation_id = %conversation_id,
            references = ?references,
            "Exposing discovered tools"
        );
        request.tools = selection;
        Ok(request)
    }

    fn on_conversation_end(&self, request: &ChatRequest) -> crate::Result<()> {
        if let Some(conversation_id) = &request.conversation_id {
            self.catalog.close(conversation_id)?;
            info!(conversation_id = %conversation_id, "Tool search conversation finished");
        }
        Ok(())
    }
}

pub struct ToolSearchAdvisorBuilder {
    engine: Arc<dyn SearchEngine>,
    resolver: Option<Arc<dyn ToolResolver>>,
    system_prompt_suffix: Option<String>,
    accumulate: bool,
    max_results: Option<usize>,
    order: i32,
}

impl ToolSearchAdvisorBuilder {
    fn new(engine: Arc<dyn SearchEngine>) -> Self {
        Self {
            engine,
            resolver: None,
            system_prompt_suffix: None,
            accumulate: true,
            max_results: None,
            order: DEFAULT_ADVISOR_ORDER,
        }
    }

    /// Resolves tools the host supplies by name only.
    pub fn resolver(mut self, resolver: Arc<dyn ToolResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Blank text keeps the default suffix.
    pub fn system_prompt_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.system_prompt_suffix = Some(suffix.into());
        self
    }

    pub fn accumulate(mut self, accumulate: bool) -> Self {
        self.accumulate = accumulate;
        self
    }

    /// Result count for `toolSearchTool`, overriding the model's choice.
    pub fn max_results(mut self, max_results: Option<usize>) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn build(self) -> ToolSearchAdvisor {
        let resolver = self
            .resolver
            .unwrap_or_else(|| Arc::new(ToolRegistry::new()));
        let system_prompt_suffix = self
            .system_prompt_suffix
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT_SUFFIX.to_string());
        let search_tool = ToolSearchTool::new(Arc::clone(&self.engine))
            .with_max_results(self.max_results);

        ToolSearchAdvisor {
            catalog: Arc::new(ConversationCatalog::new(self.engine, resolver)),
            search_tool: Arc::new(search_tool),
            system_prompt_suffix,
            accumulate: self.accumulate,
            order: self.order,
        }
    }
}
