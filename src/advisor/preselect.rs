//! Tool pre-selection from the user's own words.

use std::sync::Arc;

use tracing::{debug, info};

use super::{ChatRequest, ConversationAdvisor, ConversationCatalog, DEFAULT_ADVISOR_ORDER};
use crate::config::ToolSearchSettings;
use crate::tools::search::SearchEngine;
use crate::tools::{ToolRegistry, ToolResolver, ToolSelection};
use crate::types::SearchRequest;

/// Advisor that searches the catalog with the user text before every model
/// call and exposes exactly the matching tools.
///
/// There is no search tool and no memory of earlier turns. Works best when a
/// preliminary reasoning step writes the needed capabilities back as user text.
pub struct PreSelectAdvisor {
    catalog: Arc<ConversationCatalog>,
    max_results: Option<usize>,
    order: i32,
}

impl PreSelectAdvisor {
    pub const NAME: &'static str = "PreSelectToolCallingAdvisor";

    pub fn builder(engine: Arc<dyn SearchEngine>) -> PreSelectAdvisorBuilder {
        PreSelectAdvisorBuilder {
            engine,
            resolver: None,
            max_results: None,
            order: DEFAULT_ADVISOR_ORDER,
        }
    }

    pub fn from_settings(
        settings: &ToolSearchSettings,
        resolver: Arc<dyn ToolResolver>,
    ) -> crate::Result<Self> {
        let engine: Arc<dyn SearchEngine> = settings.build_engine()?;
        Ok(Self::builder(engine)
            .resolver(resolver)
            .max_results(settings.max_results)
            .order(settings.advisor_order)
            .build())
    }

    /// Shared so hosts can hand it to an
    /// [`IdleSweeper`](crate::tools::search::IdleSweeper).
    pub fn catalog(&self) -> &Arc<ConversationCatalog> {
        &self.catalog
    }
}

impl ConversationAdvisor for PreSelectAdvisor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn on_conversation_start(&self, mut request: ChatRequest) -> crate::Result<ChatRequest> {
        self.catalog.open(&mut request)?;
        Ok(request)
    }

    fn before_model_call(&self, mut request: ChatRequest) -> crate::Result<ChatRequest> {
        let conversation_id = request.require_conversation_id(Self::NAME)?.to_string();

        let mut search = SearchRequest::new(&conversation_id, request.user_text());
        search.max_results = self.max_results;
        let response = self.catalog.engine().search(&search)?;

        let mut selection = ToolSelection::new();
        self.catalog
            .select(&conversation_id, response.tool_names(), &mut selection);
        debug!(
            conversation_id = %conversation_id,
            selected = ?selection.exposed_names(),
            search_time_ms = response.search_metadata.search_time_ms,
            "Pre-selected tools"
        );

        request.tools = selection;
        Ok(request)
    }

    fn on_conversation_end(&self, request: &ChatRequest) -> crate::Result<()> {
        if let Some(conversation_id) = &request.conversation_id {
            self.catalog.close(conversation_id)?;
            info!(conversation_id = %conversation_id, "Pre-select conversation finished");
        }
        Ok(())
    }
}

pub struct PreSelectAdvisorBuilder {
    engine: Arc<dyn SearchEngine>,
    resolver: Option<Arc<dyn ToolResolver>>,
    max_results: Option<usize>,
    order: i32,
}

impl PreSelectAdvisorBuilder {
    pub fn resolver(mut self, resolver: Arc<dyn ToolResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Result cap for each pre-selection search; the engine default otherwise.
    pub fn max_results(mut self, max_results: Option<usize>) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn build(self) -> PreSelectAdvisor {
        let resolver = self
            .resolver
            .unwrap_or_else(|| Arc::new(ToolRegistry::new()));
        PreSelectAdvisor {
            catalog: Arc::new(ConversationCatalog::new(self.engine, resolver)),
            max_results: self.max_results,
            order: self.order,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{FnTool, ToolCallback};
    use crate::tools::search::PatternSearchEngine;
    use crate::types::Message;

    fn started() -> (PreSelectAdvisor, ChatRequest) {
        let clothing: Arc<dyn ToolCallback> = Arc::new(FnTool::constant(
            "clothing",
            "Clothing shops for a location",
            "shops",
        ));
        let advisor = PreSelectAdvisor::builder(Arc::new(PatternSearchEngine::new()))
            .resolver(Arc::new(ToolRegistry::with_tools([clothing])))
            .build();
        let tools = ToolSelection::new()
            .with_callback(Arc::new(FnTool::constant("weather", "Weather for a location", "Sunny")))
            .with_callback(Arc::new(FnTool::constant("sendEmail", "Send an email message", "sent")))
            .with_name("clothing");
        let request = advisor
            .on_conversation_start(
                ChatRequest::new("")
                    .with_conversation_id("c1")
                    .with_tools(tools),
            )
            .unwrap();
        (advisor, request)
    }

    #[test]
    fn test_exposes_exactly_the_matches() {
        let (advisor, mut request) = started();
        request.messages.push(Message::user("Send an email to Bob"));

        let turn = advisor.before_model_call(request).unwrap();
        assert_eq!(
            turn.tools.exposed_names().into_iter().collect::<Vec<_>>(),
            vec!["sendEmail"]
        );
        assert!(turn.tools.callback("sendEmail").is_some());
        assert!(turn.tools.callback("toolSearchTool").is_none());
    }

    #[test]
    fn test_bare_names_pass_through() {
        let (advisor, mut request) = started();
        request.messages.push(Message::user("clothing"));

        let turn = advisor.before_model_call(request).unwrap();
        assert!(turn.tools.callbacks().is_empty());
        assert!(turn.tools.names().contains("clothing"));
    }

    #[test]
    fn test_no_match_exposes_nothing() {
        let (advisor, mut request) = started();
        request.messages.push(Message::user("zzz"));
        let turn = advisor.before_model_call(request).unwrap();
        assert!(turn.tools.is_empty());
    }

    #[test]
    fn test_end_clears_index() {
        let (advisor, request) = started();
        advisor.on_conversation_end(&request).unwrap();
        assert!(!advisor.catalog().is_open("c1"));
        let response = advisor
            .catalog()
            .engine()
            .search(&SearchRequest::new("c1", "weather"))
            .unwrap();
        assert!(response.is_empty());
    }
}
