//! Tool-calling conversation loop driving the advisor chain.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tracing::{Span, debug, info, instrument, warn};

use super::model::{ChatModel, ModelRequest};
use crate::advisor::{AdvisorChain, ChatRequest, ConversationAdvisor};
use crate::config::ToolSearchSettings;
use crate::tools::{ToolCallback, ToolContext, ToolRegistry, ToolResolver, ToolResult, ToolSelection};
use crate::types::{Message, ToolError, ToolResultBlock, ToolUseBlock};

/// Model calls allowed per conversation unless configured otherwise.
pub const DEFAULT_MAX_ITERATIONS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The model answered without requesting tools.
    EndTurn,
    /// The iteration cap was reached while tools were still requested.
    MaxIterations,
}

#[derive(Debug, Clone)]
pub struct ConversationResult {
    pub conversation_id: Option<String>,
    /// Text of the final assistant message.
    pub text: String,
    /// Full history including tool calls and results.
    pub messages: Vec<Message>,
    /// Tool names exposed to the model on each call, in call order.
    pub exposed_tools: Vec<Vec<String>>,
    pub iterations: usize,
    pub tool_calls: usize,
    pub stop_reason: StopReason,
    pub execution_time_ms: u64,
}

/// Runs a conversation: advisors shape each request, the model answers, and
/// requested tools are executed until the model stops asking for them.
pub struct ToolCallLoop {
    model: Arc<dyn ChatModel>,
    advisors: AdvisorChain,
    resolver: Arc<dyn ToolResolver>,
    max_iterations: usize,
}

impl ToolCallLoop {
    pub fn builder(model: Arc<dyn ChatModel>) -> ToolCallLoopBuilder {
        ToolCallLoopBuilder {
            model,
            advisors: AdvisorChain::new(),
            resolver: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn advisors(&self) -> &AdvisorChain {
        &self.advisors
    }

    /// Run one conversation. End hooks always run, also when a start hook,
    /// advisor, or model call fails.
    #[instrument(skip(self, request), fields(conversation_id = tracing::field::Empty))]
    pub async fn run(&self, request: ChatRequest) -> crate::Result<ConversationResult> {
        let execution_start = Instant::now();

        let mut state = match self.advisors.start(request) {
            Ok(state) => state,
            Err(failure) => {
                warn!(error = %failure.error, "Conversation start failed");
                if let Err(end_error) = self.advisors.end(&failure.request) {
                    warn!(error = %end_error, "Cleanup after failed start also failed");
                }
                return Err(failure.error);
            }
        };
        if let Some(id) = &state.conversation_id {
            Span::current().record("conversation_id", id.as_str());
        }
        info!(messages = state.messages.len(), "Starting conversation");

        let outcome = self.drive(&mut state).await;
        let ended = self.advisors.end(&state);

        let mut result = outcome?;
        ended?;
        result.execution_time_ms = execution_start.elapsed().as_millis() as u64;

        info!(
            iterations = result.iterations,
            tool_calls = result.tool_calls,
            stop_reason = ?result.stop_reason,
            execution_time_ms = result.execution_time_ms,
            "Conversation completed"
        );
        Ok(result)
    }

    async fn drive(&self, state: &mut ChatRequest) -> crate::Result<ConversationResult> {
        let mut iterations = 0;
        let mut tool_calls = 0;
        let mut exposed_tools = Vec::new();
        let mut final_text = String::new();
        let stop_reason;

        loop {
            if iterations >= self.max_iterations {
                warn!(max = self.max_iterations, "Max iterations reached");
                stop_reason = StopReason::MaxIterations;
                break;
            }
            iterations += 1;

            let turn = self.advisors.before_call(state.clone())?;
            let definitions = self.resolver.resolve_definitions(&turn.tools);
            let request = ModelRequest {
                system: turn.system.clone(),
                messages: turn.messages.clone(),
                tools: definitions,
            };
            debug!(iteration = iterations, tools = ?request.tool_names(), "Calling model");
            exposed_tools.push(request.tool_names().into_iter().map(String::from).collect());

            let response = self.model.call(&request).await?;
            final_text = response.text();
            state.messages.push(response.clone());

            let tool_uses = response.tool_uses();
            if tool_uses.is_empty() {
                debug!("No tool use requested, ending loop");
                stop_reason = StopReason::EndTurn;
                break;
            }

            let context = match &turn.conversation_id {
                Some(id) => ToolContext::for_conversation(id),
                None => ToolContext::new(),
            };
            let futures = tool_uses
                .into_iter()
                .map(|tool_use| self.execute_tool(tool_use, &turn.tools, &context));
            let results: Vec<ToolResultBlock> = join_all(futures).await;

            tool_calls += results.len();
            state.messages.push(Message::tool_results(results));
        }

        Ok(ConversationResult {
            conversation_id: state.conversation_id.clone(),
            text: final_text,
            messages: state.messages.clone(),
            exposed_tools,
            iterations,
            tool_calls,
            stop_reason,
            execution_time_ms: 0,
        })
    }

    /// Only tools exposed this turn may run: exposed callables first, then
    /// exposed names through the resolver.
    async fn execute_tool(
        &self,
        tool_use: &ToolUseBlock,
        exposed: &ToolSelection,
        context: &ToolContext,
    ) -> ToolResultBlock {
        let callback: Option<Arc<dyn ToolCallback>> = match exposed.callback(&tool_use.name) {
            Some(callback) => Some(Arc::clone(callback)),
            None if exposed.names().contains(&tool_use.name) => self.resolver.resolve(&tool_use.name),
            None => None,
        };

        let start = Instant::now();
        let result = match callback {
            Some(callback) => callback.call(tool_use.input.clone(), context).await,
            None => ToolResult::error(ToolError::unknown_tool(&tool_use.name)),
        };
        debug!(
            tool = %tool_use.name,
            duration_ms = start.elapsed().as_millis() as u64,
            is_error = result.is_error(),
            "Tool execution completed"
        );
        ToolResultBlock::from_tool_result(&tool_use.id, &result)
    }
}

pub struct ToolCallLoopBuilder {
    model: Arc<dyn ChatModel>,
    advisors: AdvisorChain,
    resolver: Option<Arc<dyn ToolResolver>>,
    max_iterations: usize,
}

impl ToolCallLoopBuilder {
    pub fn advisor<A: ConversationAdvisor + 'static>(mut self, advisor: A) -> Self {
        self.advisors.register(advisor);
        self
    }

    pub fn advisor_arc(mut self, advisor: Arc<dyn ConversationAdvisor>) -> Self {
        self.advisors.register_arc(advisor);
        self
    }

    /// Resolves tools exposed by bare name.
    pub fn resolver(mut self, resolver: Arc<dyn ToolResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Apply the loop's share of `settings`: the iteration cap.
    pub fn with_settings(self, settings: &ToolSearchSettings) -> Self {
        self.max_iterations(settings.max_iterations)
    }

    pub fn build(self) -> ToolCallLoop {
        ToolCallLoop {
            model: self.model,
            advisors: self.advisors,
            resolver: self
                .resolver
                .unwrap_or_else(|| Arc::new(ToolRegistry::new())),
            max_iterations: self.max_iterations,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::tools::FnTool;
    use crate::types::ContentBlock;

    /// Replays canned responses and records every request.
    struct Scripted {
        responses: Mutex<Vec<crate::Result<Message>>>,
        requests: Mutex<Vec<ModelRequest>>,
    }

    impl Scripted {
        fn new(responses: Vec<crate::Result<Message>>) -> Arc<Self> {
            let mut responses = responses;
            responses.reverse();
            Arc::new(Self {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatModel for Scripted {
        async fn call(&self, request: &ModelRequest) -> crate::Result<Message> {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(Message::assistant("done")))
        }
    }

    fn call_tool(id: &str, name: &str) -> Message {
        Message::assistant_with_content(vec![ContentBlock::tool_use(id, name, serde_json::json!({}))])
    }

    struct EndCounter(Arc<Mutex<usize>>);

    impl ConversationAdvisor for EndCounter {
        fn name(&self) -> &str {
            "end-counter"
        }

        fn on_conversation_end(&self, _request: &ChatRequest) -> crate::Result<()> {
            *self.0.lock().unwrap() += 1;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_executes_exposed_tools() {
        let model = Scripted::new(vec![Ok(call_tool("t1", "weather")), Ok(Message::assistant("Sunny it is"))]);
        let tool_loop = ToolCallLoop::builder(model.clone()).build();
        let request = ChatRequest::new("sys")
            .with_message(Message::user("weather?"))
            .with_tools(ToolSelection::new().with_callback(Arc::new(FnTool::constant(
                "weather",
                "Weather",
                "Sunny",
            ))));

        let result = tool_loop.run(request).await.unwrap();
        assert_eq!(result.text, "Sunny it is");
        assert_eq!(result.iterations, 2);
        assert_eq!(result.tool_calls, 1);
        assert_eq!(result.stop_reason, StopReason::EndTurn);
        assert_eq!(result.exposed_tools[0], vec!["weather".to_string()]);

        let tool_result = result.messages[2].tool_result_blocks()[0].clone();
        assert_eq!(tool_result.text().as_deref(), Some("Sunny"));
        assert!(!tool_result.is_error());
    }

    #[tokio::test]
    async fn test_unexposed_tool_is_an_error_result() {
        let registry = ToolRegistry::with_tools([
            Arc::new(FnTool::constant("secret", "Hidden", "x")) as Arc<dyn ToolCallback>
        ]);
        let model = Scripted::new(vec![Ok(call_tool("t1", "secret"))]);
        let tool_loop = ToolCallLoop::builder(model)
            .resolver(Arc::new(registry))
            .build();

        let result = tool_loop.run(ChatRequest::new("")).await.unwrap();
        let block = result.messages[1].tool_result_blocks()[0].clone();
        assert!(block.is_error());
        assert!(block.text().unwrap().contains("unknown tool: secret"));
    }

    #[tokio::test]
    async fn test_bare_names_resolve_through_resolver() {
        let registry = ToolRegistry::with_tools([
            Arc::new(FnTool::constant("clock", "Current time", "12:00")) as Arc<dyn ToolCallback>
        ]);
        let model = Scripted::new(vec![Ok(call_tool("t1", "clock"))]);
        let tool_loop = ToolCallLoop::builder(model.clone())
            .resolver(Arc::new(registry))
            .build();

        let result = tool_loop
            .run(ChatRequest::new("").with_tools(ToolSelection::new().with_name("clock")))
            .await
            .unwrap();
        let block = result.messages[1].tool_result_blocks()[0].clone();
        assert_eq!(block.text().as_deref(), Some("12:00"));
        assert_eq!(model.requests.lock().unwrap()[0].tool_names(), vec!["clock"]);
    }

    #[tokio::test]
    async fn test_max_iterations() {
        let model = Scripted::new((0..5).map(|i| Ok(call_tool(&format!("t{i}"), "loop"))).collect());
        let tool_loop = ToolCallLoop::builder(model).max_iterations(3).build();

        let result = tool_loop.run(ChatRequest::new("")).await.unwrap();
        assert_eq!(result.iterations, 3);
        assert_eq!(result.stop_reason, StopReason::MaxIterations);
    }

    #[tokio::test]
    async fn test_iteration_cap_from_settings() {
        let model = Scripted::new((0..5).map(|i| Ok(call_tool(&format!("t{i}"), "loop"))).collect());
        let settings = ToolSearchSettings {
            max_iterations: 2,
            ..Default::default()
        };
        let tool_loop = ToolCallLoop::builder(model).with_settings(&settings).build();

        let result = tool_loop.run(ChatRequest::new("")).await.unwrap();
        assert_eq!(result.iterations, 2);
        assert_eq!(result.stop_reason, StopReason::MaxIterations);
    }

    #[tokio::test]
    async fn test_end_hooks_run_after_model_error() {
        let ends = Arc::new(Mutex::new(0));
        let model = Scripted::new(vec![Err(crate::Error::Model("overloaded".into()))]);
        let tool_loop = ToolCallLoop::builder(model)
            .advisor(EndCounter(Arc::clone(&ends)))
            .build();

        let err = tool_loop.run(ChatRequest::new("")).await.unwrap_err();
        assert!(matches!(err, crate::Error::Model(_)));
        assert_eq!(*ends.lock().unwrap(), 1);
    }
}
