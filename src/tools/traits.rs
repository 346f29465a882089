//! Tool callback trait definitions.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;

use super::context::ToolContext;
use crate::types::{ToolDefinition, ToolError};

/// Outcome of a tool invocation.
#[derive(Debug, Clone)]
pub enum ToolResult {
    Success(String),
    Error(ToolError),
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self::Success(content.into())
    }

    pub fn error(error: ToolError) -> Self {
        Self::Error(error)
    }

    /// Serialize `value` as the success payload.
    pub fn json<T: serde::Serialize>(value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(content) => Self::Success(content),
            Err(e) => Self::Error(ToolError::execution_failed(e.to_string())),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            Self::Success(content) => Some(content),
            _ => None,
        }
    }
}

/// A callable action the model can invoke.
#[async_trait]
pub trait ToolCallback: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> serde_json::Value;
    async fn call(&self, input: serde_json::Value, context: &ToolContext) -> ToolResult;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.input_schema())
    }
}

impl fmt::Debug for dyn ToolCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolCallback")
            .field("name", &self.name())
            .finish()
    }
}

/// Tool with a typed input whose JSON schema is derived via schemars.
#[async_trait]
pub trait SchemaTool: Send + Sync {
    type Input: JsonSchema + DeserializeOwned + Send;
    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    async fn handle(&self, input: Self::Input, context: &ToolContext) -> ToolResult;

    fn input_schema() -> serde_json::Value {
        let schema = schemars::schema_for!(Self::Input);
        let mut value =
            serde_json::to_value(schema).unwrap_or_else(|_| serde_json::json!({"type": "object"}));

        if let Some(obj) = value.as_object_mut() {
            obj.remove("$schema");
            obj.entry("properties")
                .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
        }
        value
    }
}

#[async_trait]
impl<T: SchemaTool + 'static> ToolCallback for T {
    fn name(&self) -> &str {
        T::NAME
    }

    fn description(&self) -> &str {
        T::DESCRIPTION
    }

    fn input_schema(&self) -> serde_json::Value {
        T::input_schema()
    }

    async fn call(&self, input: serde_json::Value, context: &ToolContext) -> ToolResult {
        match serde_json::from_value::<T::Input>(input) {
            Ok(typed) => SchemaTool::handle(self, typed, context).await,
            Err(e) => ToolResult::error(ToolError::invalid_input(e.to_string())),
        }
    }
}

type BoxedHandler = Arc<
    dyn Fn(serde_json::Value, ToolContext) -> Pin<Box<dyn Future<Output = ToolResult> + Send>>
        + Send
        + Sync,
>;

/// Tool backed by an async closure over raw JSON input.
#[derive(Clone)]
pub struct FnTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
    handler: BoxedHandler,
}

impl FnTool {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
        handler: F,
    ) -> Self
    where
        F: Fn(serde_json::Value, ToolContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolResult> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            handler: Arc::new(move |input, context| Box::pin(handler(input, context))),
        }
    }

    /// Tool that always answers with the same text, regardless of input.
    pub fn constant(
        name: impl Into<String>,
        description: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        let output = output.into();
        Self::new(
            name,
            description,
            serde_json::json!({"type": "object", "properties": {}}),
            move |_, _| {
                let output = output.clone();
                async move { ToolResult::success(output) }
            },
        )
    }
}

#[async_trait]
impl ToolCallback for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> serde_json::Value {
        self.input_schema.clone()
    }

    async fn call(&self, input: serde_json::Value, context: &ToolContext) -> ToolResult {
        (self.handler)(input, context.clone()).await
    }
}
