//! Tool definition types.

use serde::{Deserialize, Serialize};

/// Full definition of a tool as presented to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }

    /// Catalog entry used to index this tool.
    pub fn to_reference(&self) -> super::ToolReference {
        super::ToolReference::new(&self.name, &self.description)
    }
}
