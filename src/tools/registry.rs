//! Tool registry, name resolution, and per-turn tool selection.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::warn;

use super::traits::ToolCallback;
use crate::types::ToolDefinition;

/// Resolves bare tool names to callbacks.
pub trait ToolResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Option<Arc<dyn ToolCallback>>;

    /// Definitions for every callable in `selection` followed by every bare
    /// name that resolves. Unresolvable names are skipped.
    fn resolve_definitions(&self, selection: &ToolSelection) -> Vec<ToolDefinition> {
        let mut definitions: Vec<ToolDefinition> =
            selection.callbacks().iter().map(|c| c.definition()).collect();

        for name in selection.names() {
            if selection.callback(name).is_some() {
                continue;
            }
            match self.resolve(name) {
                Some(callback) => definitions.push(callback.definition()),
                None => warn!(tool = %name, "Tool name could not be resolved, skipping"),
            }
        }
        definitions
    }
}

/// Registry of named tool callbacks.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolCallback>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tools(tools: impl IntoIterator<Item = Arc<dyn ToolCallback>>) -> Self {
        let mut registry = Self::new();
        for tool in tools {
            registry.register(tool);
        }
        registry
    }

    pub fn register(&mut self, tool: Arc<dyn ToolCallback>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolCallback>> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl ToolResolver for ToolRegistry {
    fn resolve(&self, name: &str) -> Option<Arc<dyn ToolCallback>> {
        self.tools.get(name).cloned()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names = self.names();
        names.sort_unstable();
        f.debug_struct("ToolRegistry").field("tools", &names).finish()
    }
}

/// The set of tools exposed to the model for one turn.
///
/// Callables are carried directly; bare names are left to a [`ToolResolver`].
/// Callables are unique by name, first insertion wins.
#[derive(Clone, Default)]
pub struct ToolSelection {
    callbacks: Vec<Arc<dyn ToolCallback>>,
    names: BTreeSet<String>,
}

impl ToolSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(mut self, callback: Arc<dyn ToolCallback>) -> Self {
        self.add_callback(callback);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.add_name(name);
        self
    }

    /// Returns false if a callable with the same name is already present.
    pub fn add_callback(&mut self, callback: Arc<dyn ToolCallback>) -> bool {
        if self.callback(callback.name()).is_some() {
            return false;
        }
        self.callbacks.push(callback);
        true
    }

    pub fn add_name(&mut self, name: impl Into<String>) -> bool {
        self.names.insert(name.into())
    }

    pub fn callbacks(&self) -> &[Arc<dyn ToolCallback>] {
        &self.callbacks
    }

    pub fn names(&self) -> &BTreeSet<String> {
        &self.names
    }

    pub fn callback(&self, name: &str) -> Option<&Arc<dyn ToolCallback>> {
        self.callbacks.iter().find(|c| c.name() == name)
    }

    /// Whether `name` is exposed either as a callable or as a bare name.
    pub fn contains(&self, name: &str) -> bool {
        self.callback(name).is_some() || self.names.contains(name)
    }

    /// Every exposed name, callables first, without duplicates.
    pub fn exposed_names(&self) -> BTreeSet<String> {
        self.callbacks
            .iter()
            .map(|c| c.name().to_string())
            .chain(self.names.iter().cloned())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty() && self.names.is_empty()
    }
}

impl std::fmt::Debug for ToolSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let callbacks: Vec<&str> = self.callbacks.iter().map(|c| c.name()).collect();
        f.debug_struct("ToolSelection")
            .field("callbacks", &callbacks)
            .field("names", &self.names)
            .finish()
    }
}
