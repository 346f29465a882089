//! Tool search settings and engine selection.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{ConfigError, ConfigResult, EnvConfigProvider, ValidationErrors};
use crate::advisor::DEFAULT_ADVISOR_ORDER;
use crate::agent::DEFAULT_MAX_ITERATIONS;
use crate::tools::MAX_TOOL_SEARCH_RESULTS;
use crate::tools::search::{
    DEFAULT_CANDIDATE_LIMIT, DEFAULT_MIN_SCORE, DEFAULT_SIMILARITY_THRESHOLD, HashingEmbedder,
    KeywordSearchEngine, PatternSearchEngine, SessionHousekeeping, VectorSearchEngine,
};

/// Prefix of every environment variable read by [`ToolSearchSettings::from_env`].
pub const ENV_PREFIX: &str = "TOOL_SEARCH_";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchBackend {
    #[default]
    Pattern,
    Keyword,
    Semantic,
}

impl SearchBackend {
    /// Build the engine for this backend. The semantic backend uses an
    /// in-memory store with the hashing embedder.
    pub fn build_engine(&self, settings: &ToolSearchSettings) -> Arc<dyn SessionHousekeeping> {
        match self {
            SearchBackend::Pattern => Arc::new(PatternSearchEngine::new()),
            SearchBackend::Keyword => Arc::new(KeywordSearchEngine::with_min_score(settings.min_score)),
            SearchBackend::Semantic => Arc::new(
                VectorSearchEngine::in_memory(Arc::new(HashingEmbedder::default()))
                    .with_candidate_limit(settings.candidate_limit)
                    .with_similarity_threshold(settings.similarity_threshold),
            ),
        }
    }
}

impl FromStr for SearchBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pattern" | "regex" => Ok(Self::Pattern),
            "keyword" | "lucene" | "bm25" => Ok(Self::Keyword),
            "semantic" | "vector" => Ok(Self::Semantic),
            other => Err(format!("unknown search backend '{other}'")),
        }
    }
}

impl std::fmt::Display for SearchBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchBackend::Pattern => write!(f, "pattern"),
            SearchBackend::Keyword => write!(f, "keyword"),
            SearchBackend::Semantic => write!(f, "semantic"),
        }
    }
}

/// Settings for the tool search advisors, engines, and conversation loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSearchSettings {
    pub backend: SearchBackend,
    /// Overrides the result count the model asks `toolSearchTool` for.
    pub max_results: Option<usize>,
    /// Union every earlier search result instead of only the latest.
    pub accumulate: bool,
    pub system_prompt_suffix: Option<String>,
    pub advisor_order: i32,
    pub min_score: f32,
    pub similarity_threshold: f32,
    pub candidate_limit: usize,
    /// Model calls per conversation, applied by `ToolCallLoopBuilder::with_settings`.
    pub max_iterations: usize,
    /// Sessions idle this long are swept by `IdleSweeper::from_settings`.
    pub session_idle_ttl_secs: Option<u64>,
}

impl Default for ToolSearchSettings {
    fn default() -> Self {
        Self {
            backend: SearchBackend::default(),
            max_results: None,
            accumulate: true,
            system_prompt_suffix: None,
            advisor_order: DEFAULT_ADVISOR_ORDER,
            min_score: DEFAULT_MIN_SCORE,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            candidate_limit: DEFAULT_CANDIDATE_LIMIT,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            session_idle_ttl_secs: None,
        }
    }
}

impl ToolSearchSettings {
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Defaults overlaid with `TOOL_SEARCH_*` environment variables.
    pub fn from_env() -> ConfigResult<Self> {
        Self::default().with_env()
    }

    /// Overlay `TOOL_SEARCH_*` environment variables on these settings.
    pub fn with_env(self) -> ConfigResult<Self> {
        self.with_env_provider(&EnvConfigProvider::prefixed(ENV_PREFIX))
    }

    pub fn with_env_provider(mut self, env: &EnvConfigProvider) -> ConfigResult<Self> {
        if let Some(backend) = env.get("backend")? {
            self.backend = backend;
        }
        if let Some(max_results) = env.get("max_results")? {
            self.max_results = Some(max_results);
        }
        if let Some(accumulate) = env.get("accumulate")? {
            self.accumulate = accumulate;
        }
        if let Some(suffix) = env.get_raw("system_prompt_suffix")? {
            self.system_prompt_suffix = Some(suffix);
        }
        if let Some(order) = env.get("advisor_order")? {
            self.advisor_order = order;
        }
        if let Some(min_score) = env.get("min_score")? {
            self.min_score = min_score;
        }
        if let Some(threshold) = env.get("similarity_threshold")? {
            self.similarity_threshold = threshold;
        }
        if let Some(limit) = env.get("candidate_limit")? {
            self.candidate_limit = limit;
        }
        if let Some(iterations) = env.get("max_iterations")? {
            self.max_iterations = iterations;
        }
        if let Some(ttl) = env.get("session_idle_ttl_secs")? {
            self.session_idle_ttl_secs = Some(ttl);
        }
        Ok(self)
    }

    /// Check every range constraint, reporting all violations at once.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();

        if let Some(max_results) = self.max_results
            && !(1..=MAX_TOOL_SEARCH_RESULTS).contains(&max_results)
        {
            errors.push(ConfigError::invalid(
                "max_results",
                format!("must be between 1 and {MAX_TOOL_SEARCH_RESULTS}, got {max_results}"),
            ));
        }
        if !self.min_score.is_finite() || self.min_score < 0.0 {
            errors.push(ConfigError::invalid("min_score", "must be a non-negative number"));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            errors.push(ConfigError::invalid(
                "similarity_threshold",
                "must be between 0 and 1",
            ));
        }
        if self.candidate_limit == 0 {
            errors.push(ConfigError::invalid("candidate_limit", "must be positive"));
        }
        if self.max_iterations == 0 {
            errors.push(ConfigError::invalid("max_iterations", "must be positive"));
        }
        if self.session_idle_ttl_secs == Some(0) {
            errors.push(ConfigError::invalid(
                "session_idle_ttl_secs",
                "must be positive when set",
            ));
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::ValidationErrors(ValidationErrors(errors))),
        }
    }

    /// Validate, then build the configured search engine.
    ///
    /// The engine coerces to `Arc<dyn SearchEngine>` for the advisors and can
    /// be handed to an [`IdleSweeper`](crate::tools::search::IdleSweeper) as is.
    pub fn build_engine(&self) -> crate::Result<Arc<dyn SessionHousekeeping>> {
        self.validate()?;
        Ok(self.backend.build_engine(self))
    }

    pub fn session_idle_ttl(&self) -> Option<Duration> {
        self.session_idle_ttl_secs.map(Duration::from_secs)
    }
}
