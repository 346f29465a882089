//! Semantic search over a single vector store shared by all sessions.

mod embedding;
mod store;

pub use embedding::{Embedder, HashingEmbedder};
pub use store::{InMemoryVectorStore, ScoredDocument, VectorDocument, VectorStore};

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::engine::{DEFAULT_MAX_RESULTS, SearchEngine, SessionHousekeeping};
use super::index::{SessionRegistry, next_entry_id};
use crate::types::{SearchRequest, SearchResponse, SearchType, ToolReference};

/// Neighbors fetched from the store before session filtering.
pub const DEFAULT_CANDIDATE_LIMIT: usize = 10;
/// Minimum cosine similarity for a neighbor to be considered.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.2;

const META_SESSION_ID: &str = "sessionId";
const META_ID: &str = "id";
const META_TOOL_NAME: &str = "toolName";
const META_TOOL_DESCRIPTION: &str = "toolDescription";

/// Vector engine over a shared [`VectorStore`].
///
/// The store is not partitioned, so every query result is filtered on the
/// `sessionId` metadata. The registry only tracks which document ids belong to
/// each session so `clear_index` can delete them.
pub struct VectorSearchEngine {
    store: Arc<dyn VectorStore>,
    sessions: SessionRegistry<Mutex<Vec<String>>>,
    candidate_limit: usize,
    similarity_threshold: f32,
}

impl VectorSearchEngine {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self {
            store,
            sessions: SessionRegistry::new(),
            candidate_limit: DEFAULT_CANDIDATE_LIMIT,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }

    /// Engine backed by an [`InMemoryVectorStore`] with the given embedder.
    pub fn in_memory(embedder: Arc<dyn Embedder>) -> Self {
        Self::new(Arc::new(InMemoryVectorStore::new(embedder)))
    }

    pub fn with_candidate_limit(mut self, candidate_limit: usize) -> Self {
        self.candidate_limit = candidate_limit;
        self
    }

    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }
}

impl SearchEngine for VectorSearchEngine {
    fn search_type(&self) -> SearchType {
        SearchType::Semantic
    }

    fn index_tool(&self, session_id: &str, reference: &ToolReference) -> crate::Result<()> {
        if session_id.trim().is_empty() {
            warn!(tool = %reference.tool_name, "No session id provided, skipping indexing");
            return Ok(());
        }

        let id = format!("{session_id}:{}", next_entry_id());
        let document = VectorDocument::new(&id, &reference.summary)
            .with_metadata(META_SESSION_ID, session_id)
            .with_metadata(META_ID, &id)
            .with_metadata(META_TOOL_NAME, &reference.tool_name)
            .with_metadata(META_TOOL_DESCRIPTION, &reference.summary);

        // The id is recorded and the vector stored under the session lock, on
        // a slot that is still registered. A concurrent clear either sees both
        // or neither.
        loop {
            let ids = self
                .sessions
                .get_or_create(session_id, || Mutex::new(Vec::new()));
            let mut guard = ids.lock().unwrap_or_else(|e| e.into_inner());
            if !self.sessions.holds(session_id, &ids) {
                continue;
            }
            guard.push(id.clone());
            if let Err(e) = self.store.add(vec![document]) {
                guard.pop();
                return Err(e);
            }
            break;
        }
        debug!(session_id, tool = %reference.tool_name, %id, "Indexed tool");
        Ok(())
    }

    fn search(&self, request: &SearchRequest) -> crate::Result<SearchResponse> {
        let start = Instant::now();

        if !request.has_session() {
            warn!("No session id provided in search request, returning empty results");
            return Ok(SearchResponse::empty(self.search_type(), &request.query));
        }
        if self.sessions.get(&request.session_id).is_none() {
            debug!(session_id = %request.session_id, "No documents indexed for session");
            return Ok(SearchResponse::empty(self.search_type(), &request.query));
        }

        let limit = request.limit_or(DEFAULT_MAX_RESULTS);
        let candidates = self.store.similarity_search(
            &request.query,
            self.candidate_limit.max(limit),
            self.similarity_threshold,
        )?;
        let fetched = candidates.len();

        let references: Vec<ToolReference> = candidates
            .into_iter()
            .filter(|c| c.document.metadata_value(META_SESSION_ID) == Some(request.session_id.as_str()))
            .take(limit)
            .map(|c| {
                let name = c
                    .document
                    .metadata_value(META_TOOL_NAME)
                    .unwrap_or_default()
                    .to_string();
                let summary = c
                    .document
                    .metadata_value(META_TOOL_DESCRIPTION)
                    .unwrap_or(c.document.text.as_str())
                    .to_string();
                ToolReference::new(name, summary).with_score(f64::from(c.score))
            })
            .collect();
        debug!(
            session_id = %request.session_id,
            fetched,
            kept = references.len(),
            "Filtered semantic candidates by session"
        );

        Ok(SearchResponse::new(
            self.search_type(),
            &request.query,
            references,
            start.elapsed().as_millis() as u64,
        ))
    }

    fn clear_index(&self, session_id: &str) -> crate::Result<()> {
        let Some(ids) = self.sessions.remove(session_id) else {
            return Ok(());
        };
        let ids = std::mem::take(&mut *ids.lock().unwrap_or_else(|e| e.into_inner()));
        if !ids.is_empty() {
            self.store.delete(&ids)?;
        }
        debug!(session_id, removed = ids.len(), "Deleted session vectors");
        Ok(())
    }
}

impl SessionHousekeeping for VectorSearchEngine {
    fn size(&self, session_id: &str) -> crate::Result<usize> {
        Ok(self
            .sessions
            .get(session_id)
            .map(|ids| ids.lock().unwrap_or_else(|e| e.into_inner()).len())
            .unwrap_or(0))
    }

    fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn idle_sessions(&self, max_idle: Duration) -> Vec<String> {
        self.sessions.idle_sessions(max_idle)
    }

    fn total_size(&self) -> crate::Result<usize> {
        Ok(self.store.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> VectorSearchEngine {
        VectorSearchEngine::in_memory(Arc::new(HashingEmbedder::default()))
    }

    #[test]
    fn test_identical_summary_is_found() {
        let engine = engine();
        engine
            .index_tool("s1", &ToolReference::new("weather", "Get the weather for a location"))
            .unwrap();
        engine
            .index_tool("s1", &ToolReference::new("sendEmail", "Send an email message"))
            .unwrap();

        let response = engine
            .search(&SearchRequest::new("s1", "Get the weather for a location"))
            .unwrap();
        assert_eq!(response.tool_references[0].tool_name, "weather");
        assert_eq!(response.tool_references[0].summary, "Get the weather for a location");
        assert_eq!(response.search_metadata.search_type, SearchType::Semantic);
    }

    #[test]
    fn test_shared_store_is_filtered_by_session() {
        let engine = engine();
        engine
            .index_tool("a", &ToolReference::new("weather", "Get the weather for a location"))
            .unwrap();
        engine
            .index_tool("b", &ToolReference::new("weatherB", "Get the weather for a location"))
            .unwrap();
        assert_eq!(engine.total_size().unwrap(), 2);

        let response = engine
            .search(&SearchRequest::new("b", "Get the weather for a location"))
            .unwrap();
        assert_eq!(response.tool_names(), vec!["weatherB".to_string()]);
    }

    #[test]
    fn test_clear_deletes_only_session_vectors() {
        let engine = engine();
        engine
            .index_tool("a", &ToolReference::new("weather", "Get the weather"))
            .unwrap();
        engine
            .index_tool("b", &ToolReference::new("email", "Send an email"))
            .unwrap();

        engine.clear_index("a").unwrap();
        engine.clear_index("a").unwrap();
        assert_eq!(engine.store().len(), 1);
        assert_eq!(engine.size("a").unwrap(), 0);
        assert_eq!(engine.size("b").unwrap(), 1);

        let response = engine.search(&SearchRequest::new("a", "Get the weather")).unwrap();
        assert!(response.is_empty());
        assert_eq!(response.total_matches, 0);
    }

    #[test]
    fn test_clear_racing_index_leaves_no_orphans() {
        let engine = engine();
        std::thread::scope(|scope| {
            scope.spawn(|| {
                for i in 0..200 {
                    engine
                        .index_tool("churn", &ToolReference::new(format!("tool{i}"), "Churn entry"))
                        .unwrap();
                }
            });
            scope.spawn(|| {
                for _ in 0..200 {
                    engine.clear_index("churn").unwrap();
                }
            });
        });

        engine.clear_index("churn").unwrap();
        assert_eq!(engine.store().len(), 0);
    }

    #[test]
    fn test_candidate_limit_covers_requested_results() {
        let engine = engine().with_candidate_limit(1);
        for i in 0..4 {
            engine
                .index_tool("s1", &ToolReference::new(format!("tool{i}"), "shared catalog entry"))
                .unwrap();
        }
        let response = engine
            .search(&SearchRequest::new("s1", "shared catalog entry").with_max_results(3))
            .unwrap();
        assert_eq!(response.tool_references.len(), 3);
    }

    #[test]
    fn test_unrelated_query_below_threshold() {
        let engine = engine().with_similarity_threshold(0.99);
        engine
            .index_tool("s1", &ToolReference::new("weather", "Get the weather for a location"))
            .unwrap();
        let response = engine.search(&SearchRequest::new("s1", "weather")).unwrap();
        assert!(response.is_empty());
    }
}
