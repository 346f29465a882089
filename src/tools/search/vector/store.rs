//! Vector store seam and an in-process implementation.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::embedding::{Embedder, cosine_similarity};

/// A text document with string metadata, addressed by id.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorDocument {
    pub id: String,
    pub text: String,
    pub metadata: HashMap<String, String>,
}

impl VectorDocument {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub document: VectorDocument,
    pub score: f32,
}

/// Similarity store shared by every session.
///
/// The store knows nothing about sessions; callers tag documents through
/// metadata and filter results themselves.
pub trait VectorStore: Send + Sync {
    /// Embed and insert documents, replacing any with the same id.
    fn add(&self, documents: Vec<VectorDocument>) -> crate::Result<()>;

    /// Up to `top_k` documents with similarity at or above `threshold`, best first.
    fn similarity_search(
        &self,
        query: &str,
        top_k: usize,
        threshold: f32,
    ) -> crate::Result<Vec<ScoredDocument>>;

    /// Remove documents by id. Unknown ids are ignored.
    fn delete(&self, ids: &[String]) -> crate::Result<()>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Brute-force cosine similarity store held in memory.
pub struct InMemoryVectorStore {
    embedder: Arc<dyn Embedder>,
    entries: RwLock<HashMap<String, (VectorDocument, Vec<f32>)>>,
}

impl InMemoryVectorStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }
}

impl std::fmt::Debug for InMemoryVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryVectorStore")
            .field("dimensions", &self.embedder.dimensions())
            .field("len", &self.len())
            .finish()
    }
}

impl VectorStore for InMemoryVectorStore {
    fn add(&self, documents: Vec<VectorDocument>) -> crate::Result<()> {
        // Embed outside the lock.
        let embedded = documents
            .into_iter()
            .map(|doc| {
                let vector = self.embedder.embed(&doc.text)?;
                Ok((doc, vector))
            })
            .collect::<crate::Result<Vec<_>>>()?;

        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        for (doc, vector) in embedded {
            entries.insert(doc.id.clone(), (doc, vector));
        }
        Ok(())
    }

    fn similarity_search(
        &self,
        query: &str,
        top_k: usize,
        threshold: f32,
    ) -> crate::Result<Vec<ScoredDocument>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let query_vector = self.embedder.embed(query)?;

        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut scored: Vec<ScoredDocument> = entries
            .values()
            .filter_map(|(doc, vector)| {
                let score = cosine_similarity(&query_vector, vector);
                (score >= threshold).then(|| ScoredDocument {
                    document: doc.clone(),
                    score,
                })
            })
            .collect();
        drop(entries);

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.document.id.cmp(&b.document.id))
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    fn delete(&self, ids: &[String]) -> crate::Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        for id in ids {
            entries.remove(id);
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}
