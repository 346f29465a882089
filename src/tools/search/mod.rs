//! Per-session tool search for progressive disclosure.
//!
//! Three interchangeable engines implement [`SearchEngine`]:
//!
//! - [`PatternSearchEngine`]: query terms compiled into a case-insensitive regex
//!   alternation, scored by match count and position.
//! - [`KeywordSearchEngine`]: one in-memory Tantivy index per session, BM25 ranked.
//! - [`VectorSearchEngine`]: a single shared [`VectorStore`] with session
//!   isolation enforced by post-query metadata filtering.

mod engine;
mod index;
mod keyword;
mod pattern;
mod sweep;
mod vector;

pub use engine::{DEFAULT_MAX_RESULTS, SearchEngine, SessionHousekeeping};
pub use index::{SessionRegistry, next_entry_id};
pub use keyword::{DEFAULT_MIN_SCORE, KeywordSearchEngine};
pub use pattern::{MAX_PATTERN_LENGTH, PatternSearchEngine};
pub use sweep::{IdleSweep, IdleSweeper};
pub use vector::{
    DEFAULT_CANDIDATE_LIMIT, DEFAULT_SIMILARITY_THRESHOLD, Embedder, HashingEmbedder,
    InMemoryVectorStore, ScoredDocument, VectorDocument, VectorSearchEngine, VectorStore,
};
