//! Search engine traits.

use std::time::Duration;

use tracing::info;

use crate::types::{SearchRequest, SearchResponse, SearchType, ToolReference};

/// Result cap applied when a request does not specify one.
pub const DEFAULT_MAX_RESULTS: usize = 10;

/// A per-session tool catalog search backend.
///
/// Implementations keep every session's entries isolated: a search under one
/// session id never returns entries indexed under another. Searching a session
/// that was never indexed (or was already cleared) yields an empty response.
/// Errors are reserved for backend storage failures, which callers should treat
/// as fatal.
pub trait SearchEngine: Send + Sync {
    fn search_type(&self) -> SearchType;

    /// Add an entry to the session's index, creating the index on first use.
    fn index_tool(&self, session_id: &str, reference: &ToolReference) -> crate::Result<()>;

    fn search(&self, request: &SearchRequest) -> crate::Result<SearchResponse>;

    /// Drop every entry of the session. Clearing an unknown session is a no-op.
    fn clear_index(&self, session_id: &str) -> crate::Result<()>;
}

/// Session bookkeeping shared by the bundled engines.
pub trait SessionHousekeeping: SearchEngine {
    /// Number of entries indexed under the session.
    fn size(&self, session_id: &str) -> crate::Result<usize>;

    fn session_count(&self) -> usize;

    /// Sessions not touched by an index or search call within `max_idle`.
    fn idle_sessions(&self, max_idle: Duration) -> Vec<String>;

    /// Clear every idle session, returning how many were removed.
    ///
    /// Conversations that never reach their finalize hook would otherwise keep
    /// their index forever.
    fn sweep_idle(&self, max_idle: Duration) -> crate::Result<usize> {
        let idle = self.idle_sessions(max_idle);
        for session_id in &idle {
            self.clear_index(session_id)?;
        }
        if !idle.is_empty() {
            info!(
                engine = %self.search_type(),
                swept = idle.len(),
                "Cleared idle tool search sessions"
            );
        }
        Ok(idle.len())
    }

    fn total_size(&self) -> crate::Result<usize>;
}
