//! Concurrent session registry shared by the search engines.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

static NEXT_ENTRY_ID: AtomicU64 = AtomicU64::new(0);

/// Process-wide unique entry id. Opaque identity only; not a ranking signal.
pub fn next_entry_id() -> u64 {
    NEXT_ENTRY_ID.fetch_add(1, Ordering::Relaxed)
}

struct Slot<I> {
    index: Arc<I>,
    last_used_ms: AtomicU64,
}

/// Maps session ids to backend-specific indexes.
///
/// Indexes are created on first use and dropped only by [`remove`](Self::remove).
/// Lookups hand out `Arc` clones, so a search that raced a removal keeps a valid
/// (detached) index until it finishes.
pub struct SessionRegistry<I> {
    sessions: DashMap<String, Slot<I>>,
    epoch: Instant,
}

impl<I> SessionRegistry<I> {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            epoch: Instant::now(),
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    fn slot(&self, index: Arc<I>) -> Slot<I> {
        Slot {
            index,
            last_used_ms: AtomicU64::new(self.now_ms()),
        }
    }

    /// Get the session's index, creating it with `create` if absent.
    pub fn get_or_try_create<E>(
        &self,
        session_id: &str,
        create: impl FnOnce() -> Result<I, E>,
    ) -> Result<Arc<I>, E> {
        match self.sessions.entry(session_id.to_string()) {
            Entry::Occupied(entry) => {
                let slot = entry.get();
                slot.last_used_ms.store(self.now_ms(), Ordering::Relaxed);
                Ok(Arc::clone(&slot.index))
            }
            Entry::Vacant(entry) => {
                let index = Arc::new(create()?);
                entry.insert(self.slot(Arc::clone(&index)));
                Ok(index)
            }
        }
    }

    pub fn get_or_create(&self, session_id: &str, create: impl FnOnce() -> I) -> Arc<I> {
        match self.get_or_try_create::<std::convert::Infallible>(session_id, || Ok(create())) {
            Ok(index) => index,
            Err(never) => match never {},
        }
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<I>> {
        self.sessions.get(session_id).map(|slot| {
            slot.last_used_ms.store(self.now_ms(), Ordering::Relaxed);
            Arc::clone(&slot.index)
        })
    }

    /// Whether `index` is still the live index of the session, i.e. it was not
    /// removed (or replaced) since it was handed out.
    pub fn holds(&self, session_id: &str, index: &Arc<I>) -> bool {
        self.sessions
            .get(session_id)
            .is_some_and(|slot| Arc::ptr_eq(&slot.index, index))
    }

    pub fn remove(&self, session_id: &str) -> Option<Arc<I>> {
        self.sessions.remove(session_id).map(|(_, slot)| slot.index)
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    pub fn indexes(&self) -> Vec<Arc<I>> {
        self.sessions
            .iter()
            .map(|e| Arc::clone(&e.value().index))
            .collect()
    }

    pub fn idle_sessions(&self, max_idle: Duration) -> Vec<String> {
        let now = self.now_ms();
        let max_idle_ms = max_idle.as_millis() as u64;
        self.sessions
            .iter()
            .filter(|e| {
                now.saturating_sub(e.value().last_used_ms.load(Ordering::Relaxed)) >= max_idle_ms
            })
            .map(|e| e.key().clone())
            .collect()
    }
}

impl<I> Default for SessionRegistry<I> {
    fn default() -> Self {
        Self::new()
    }
}
