//! Background sweep of idle sessions.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use super::SessionHousekeeping;
use crate::config::ToolSearchSettings;

/// Shortest period between two sweeps started from settings.
const MIN_SWEEP_PERIOD: Duration = Duration::from_secs(1);

/// Per-session state that can be reclaimed once idle.
///
/// Implemented by every engine with [`SessionHousekeeping`] and by
/// [`ConversationCatalog`](crate::advisor::ConversationCatalog), which also
/// drops the conversation's callback cache.
pub trait IdleSweep: Send + Sync {
    /// Release every session idle for at least `max_idle`, returning how many
    /// were dropped.
    fn sweep(&self, max_idle: Duration) -> crate::Result<usize>;
}

impl<T: SessionHousekeeping + ?Sized> IdleSweep for T {
    fn sweep(&self, max_idle: Duration) -> crate::Result<usize> {
        self.sweep_idle(max_idle)
    }
}

/// Periodically clears sessions idle longer than a TTL.
///
/// The task is aborted when the handle is dropped or [`IdleSweeper::stop`] is called.
#[derive(Debug)]
pub struct IdleSweeper {
    handle: JoinHandle<()>,
}

impl IdleSweeper {
    /// Spawn the sweep on the current tokio runtime.
    pub fn spawn<S>(target: Arc<S>, ttl: Duration, every: Duration) -> Self
    where
        S: IdleSweep + ?Sized + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match target.sweep(ttl) {
                    Ok(swept) => debug!(swept, "Idle session sweep finished"),
                    Err(e) => warn!(error = %e, "Idle session sweep failed"),
                }
            }
        });
        Self { handle }
    }

    /// Sweep with `session_idle_ttl_secs`, checking twice per TTL. `None`
    /// when no TTL is configured.
    pub fn from_settings<S>(settings: &ToolSearchSettings, target: Arc<S>) -> Option<Self>
    where
        S: IdleSweep + ?Sized + 'static,
    {
        let ttl = settings.session_idle_ttl()?;
        let every = (ttl / 2).max(MIN_SWEEP_PERIOD);
        info!(ttl_secs = ttl.as_secs(), every_ms = every.as_millis() as u64, "Starting idle session sweep");
        Some(Self::spawn(target, ttl, every))
    }

    pub fn stop(self) {
        self.handle.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for IdleSweeper {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::search::{PatternSearchEngine, SearchEngine};
    use crate::types::ToolReference;

    #[tokio::test]
    async fn test_sweeps_idle_sessions() {
        let engine = Arc::new(PatternSearchEngine::new());
        engine
            .index_tool("s1", &ToolReference::new("weather", "Weather forecast"))
            .unwrap();
        assert_eq!(engine.session_count(), 1);

        let sweeper = IdleSweeper::spawn(
            engine.clone(),
            Duration::ZERO,
            Duration::from_millis(10),
        );
        assert!(sweeper.is_running());

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(engine.session_count(), 0);
        sweeper.stop();
    }

    #[tokio::test]
    async fn test_from_settings_needs_a_ttl() {
        let engine: Arc<dyn SessionHousekeeping> = Arc::new(PatternSearchEngine::new());
        assert!(IdleSweeper::from_settings(&ToolSearchSettings::default(), engine.clone()).is_none());

        let settings = ToolSearchSettings {
            session_idle_ttl_secs: Some(300),
            ..Default::default()
        };
        let sweeper = IdleSweeper::from_settings(&settings, engine).unwrap();
        assert!(sweeper.is_running());
    }
}
