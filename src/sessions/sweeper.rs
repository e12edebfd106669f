//! Background eviction of idle sessions.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::traits::SessionStore;

/// Periodic task calling [`SessionStore::cleanup_inactive`].
///
/// Dropping the sweeper aborts the task; [`SessionSweeper::shutdown`] stops it
/// and waits for the loop to exit.
pub struct SessionSweeper {
    stop: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl SessionSweeper {
    /// Spawn the sweep loop on the current runtime. The first sweep runs one
    /// `interval` after start.
    pub fn start(store: Arc<dyn SessionStore>, interval: Duration, timeout: Duration) -> Self {
        let (stop, mut stopped) = watch::channel(false);
        let period = interval.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    changed = stopped.changed() => {
                        if changed.is_err() || *stopped.borrow() {
                            tracing::debug!("Session sweeper stopped");
                            return;
                        }
                    }
                    _ = ticker.tick() => {
                        let removed = store.cleanup_inactive(timeout);
                        if removed > 0 {
                            tracing::info!(
                                removed,
                                remaining = store.len(),
                                "Evicted inactive sessions"
                            );
                        }
                    }
                }
            }
        });

        Self {
            stop,
            handle: Some(handle),
        }
    }

    pub async fn shutdown(mut self) {
        let _ = self.stop.send(true);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Session sweeper task ended abnormally");
            }
        }
    }
}

impl Drop for SessionSweeper {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::{InMemorySessionStore, SessionData, State};

    #[tokio::test]
    async fn sweeper_evicts_idle_sessions() {
        let store = Arc::new(InMemorySessionStore::new());
        store.set_state("u1", State::MainMenu, SessionData::new());

        let sweeper = SessionSweeper::start(
            store.clone(),
            Duration::from_millis(10),
            Duration::ZERO,
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
        sweeper.shutdown().await;

        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn sweeper_keeps_active_sessions() {
        let store = Arc::new(InMemorySessionStore::new());
        store.set_state("u1", State::MainMenu, SessionData::new());

        let sweeper = SessionSweeper::start(
            store.clone(),
            Duration::from_millis(10),
            Duration::from_secs(3600),
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        sweeper.shutdown().await;

        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn shutdown_returns_promptly() {
        let store = Arc::new(InMemorySessionStore::new());
        let sweeper = SessionSweeper::start(
            store,
            Duration::from_secs(3600),
            Duration::from_secs(3600),
        );
        tokio::time::timeout(Duration::from_secs(1), sweeper.shutdown())
            .await
            .expect("sweeper did not stop");
    }
}
