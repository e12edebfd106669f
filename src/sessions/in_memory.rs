//! In-memory session store implementation.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::traits::{Session, SessionData, SessionStore, State};
use crate::cache::{Clock, SystemClock};

/// Session table behind a single reader/writer lock.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    clock: Arc<dyn Clock>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Snapshot of one session, mainly for diagnostics.
    pub fn session(&self, user_id: &str) -> Option<Session> {
        self.sessions.read().get(user_id).cloned()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for InMemorySessionStore {
    fn set_state(&self, user_id: &str, state: State, delta: SessionData) {
        let now = self.clock.now();
        let mut sessions = self.sessions.write();
        let session = sessions
            .entry(user_id.to_string())
            .or_insert_with(|| Session {
                user_id: user_id.to_string(),
                state: State::Initial,
                data: SessionData::new(),
                last_active: now,
            });
        session.state = state;
        session.data.merge(delta);
        session.last_active = now;
    }

    fn get_state(&self, user_id: &str) -> (State, SessionData) {
        match self.sessions.read().get(user_id) {
            Some(session) => (session.state, session.data.clone()),
            None => (State::Initial, SessionData::new()),
        }
    }

    fn clear_state(&self, user_id: &str) {
        self.sessions.write().remove(user_id);
    }

    fn cleanup_inactive(&self, timeout: Duration) -> usize {
        let now = self.clock.now();
        let Ok(timeout) = chrono::Duration::from_std(timeout) else {
            return 0;
        };

        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, session| now.signed_duration_since(session.last_active) <= timeout);
        before - sessions.len()
    }

    fn len(&self) -> usize {
        self.sessions.read().len()
    }

    fn name(&self) -> &str {
        "in_memory"
    }
}
