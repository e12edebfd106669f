//! Conversation sessions: per-user state, scoped session data and idle eviction.

pub mod in_memory;
pub mod sweeper;
pub mod traits;

pub use in_memory::InMemorySessionStore;
pub use sweeper::SessionSweeper;
pub use traits::{
    DataKey, Flow, ProfileTarget, SelectionMap, Session, SessionData, SessionEntry,
    SessionStore, SessionValue, State,
};

/// Create a default in-memory session store.
pub fn create_session_store() -> std::sync::Arc<dyn SessionStore> {
    std::sync::Arc::new(InMemorySessionStore::new())
}
