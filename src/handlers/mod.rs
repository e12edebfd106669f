//! Student-services screens: every menu, list and flow the assistant offers,
//! plus the per-state handlers that route input to them.

pub mod account;
pub mod actions;
pub mod grades;
pub mod listings;
pub mod messages;
pub mod payables;
pub mod replies;
pub mod states;
pub mod support;

pub use actions::Actions;
pub use listings::{ATTENDANCE_PER_PAGE, BULLETINS_PER_PAGE};
pub use replies::UserStatus;
pub use states::state_handlers;

use chrono_tz::Tz;
use std::sync::Arc;

use crate::conversation::{create_dispatcher, Dispatcher};
use crate::messenger::Messenger;
use crate::repositories::Repositories;
use crate::sessions::SessionStore;

/// Dispatcher wired with every state handler and `actions` as navigator.
pub fn assemble(
    sessions: Arc<dyn SessionStore>,
    messenger: Arc<dyn Messenger>,
    actions: Arc<Actions>,
) -> Arc<dyn Dispatcher> {
    let handlers = state_handlers(&actions);
    create_dispatcher(sessions, messenger, actions, handlers)
}

/// Build the assistant on top of the given stores.
pub fn create_assistant(
    sessions: Arc<dyn SessionStore>,
    messenger: Arc<dyn Messenger>,
    repos: Repositories,
    timezone: Tz,
) -> Arc<dyn Dispatcher> {
    let actions = Arc::new(Actions::new(repos, messenger.clone(), timezone));
    assemble(sessions, messenger, actions)
}
