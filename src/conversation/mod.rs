//! Per-user conversation state machine: inbound events, global commands and dispatch.

pub mod commands;
pub mod dispatcher;
pub mod traits;

pub use commands::GlobalCommand;
pub use dispatcher::{ConversationDispatcher, FALLBACK_MESSAGE};
pub use traits::{
    DispatchOutcome, Dispatcher, Effect, EventKind, HandlerContext, InboundEvent, Input,
    Navigator, Screen, StateChange, StateHandler, Transition, GET_STARTED_PAYLOAD,
};

use std::sync::Arc;

use crate::messenger::Messenger;
use crate::sessions::SessionStore;

pub fn create_dispatcher(
    sessions: Arc<dyn SessionStore>,
    messenger: Arc<dyn Messenger>,
    navigator: Arc<dyn Navigator>,
    handlers: Vec<Arc<dyn StateHandler>>,
) -> Arc<dyn Dispatcher> {
    Arc::new(ConversationDispatcher::new(sessions, messenger, navigator).with_handlers(handlers))
}
