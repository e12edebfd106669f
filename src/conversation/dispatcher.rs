use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use super::commands::GlobalCommand;
use super::traits::{
    DispatchOutcome, Dispatcher, Effect, EventKind, HandlerContext, InboundEvent, Input,
    Navigator, Screen, StateHandler, Transition, GET_STARTED_PAYLOAD,
};
use crate::messenger::Messenger;
use crate::sessions::{SessionData, SessionStore, State};

/// Sent when a handler fails.
pub const FALLBACK_MESSAGE: &str = "Sorry, something went wrong. Please try again later.";

const BACK: &str = "BACK";
const VIEW_MORE: &str = "VIEW MORE";

/// Routes each event to the global command table or to the handler
/// registered for the user's current state, then applies the transition.
pub struct ConversationDispatcher {
    sessions: Arc<dyn SessionStore>,
    messenger: Arc<dyn Messenger>,
    navigator: Arc<dyn Navigator>,
    handlers: HashMap<State, Arc<dyn StateHandler>>,
}

impl ConversationDispatcher {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        messenger: Arc<dyn Messenger>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            sessions,
            messenger,
            navigator,
            handlers: HashMap::new(),
        }
    }

    /// Register `handler` for every state it declares. Later registrations win.
    pub fn register(&mut self, handler: Arc<dyn StateHandler>) {
        for state in handler.states() {
            self.handlers.insert(*state, Arc::clone(&handler));
        }
    }

    pub fn with_handlers(mut self, handlers: Vec<Arc<dyn StateHandler>>) -> Self {
        for handler in handlers {
            self.register(handler);
        }
        self
    }

    pub fn handles(&self, state: State) -> bool {
        self.handlers.contains_key(&state)
    }

    async fn route(&self, user_id: &str, input: &Input) -> Result<(State, Transition)> {
        let (state, data) = self.sessions.get_state(user_id);
        let ctx = HandlerContext {
            user_id: user_id.to_string(),
            state,
        };
        let command = GlobalCommand::parse(&input.normalized);

        let transition = if state != State::Initial && command.is_none() {
            self.route_in_state(&ctx, input, &data).await?
        } else {
            self.navigator.global(&ctx, command).await?
        };
        Ok((state, transition))
    }

    async fn route_in_state(
        &self,
        ctx: &HandlerContext,
        input: &Input,
        data: &SessionData,
    ) -> Result<Transition> {
        let state = ctx.state;

        if input.is(BACK) {
            let target = state.back_target();
            let rendered = self
                .navigator
                .render(ctx, Screen::back_from(state))
                .await?;
            return Ok(Transition::enter(target).then(rendered));
        }

        let Some(handler) = self.handlers.get(&state) else {
            tracing::warn!(user = %ctx.user_id, state = %state, "No handler registered for state");
            return self.navigator.global(ctx, None).await;
        };

        if input.is(VIEW_MORE) && state.is_paginated() {
            if let Some(cursor) = data.cursor(state) {
                if let Some(transition) = handler.page(ctx, cursor.next_page()).await? {
                    return Ok(transition);
                }
            }
        }

        handler.handle(ctx, input, data).await
    }

    async fn deliver(&self, user_id: &str, effects: &[Effect]) -> Result<(), String> {
        for effect in effects {
            let sent = match effect {
                Effect::SendText { text } => self.messenger.send_text(user_id, text).await,
                Effect::SendQuickReplies { text, replies } => {
                    self.messenger
                        .send_quick_replies(user_id, text, replies)
                        .await
                }
            };
            if let Err(e) = sent {
                return Err(e.to_string());
            }
        }
        Ok(())
    }

    async fn apply(&self, user_id: &str, state: State, transition: Transition) -> DispatchOutcome {
        let final_state = match transition.next {
            Some(change) => {
                tracing::debug!(
                    user = %user_id,
                    from = %state,
                    to = %change.state,
                    "State transition"
                );
                self.sessions.set_state(user_id, change.state, change.delta);
                change.state
            }
            None => state,
        };

        let effects = transition.effects.len();
        match self.deliver(user_id, &transition.effects).await {
            Ok(()) => DispatchOutcome::Handled {
                state: final_state,
                effects,
            },
            Err(error) => {
                tracing::error!(
                    user = %user_id,
                    state = %final_state,
                    error = %error,
                    "Failed to deliver reply"
                );
                DispatchOutcome::DeliveryFailed { error }
            }
        }
    }
}

#[async_trait]
impl Dispatcher for ConversationDispatcher {
    async fn dispatch(&self, event: InboundEvent) -> DispatchOutcome {
        let user_id = event.user_id.as_str();
        if user_id.is_empty() {
            return DispatchOutcome::Ignored;
        }

        let routed = match &event.kind {
            EventKind::Postback { payload } => {
                if !payload.trim().eq_ignore_ascii_case(GET_STARTED_PAYLOAD) {
                    tracing::debug!(user = %user_id, payload = %payload, "Ignoring postback");
                    return DispatchOutcome::Ignored;
                }
                let (state, _) = self.sessions.get_state(user_id);
                let ctx = HandlerContext {
                    user_id: user_id.to_string(),
                    state,
                };
                self.navigator
                    .render(&ctx, Screen::Welcome)
                    .await
                    .map(|t| (state, t))
            }
            EventKind::Text { raw, quick_reply } => {
                let input = match quick_reply.as_deref() {
                    Some(payload) if !payload.trim().is_empty() => Input::new(payload),
                    _ => Input::new(raw),
                };
                if input.raw.is_empty() {
                    return DispatchOutcome::Ignored;
                }
                self.route(user_id, &input).await
            }
        };

        match routed {
            Ok((state, transition)) => self.apply(user_id, state, transition).await,
            Err(e) => {
                let (state, _) = self.sessions.get_state(user_id);
                tracing::warn!(
                    user = %user_id,
                    state = %state,
                    error = %e,
                    "Conversation handler failed"
                );
                if let Err(send_err) = self.messenger.send_text(user_id, FALLBACK_MESSAGE).await {
                    tracing::error!(
                        user = %user_id,
                        error = %send_err,
                        "Failed to send fallback message"
                    );
                }
                DispatchOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    fn name(&self) -> &str {
        "conversation"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messenger::RecordingMessenger;
    use crate::pagination::paginate;
    use crate::sessions::InMemorySessionStore;
    use anyhow::bail;
    use parking_lot::Mutex;

    /// Navigator that records what it was asked to do.
    #[derive(Default)]
    struct ScriptedNavigator {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Navigator for ScriptedNavigator {
        async fn global(
            &self,
            _ctx: &HandlerContext,
            command: Option<GlobalCommand>,
        ) -> Result<Transition> {
            let label = command.map_or("default".to_string(), |c| c.to_string());
            self.calls.lock().push(label.clone());
            match command {
                Some(GlobalCommand::Menu) => {
                    Ok(Transition::enter(State::MainMenu).with_text("main menu"))
                }
                Some(GlobalCommand::TalkToHuman) => bail!("directory offline"),
                _ => Ok(Transition::text(label)),
            }
        }

        async fn render(&self, _ctx: &HandlerContext, screen: Screen) -> Result<Transition> {
            self.calls.lock().push(format!("render {screen:?}"));
            Ok(Transition::text(format!("{screen:?}")))
        }
    }

    /// Paginated handler for the bulletin state.
    struct ListHandler;

    #[async_trait]
    impl StateHandler for ListHandler {
        fn states(&self) -> &[State] {
            &[State::ViewBulletin]
        }

        async fn handle(
            &self,
            _ctx: &HandlerContext,
            input: &Input,
            _data: &SessionData,
        ) -> Result<Transition> {
            Ok(Transition::text(format!("invalid: {}", input.normalized)))
        }

        async fn page(&self, _ctx: &HandlerContext, page: usize) -> Result<Option<Transition>> {
            let window = paginate(7, 3, page);
            Ok(Some(
                Transition::enter_with(
                    State::ViewBulletin,
                    SessionData::new().with_cursor(State::ViewBulletin, window.cursor(3)),
                )
                .with_text(format!("page {}", window.page)),
            ))
        }

        fn name(&self) -> &str {
            "list"
        }
    }

    struct Harness {
        dispatcher: ConversationDispatcher,
        sessions: Arc<InMemorySessionStore>,
        messenger: Arc<RecordingMessenger>,
        navigator: Arc<ScriptedNavigator>,
    }

    fn harness() -> Harness {
        let sessions = Arc::new(InMemorySessionStore::new());
        let messenger = Arc::new(RecordingMessenger::new());
        let navigator = Arc::new(ScriptedNavigator::default());
        let dispatcher =
            ConversationDispatcher::new(sessions.clone(), messenger.clone(), navigator.clone())
                .with_handlers(vec![Arc::new(ListHandler)]);
        Harness {
            dispatcher,
            sessions,
            messenger,
            navigator,
        }
    }

    #[tokio::test]
    async fn initial_state_routes_through_global_table() {
        let h = harness();
        let outcome = h.dispatcher.dispatch(InboundEvent::text("u1", " menu ")).await;

        assert_eq!(
            outcome,
            DispatchOutcome::Handled {
                state: State::MainMenu,
                effects: 1
            }
        );
        assert_eq!(h.sessions.get_state("u1").0, State::MainMenu);
        assert_eq!(h.messenger.texts(), vec!["main menu"]);
    }

    #[tokio::test]
    async fn unmatched_initial_input_uses_default_handler() {
        let h = harness();
        h.dispatcher.dispatch(InboundEvent::text("u1", "hello")).await;
        assert_eq!(h.navigator.calls.lock().clone(), vec!["default"]);
    }

    #[tokio::test]
    async fn quick_reply_payload_takes_precedence() {
        let h = harness();
        h.dispatcher
            .dispatch(InboundEvent::quick_reply("u1", "Back to Menu", "MAIN MENU"))
            .await;
        assert_eq!(h.navigator.calls.lock().clone(), vec!["MENU"]);
    }

    #[tokio::test]
    async fn global_command_wins_over_state_handler() {
        let h = harness();
        h.sessions
            .set_state("u1", State::ViewBulletin, SessionData::new());
        h.dispatcher.dispatch(InboundEvent::text("u1", "ABOUT US")).await;
        assert_eq!(h.navigator.calls.lock().clone(), vec!["ABOUT US"]);
    }

    #[tokio::test]
    async fn view_more_with_cursor_requests_next_page() {
        let h = harness();
        h.sessions.set_state(
            "u1",
            State::ViewBulletin,
            SessionData::new().with_cursor(State::ViewBulletin, paginate(7, 3, 1).cursor(3)),
        );

        h.dispatcher.dispatch(InboundEvent::text("u1", "view more")).await;

        assert_eq!(h.messenger.texts(), vec!["page 2"]);
        let (_, data) = h.sessions.get_state("u1");
        let cursor = data.cursor(State::ViewBulletin).unwrap();
        assert_eq!(cursor.page, 2);
        assert_eq!(cursor.offset, 3);
    }

    #[tokio::test]
    async fn view_more_without_cursor_falls_to_handler() {
        let h = harness();
        h.sessions
            .set_state("u1", State::ViewBulletin, SessionData::new());
        h.dispatcher.dispatch(InboundEvent::text("u1", "VIEW MORE")).await;
        assert_eq!(h.messenger.texts(), vec!["invalid: VIEW MORE"]);
    }

    #[tokio::test]
    async fn back_enters_predecessor_and_renders_it() {
        let h = harness();
        h.sessions
            .set_state("u1", State::ViewGradesDetail, SessionData::new());

        let outcome = h.dispatcher.dispatch(InboundEvent::text("u1", "back")).await;

        assert_eq!(
            outcome,
            DispatchOutcome::Handled {
                state: State::ViewGrades,
                effects: 1
            }
        );
        assert_eq!(h.messenger.texts(), vec!["GradeYears"]);
    }

    #[tokio::test]
    async fn state_without_handler_falls_back_to_default() {
        let h = harness();
        h.sessions.set_state("u1", State::ViewDtr, SessionData::new());
        h.dispatcher.dispatch(InboundEvent::text("u1", "7")).await;
        assert_eq!(h.navigator.calls.lock().clone(), vec!["default"]);
    }

    #[tokio::test]
    async fn handler_error_is_contained_with_fallback_text() {
        let h = harness();
        let outcome = h
            .dispatcher
            .dispatch(InboundEvent::text("u1", "TALK TO HUMAN"))
            .await;

        assert!(matches!(outcome, DispatchOutcome::Failed { .. }));
        assert_eq!(h.messenger.texts(), vec![FALLBACK_MESSAGE]);
        assert_eq!(h.sessions.get_state("u1").0, State::Initial);
    }

    #[tokio::test]
    async fn delivery_failure_keeps_state_change() {
        let h = harness();
        h.messenger.fail_sends(true);
        let outcome = h.dispatcher.dispatch(InboundEvent::text("u1", "MENU")).await;

        assert!(matches!(outcome, DispatchOutcome::DeliveryFailed { .. }));
        assert_eq!(h.sessions.get_state("u1").0, State::MainMenu);
    }

    #[tokio::test]
    async fn get_started_renders_welcome_and_other_postbacks_are_ignored() {
        let h = harness();
        let outcome = h
            .dispatcher
            .dispatch(InboundEvent::postback("u1", "GET_STARTED"))
            .await;
        assert!(matches!(outcome, DispatchOutcome::Handled { .. }));
        assert_eq!(h.messenger.texts(), vec!["Welcome"]);

        let ignored = h
            .dispatcher
            .dispatch(InboundEvent::postback("u1", "SOMETHING_ELSE"))
            .await;
        assert_eq!(ignored, DispatchOutcome::Ignored);
    }

    #[tokio::test]
    async fn blank_text_is_ignored() {
        let h = harness();
        let outcome = h.dispatcher.dispatch(InboundEvent::text("u1", "   ")).await;
        assert_eq!(outcome, DispatchOutcome::Ignored);
        assert!(h.messenger.sent().is_empty());
    }
}
