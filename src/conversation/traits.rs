use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::commands::GlobalCommand;
use crate::messenger::QuickReply;
use crate::sessions::{SessionData, State};

/// Postback payload sent by the "Get Started" button.
pub const GET_STARTED_PAYLOAD: &str = "GET_STARTED";

/// One inbound webhook messaging event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub user_id: String,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Typed text, or a quick-reply tap carrying its payload.
    Text {
        raw: String,
        quick_reply: Option<String>,
    },
    Postback { payload: String },
}

impl InboundEvent {
    pub fn text(user_id: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            kind: EventKind::Text {
                raw: raw.into(),
                quick_reply: None,
            },
        }
    }

    pub fn quick_reply(
        user_id: impl Into<String>,
        raw: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            kind: EventKind::Text {
                raw: raw.into(),
                quick_reply: Some(payload.into()),
            },
        }
    }

    pub fn postback(user_id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            kind: EventKind::Postback {
                payload: payload.into(),
            },
        }
    }
}

/// User input as seen by handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    /// Trimmed and uppercased; used for literal matching.
    pub normalized: String,
    /// Original text, trimmed. Free-form messages are stored with this casing.
    pub raw: String,
}

impl Input {
    pub fn new(raw: &str) -> Self {
        let raw = raw.trim();
        Self {
            normalized: raw.to_uppercase(),
            raw: raw.to_string(),
        }
    }

    pub fn is(&self, literal: &str) -> bool {
        self.normalized == literal
    }
}

/// Observable outbound output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    SendText { text: String },
    SendQuickReplies { text: String, replies: Vec<QuickReply> },
}

impl Effect {
    pub fn text(&self) -> &str {
        match self {
            Self::SendText { text } | Self::SendQuickReplies { text, .. } => text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub state: State,
    pub delta: SessionData,
}

/// What a handler decided: effects to deliver and an optional state change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transition {
    pub effects: Vec<Effect>,
    pub next: Option<StateChange>,
}

impl Transition {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::none().with_text(text)
    }

    pub fn quick_replies(text: impl Into<String>, replies: Vec<QuickReply>) -> Self {
        Self::none().with_quick_replies(text, replies)
    }

    pub fn enter(state: State) -> Self {
        Self::enter_with(state, SessionData::new())
    }

    pub fn enter_with(state: State, delta: SessionData) -> Self {
        Self {
            effects: Vec::new(),
            next: Some(StateChange { state, delta }),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.effects.push(Effect::SendText { text: text.into() });
        self
    }

    pub fn with_quick_replies(mut self, text: impl Into<String>, replies: Vec<QuickReply>) -> Self {
        self.effects.push(Effect::SendQuickReplies {
            text: text.into(),
            replies,
        });
        self
    }

    /// Sequence `self` then `later`: effects concatenate, the later state
    /// wins and data deltas merge in order.
    pub fn then(mut self, later: Transition) -> Self {
        self.effects.extend(later.effects);
        self.next = match (self.next, later.next) {
            (Some(mut first), Some(second)) => {
                first.delta.merge(second.delta);
                Some(StateChange {
                    state: second.state,
                    delta: first.delta,
                })
            }
            (first, None) => first,
            (None, second) => second,
        };
        self
    }

    pub fn next_state(&self) -> Option<State> {
        self.next.as_ref().map(|n| n.state)
    }
}

/// Screens re-rendered when navigating back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Welcome,
    ProfileOverview,
    MainMenu,
    GradeYears,
    ProfileMenu,
}

impl Screen {
    /// Screen shown after `BACK` from `state`.
    pub fn back_from(state: State) -> Screen {
        match state {
            State::ProfileView | State::Initial => Screen::Welcome,
            State::ProfileSwitch => Screen::ProfileOverview,
            _ => match state.back_target() {
                State::ViewGrades => Screen::GradeYears,
                State::ProfileMenu => Screen::ProfileMenu,
                _ => Screen::MainMenu,
            },
        }
    }
}

/// Identity of the conversation being handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerContext {
    pub user_id: String,
    pub state: State,
}

/// Handles input received while a session is in one of `states()`.
#[async_trait]
pub trait StateHandler: Send + Sync {
    fn states(&self) -> &[State];

    async fn handle(
        &self,
        ctx: &HandlerContext,
        input: &Input,
        data: &SessionData,
    ) -> Result<Transition>;

    /// Render page `page` of a paginated list; `None` when not paginated.
    async fn page(&self, _ctx: &HandlerContext, _page: usize) -> Result<Option<Transition>> {
        Ok(None)
    }

    fn name(&self) -> &str;
}

/// Global command table plus the screens the dispatcher renders itself.
#[async_trait]
pub trait Navigator: Send + Sync {
    /// Run a global command; `None` runs the default handler.
    async fn global(&self, ctx: &HandlerContext, command: Option<GlobalCommand>)
        -> Result<Transition>;

    async fn render(&self, ctx: &HandlerContext, screen: Screen) -> Result<Transition>;
}

/// Result of dispatching one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled { state: State, effects: usize },
    Ignored,
    /// The handler failed; a fallback message was attempted.
    Failed { error: String },
    /// Effects could not be delivered; the state change was already applied.
    DeliveryFailed { error: String },
}

#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, event: InboundEvent) -> DispatchOutcome;
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::paginate;

    #[test]
    fn input_normalizes_but_keeps_raw() {
        let input = Input::new("  view more \n");
        assert_eq!(input.normalized, "VIEW MORE");
        assert_eq!(input.raw, "view more");
        assert!(input.is("VIEW MORE"));
    }

    #[test]
    fn then_concatenates_effects_and_later_state_wins() {
        let first = Transition::enter_with(
            State::ViewBulletin,
            SessionData::new().with_cursor(State::ViewBulletin, paginate(7, 3, 1).cursor(3)),
        )
        .with_text("a");
        let second = Transition::enter(State::MainMenu).with_text("b");

        let combined = first.then(second);
        let texts: Vec<&str> = combined.effects.iter().map(Effect::text).collect();
        assert_eq!(texts, vec!["a", "b"]);
        assert_eq!(combined.next_state(), Some(State::MainMenu));
        assert_eq!(combined.next.map(|n| n.delta.len()), Some(6));
    }

    #[test]
    fn then_keeps_earlier_state_when_later_has_none() {
        let combined = Transition::enter(State::MainMenu).then(Transition::text("menu"));
        assert_eq!(combined.next_state(), Some(State::MainMenu));
        assert_eq!(combined.effects.len(), 1);
    }

    #[test]
    fn back_screens_follow_back_targets() {
        assert_eq!(Screen::back_from(State::ProfileView), Screen::Welcome);
        assert_eq!(Screen::back_from(State::ProfileSwitch), Screen::ProfileOverview);
        assert_eq!(Screen::back_from(State::ViewGradesDetail), Screen::GradeYears);
        assert_eq!(Screen::back_from(State::SelectSubject), Screen::ProfileMenu);
        assert_eq!(Screen::back_from(State::ViewTickets), Screen::MainMenu);
        assert_eq!(Screen::back_from(State::MainMenu), Screen::MainMenu);
    }
}
