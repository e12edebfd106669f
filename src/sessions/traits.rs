//! Conversation session types and the store contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

use crate::pagination::PaginationCursor;

/// Phase of a user's multi-turn conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum State {
    #[default]
    Initial,
    MainMenu,
    ProfileView,
    ProfileSwitch,
    ConfirmProfileSwitch,
    ViewGrades,
    ViewGradesDetail,
    ViewBulletin,
    ViewDtr,
    ViewPayables,
    ProfileMenu,
    ViewSubjects,
    SelectSubject,
    AskSupport,
    ViewTickets,
    SelectSupportTicket,
}

impl State {
    pub const ALL: [State; 16] = [
        State::Initial,
        State::MainMenu,
        State::ProfileView,
        State::ProfileSwitch,
        State::ConfirmProfileSwitch,
        State::ViewGrades,
        State::ViewGradesDetail,
        State::ViewBulletin,
        State::ViewDtr,
        State::ViewPayables,
        State::ProfileMenu,
        State::ViewSubjects,
        State::SelectSubject,
        State::AskSupport,
        State::ViewTickets,
        State::SelectSupportTicket,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::MainMenu => "main_menu",
            Self::ProfileView => "profile_view",
            Self::ProfileSwitch => "profile_switch",
            Self::ConfirmProfileSwitch => "confirm_profile_switch",
            Self::ViewGrades => "view_grades",
            Self::ViewGradesDetail => "view_grades_detail",
            Self::ViewBulletin => "view_bulletin",
            Self::ViewDtr => "view_dtr",
            Self::ViewPayables => "view_payables",
            Self::ProfileMenu => "profile_menu",
            Self::ViewSubjects => "view_subjects",
            Self::SelectSubject => "select_subject",
            Self::AskSupport => "ask_support",
            Self::ViewTickets => "view_tickets",
            Self::SelectSupportTicket => "select_support_ticket",
        }
    }

    /// State entered when the user sends `BACK` from this one.
    pub fn back_target(self) -> State {
        match self {
            Self::Initial | Self::ProfileView | Self::ProfileSwitch => Self::Initial,
            Self::ViewGradesDetail => Self::ViewGrades,
            Self::ConfirmProfileSwitch | Self::ViewSubjects | Self::SelectSubject => {
                Self::ProfileMenu
            }
            Self::MainMenu
            | Self::ViewGrades
            | Self::ViewBulletin
            | Self::ViewDtr
            | Self::ViewPayables
            | Self::ProfileMenu
            | Self::AskSupport
            | Self::ViewTickets
            | Self::SelectSupportTicket => Self::MainMenu,
        }
    }

    /// States that render a paginated list and accept `VIEW MORE`.
    pub fn is_paginated(self) -> bool {
        matches!(self, Self::ViewBulletin | Self::ViewDtr)
    }

    /// The flow whose session data this state may read.
    pub fn flow(self) -> Flow {
        match self {
            Self::Initial => Flow::Initial,
            Self::MainMenu => Flow::MainMenu,
            Self::ProfileView => Flow::Profiles,
            Self::ProfileSwitch => Flow::ProfileSwitch,
            Self::ViewGrades | Self::ViewGradesDetail => Flow::Grades,
            Self::ViewBulletin => Flow::Bulletin,
            Self::ViewDtr => Flow::Attendance,
            Self::ViewPayables => Flow::Payables,
            Self::ProfileMenu | Self::ConfirmProfileSwitch => Flow::ProfileMenu,
            Self::ViewSubjects | Self::SelectSubject => Flow::Subjects,
            Self::AskSupport | Self::ViewTickets | Self::SelectSupportTicket => Flow::Support,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Group of states sharing selection and pagination data.
///
/// Every stored value is stamped with the flow that wrote it; a reader in a
/// different flow sees the value as absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Flow {
    Initial,
    MainMenu,
    Profiles,
    ProfileSwitch,
    Grades,
    Bulletin,
    Attendance,
    Payables,
    ProfileMenu,
    Subjects,
    Support,
}

/// Keys of the per-session data map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataKey {
    ProfileMap,
    SchoolYearMap,
    TicketMap,
    ThreadId,
    PageOffset,
    PaginationItems,
    PaginationTotal,
    PaginationPage,
    PaginationSize,
    PaginationPages,
}

/// Student/school pair targeted by a profile selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileTarget {
    pub student_id: String,
    pub school_id: String,
}

/// Numbered list choice ("1", "2", ...) mapped to its target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionMap<T> {
    options: BTreeMap<String, T>,
}

impl<T> SelectionMap<T> {
    /// Number `items` from 1 in iteration order.
    pub fn numbered(items: impl IntoIterator<Item = T>) -> Self {
        let options = items
            .into_iter()
            .enumerate()
            .map(|(i, item)| ((i + 1).to_string(), item))
            .collect();
        Self { options }
    }

    /// Target for the raw choice text, if it is one of the offered numbers.
    pub fn resolve(&self, choice: &str) -> Option<&T> {
        self.options.get(choice.trim())
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

/// Tagged session payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionValue {
    Profiles(SelectionMap<ProfileTarget>),
    SchoolYears(SelectionMap<String>),
    Tickets(SelectionMap<String>),
    Text(String),
    Count(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEntry {
    pub flow: Flow,
    pub value: SessionValue,
}

/// Structured per-session data.
///
/// Writers stamp values with the state they render; readers pass their own
/// state and get `None` for anything written by another flow or stored
/// under an unexpected variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    entries: HashMap<DataKey, SessionEntry>,
}

impl SessionData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: DataKey, state: State, value: SessionValue) {
        self.entries.insert(
            key,
            SessionEntry {
                flow: state.flow(),
                value,
            },
        );
    }

    /// Last-write-wins per key; keys absent from `delta` are kept.
    pub fn merge(&mut self, delta: SessionData) {
        self.entries.extend(delta.entries);
    }

    pub fn get(&self, key: DataKey) -> Option<&SessionEntry> {
        self.entries.get(&key)
    }

    pub fn contains_key(&self, key: DataKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn scoped(&self, key: DataKey, state: State) -> Option<&SessionValue> {
        self.entries
            .get(&key)
            .filter(|entry| entry.flow == state.flow())
            .map(|entry| &entry.value)
    }

    fn count(&self, key: DataKey, state: State) -> Option<usize> {
        match self.scoped(key, state)? {
            SessionValue::Count(n) => Some(*n),
            _ => None,
        }
    }

    // ── Builders ──────────────────────────────────────────────

    pub fn with_profile_map(mut self, state: State, map: SelectionMap<ProfileTarget>) -> Self {
        self.insert(DataKey::ProfileMap, state, SessionValue::Profiles(map));
        self
    }

    pub fn with_school_years(mut self, state: State, map: SelectionMap<String>) -> Self {
        self.insert(DataKey::SchoolYearMap, state, SessionValue::SchoolYears(map));
        self
    }

    pub fn with_tickets(mut self, state: State, map: SelectionMap<String>) -> Self {
        self.insert(DataKey::TicketMap, state, SessionValue::Tickets(map));
        self
    }

    pub fn with_thread_id(mut self, state: State, thread_id: impl Into<String>) -> Self {
        self.insert(DataKey::ThreadId, state, SessionValue::Text(thread_id.into()));
        self
    }

    pub fn with_cursor(mut self, state: State, cursor: PaginationCursor) -> Self {
        for (key, value) in [
            (DataKey::PageOffset, cursor.offset),
            (DataKey::PaginationItems, cursor.items),
            (DataKey::PaginationTotal, cursor.total),
            (DataKey::PaginationPage, cursor.page),
            (DataKey::PaginationSize, cursor.page_size),
            (DataKey::PaginationPages, cursor.total_pages),
        ] {
            self.insert(key, state, SessionValue::Count(value));
        }
        self
    }

    // ── Typed readers ─────────────────────────────────────────

    pub fn profile_map(&self, state: State) -> Option<&SelectionMap<ProfileTarget>> {
        match self.scoped(DataKey::ProfileMap, state)? {
            SessionValue::Profiles(map) => Some(map),
            _ => None,
        }
    }

    pub fn school_years(&self, state: State) -> Option<&SelectionMap<String>> {
        match self.scoped(DataKey::SchoolYearMap, state)? {
            SessionValue::SchoolYears(map) => Some(map),
            _ => None,
        }
    }

    pub fn tickets(&self, state: State) -> Option<&SelectionMap<String>> {
        match self.scoped(DataKey::TicketMap, state)? {
            SessionValue::Tickets(map) => Some(map),
            _ => None,
        }
    }

    pub fn thread_id(&self, state: State) -> Option<&str> {
        match self.scoped(DataKey::ThreadId, state)? {
            SessionValue::Text(id) if !id.is_empty() => Some(id.as_str()),
            _ => None,
        }
    }

    /// Complete cursor, or `None` if any field is missing or foreign.
    pub fn cursor(&self, state: State) -> Option<PaginationCursor> {
        Some(PaginationCursor {
            offset: self.count(DataKey::PageOffset, state)?,
            items: self.count(DataKey::PaginationItems, state)?,
            total: self.count(DataKey::PaginationTotal, state)?,
            page: self.count(DataKey::PaginationPage, state)?,
            page_size: self.count(DataKey::PaginationSize, state)?,
            total_pages: self.count(DataKey::PaginationPages, state)?,
        })
    }
}

/// One user's conversational context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub state: State,
    pub data: SessionData,
    pub last_active: DateTime<Utc>,
}

/// Process-wide table of conversation sessions.
pub trait SessionStore: Send + Sync {
    /// Create the session if needed, overwrite its state, merge `delta` into
    /// its data and refresh its activity timestamp.
    fn set_state(&self, user_id: &str, state: State, delta: SessionData);

    /// Current state and a copy of the data; `(Initial, empty)` when unknown.
    fn get_state(&self, user_id: &str) -> (State, SessionData);

    fn clear_state(&self, user_id: &str);

    /// Drop sessions idle for longer than `timeout`. Returns how many were removed.
    fn cleanup_inactive(&self, timeout: Duration) -> usize;

    fn len(&self) -> usize;

    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor(page: usize) -> PaginationCursor {
        PaginationCursor {
            offset: (page - 1) * 3,
            items: 3,
            total: 7,
            page,
            page_size: 3,
            total_pages: 3,
        }
    }

    #[test]
    fn merge_is_last_write_wins_per_key() {
        let mut data = SessionData::new()
            .with_thread_id(State::AskSupport, "t-1")
            .with_school_years(
                State::ViewGrades,
                SelectionMap::numbered(["2024-2025".to_string()]),
            );

        data.merge(SessionData::new().with_thread_id(State::AskSupport, "t-2"));

        assert_eq!(data.thread_id(State::AskSupport), Some("t-2"));
        assert!(data.school_years(State::ViewGrades).is_some());
    }

    #[test]
    fn sequential_deltas_compose_in_order() {
        let d1 = SessionData::new()
            .with_thread_id(State::AskSupport, "a")
            .with_cursor(State::ViewBulletin, cursor(1));
        let d2 = SessionData::new().with_cursor(State::ViewBulletin, cursor(2));

        let mut data = SessionData::new();
        data.merge(d1);
        data.merge(d2);

        assert_eq!(data.thread_id(State::AskSupport), Some("a"));
        assert_eq!(data.cursor(State::ViewBulletin).map(|c| c.page), Some(2));
    }

    #[test]
    fn readers_ignore_data_from_another_flow() {
        let data = SessionData::new()
            .with_cursor(State::ViewBulletin, cursor(1))
            .with_school_years(State::SelectSubject, SelectionMap::numbered(["2024".to_string()]));

        assert!(data.cursor(State::ViewBulletin).is_some());
        assert!(data.cursor(State::ViewDtr).is_none());
        assert!(data.cursor(State::MainMenu).is_none());

        // SelectSubject and ViewSubjects share the subjects flow; grades does not.
        assert!(data.school_years(State::ViewSubjects).is_some());
        assert!(data.school_years(State::ViewGrades).is_none());
    }

    #[test]
    fn wrong_variant_reads_as_absent() {
        let mut data = SessionData::new();
        data.insert(
            DataKey::TicketMap,
            State::SelectSupportTicket,
            SessionValue::Text("not a map".to_string()),
        );
        assert!(data.tickets(State::SelectSupportTicket).is_none());
    }

    #[test]
    fn partial_cursor_reads_as_absent() {
        let mut data = SessionData::new();
        data.insert(DataKey::PaginationPage, State::ViewDtr, SessionValue::Count(2));
        assert!(data.cursor(State::ViewDtr).is_none());
    }

    #[test]
    fn selection_map_numbers_from_one() {
        let map = SelectionMap::numbered(["x".to_string(), "y".to_string()]);
        assert_eq!(map.resolve("1").map(String::as_str), Some("x"));
        assert_eq!(map.resolve(" 2 ").map(String::as_str), Some("y"));
        assert!(map.resolve("0").is_none());
        assert!(map.resolve("3").is_none());
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn back_targets_match_navigation_tree() {
        assert_eq!(State::ViewGrades.back_target(), State::MainMenu);
        assert_eq!(State::SelectSupportTicket.back_target(), State::MainMenu);
        assert_eq!(State::ViewGradesDetail.back_target(), State::ViewGrades);
        assert_eq!(State::ConfirmProfileSwitch.back_target(), State::ProfileMenu);
        assert_eq!(State::SelectSubject.back_target(), State::ProfileMenu);
        assert_eq!(State::ProfileSwitch.back_target(), State::Initial);
        assert_eq!(State::MainMenu.back_target(), State::MainMenu);
    }

    #[test]
    fn only_list_states_paginate() {
        let paginated: Vec<State> = State::ALL
            .iter()
            .copied()
            .filter(|s| s.is_paginated())
            .collect();
        assert_eq!(paginated, vec![State::ViewBulletin, State::ViewDtr]);
    }
}
