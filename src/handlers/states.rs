//! One `StateHandler` per conversation phase. Each resolves the user's input
//! against the session data of its state and delegates to [`Actions`].

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use super::actions::Actions;
use super::messages;
use super::replies;
use crate::conversation::{HandlerContext, Input, StateHandler, Transition};
use crate::sessions::{SessionData, State};

fn invalid(text: &str) -> Transition {
    Transition::quick_replies(text, replies::back())
}

/// Picks a profile from the list shown by VIEW PROFILE or SWITCH PROFILE.
pub struct ProfileSelectionHandler {
    actions: Arc<Actions>,
}

impl ProfileSelectionHandler {
    pub fn new(actions: Arc<Actions>) -> Self {
        Self { actions }
    }
}

#[async_trait]
impl StateHandler for ProfileSelectionHandler {
    fn states(&self) -> &[State] {
        &[State::ProfileView, State::ProfileSwitch]
    }

    async fn handle(
        &self,
        ctx: &HandlerContext,
        input: &Input,
        data: &SessionData,
    ) -> Result<Transition> {
        let Some(profiles) = data.profile_map(ctx.state) else {
            return Ok(Transition::enter(State::Initial)
                .then(self.actions.welcome(&ctx.user_id).await?));
        };
        match profiles.resolve(&input.normalized) {
            Some(target) => self.actions.select_profile(&ctx.user_id, target).await,
            None => Ok(invalid(messages::INVALID_SELECTION)),
        }
    }

    fn name(&self) -> &str {
        "profile_selection"
    }
}

pub struct MainMenuHandler {
    actions: Arc<Actions>,
}

impl MainMenuHandler {
    pub fn new(actions: Arc<Actions>) -> Self {
        Self { actions }
    }
}

#[async_trait]
impl StateHandler for MainMenuHandler {
    fn states(&self) -> &[State] {
        &[State::MainMenu]
    }

    async fn handle(
        &self,
        ctx: &HandlerContext,
        input: &Input,
        _data: &SessionData,
    ) -> Result<Transition> {
        let psid = ctx.user_id.as_str();
        match input.normalized.as_str() {
            "1" => self.actions.grade_years(psid).await,
            "2" => self.actions.payables(psid).await,
            "3" => self.actions.bulletin_page(psid, 1).await,
            "4" => self.actions.attendance_page(psid, 1).await,
            "5" => self.actions.profile_menu(psid).await,
            "6" => self.actions.ask_support(psid).await,
            _ => Ok(invalid(messages::INVALID_MENU_OPTION)),
        }
    }

    fn name(&self) -> &str {
        "main_menu"
    }
}

/// School-year chooser for grades, and the per-year detail screen.
pub struct GradesHandler {
    actions: Arc<Actions>,
}

impl GradesHandler {
    pub fn new(actions: Arc<Actions>) -> Self {
        Self { actions }
    }
}

#[async_trait]
impl StateHandler for GradesHandler {
    fn states(&self) -> &[State] {
        &[State::ViewGrades, State::ViewGradesDetail]
    }

    async fn handle(
        &self,
        ctx: &HandlerContext,
        input: &Input,
        data: &SessionData,
    ) -> Result<Transition> {
        if ctx.state == State::ViewGradesDetail {
            return Ok(invalid(messages::INVALID_GRADES_DETAIL));
        }
        let Some(years) = data.school_years(ctx.state) else {
            return self.actions.enter_main_menu(&ctx.user_id).await;
        };
        match years.resolve(&input.normalized) {
            Some(year) => self.actions.grades_for_year(&ctx.user_id, year).await,
            None => Ok(invalid(messages::INVALID_SCHOOL_YEAR)),
        }
    }

    fn name(&self) -> &str {
        "grades"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listing {
    Bulletin,
    Attendance,
}

/// Paginated list screens. Only `VIEW MORE` with a cursor moves forward;
/// anything else repeats the options.
pub struct ListingHandler {
    actions: Arc<Actions>,
    listing: Listing,
}

impl ListingHandler {
    pub fn new(actions: Arc<Actions>, listing: Listing) -> Self {
        Self { actions, listing }
    }
}

#[async_trait]
impl StateHandler for ListingHandler {
    fn states(&self) -> &[State] {
        match self.listing {
            Listing::Bulletin => &[State::ViewBulletin],
            Listing::Attendance => &[State::ViewDtr],
        }
    }

    async fn handle(
        &self,
        _ctx: &HandlerContext,
        _input: &Input,
        _data: &SessionData,
    ) -> Result<Transition> {
        Ok(Transition::quick_replies(
            messages::INVALID_LIST,
            replies::view_more(),
        ))
    }

    async fn page(&self, ctx: &HandlerContext, page: usize) -> Result<Option<Transition>> {
        let transition = match self.listing {
            Listing::Bulletin => self.actions.bulletin_page(&ctx.user_id, page).await?,
            Listing::Attendance => self.actions.attendance_page(&ctx.user_id, page).await?,
        };
        Ok(Some(transition))
    }

    fn name(&self) -> &str {
        match self.listing {
            Listing::Bulletin => "bulletin",
            Listing::Attendance => "attendance",
        }
    }
}

pub struct PayablesHandler {
    actions: Arc<Actions>,
}

impl PayablesHandler {
    pub fn new(actions: Arc<Actions>) -> Self {
        Self { actions }
    }
}

#[async_trait]
impl StateHandler for PayablesHandler {
    fn states(&self) -> &[State] {
        &[State::ViewPayables]
    }

    async fn handle(
        &self,
        ctx: &HandlerContext,
        input: &Input,
        _data: &SessionData,
    ) -> Result<Transition> {
        if input.is(replies::PAYMENT_LOGS) {
            return self.actions.payment_logs(&ctx.user_id).await;
        }
        Ok(Transition::quick_replies(
            messages::INVALID_PAYABLES,
            replies::payments(),
        ))
    }

    fn name(&self) -> &str {
        "payables"
    }
}

/// Profile details menu and the switch confirmation behind it.
pub struct ProfileMenuHandler {
    actions: Arc<Actions>,
}

impl ProfileMenuHandler {
    pub fn new(actions: Arc<Actions>) -> Self {
        Self { actions }
    }
}

#[async_trait]
impl StateHandler for ProfileMenuHandler {
    fn states(&self) -> &[State] {
        &[State::ProfileMenu, State::ConfirmProfileSwitch]
    }

    async fn handle(
        &self,
        ctx: &HandlerContext,
        input: &Input,
        _data: &SessionData,
    ) -> Result<Transition> {
        let psid = ctx.user_id.as_str();
        if ctx.state == State::ConfirmProfileSwitch {
            if input.is(replies::PROCEED) {
                return self.actions.switch_profile(psid).await;
            }
            return Ok(Transition::quick_replies(
                messages::INVALID_CONFIRM_SWITCH,
                replies::confirm_switch(),
            ));
        }
        match input.normalized.as_str() {
            "1" => self.actions.subject_years(psid).await,
            "2" => Ok(self.actions.confirm_switch()),
            _ => Ok(invalid(messages::INVALID_PROFILE_OPTION)),
        }
    }

    fn name(&self) -> &str {
        "profile_menu"
    }
}

pub struct SubjectsHandler {
    actions: Arc<Actions>,
}

impl SubjectsHandler {
    pub fn new(actions: Arc<Actions>) -> Self {
        Self { actions }
    }
}

#[async_trait]
impl StateHandler for SubjectsHandler {
    fn states(&self) -> &[State] {
        &[State::SelectSubject, State::ViewSubjects]
    }

    async fn handle(
        &self,
        ctx: &HandlerContext,
        input: &Input,
        data: &SessionData,
    ) -> Result<Transition> {
        let Some(years) = data.school_years(ctx.state) else {
            return self.actions.profile_menu(&ctx.user_id).await;
        };
        match years.resolve(&input.normalized) {
            Some(year) => self.actions.subjects_for_year(&ctx.user_id, year).await,
            None => Ok(invalid(messages::INVALID_SCHOOL_YEAR)),
        }
    }

    fn name(&self) -> &str {
        "subjects"
    }
}

/// Inquiry entry, ticket list and ticket selection.
pub struct SupportHandler {
    actions: Arc<Actions>,
}

impl SupportHandler {
    pub fn new(actions: Arc<Actions>) -> Self {
        Self { actions }
    }
}

#[async_trait]
impl StateHandler for SupportHandler {
    fn states(&self) -> &[State] {
        &[
            State::AskSupport,
            State::ViewTickets,
            State::SelectSupportTicket,
        ]
    }

    async fn handle(
        &self,
        ctx: &HandlerContext,
        input: &Input,
        data: &SessionData,
    ) -> Result<Transition> {
        let psid = ctx.user_id.as_str();
        match ctx.state {
            State::AskSupport if input.is(replies::VIEW_TICKETS) => {
                self.actions.ticket_list(psid).await
            }
            State::AskSupport => {
                self.actions
                    .submit_support_message(psid, &input.raw, data.thread_id(ctx.state))
                    .await
            }
            State::SelectSupportTicket => {
                let Some(tickets) = data.tickets(ctx.state) else {
                    return self.actions.enter_main_menu(psid).await;
                };
                match tickets.resolve(&input.normalized) {
                    Some(thread_id) => self.actions.ticket_detail(psid, thread_id).await,
                    None => Ok(invalid(messages::INVALID_TICKET)),
                }
            }
            _ => self.actions.ticket_list(psid).await,
        }
    }

    fn name(&self) -> &str {
        "support"
    }
}

/// Every state handler, ready to register with the dispatcher.
pub fn state_handlers(actions: &Arc<Actions>) -> Vec<Arc<dyn StateHandler>> {
    vec![
        Arc::new(ProfileSelectionHandler::new(actions.clone())),
        Arc::new(MainMenuHandler::new(actions.clone())),
        Arc::new(GradesHandler::new(actions.clone())),
        Arc::new(ListingHandler::new(actions.clone(), Listing::Bulletin)),
        Arc::new(ListingHandler::new(actions.clone(), Listing::Attendance)),
        Arc::new(PayablesHandler::new(actions.clone())),
        Arc::new(ProfileMenuHandler::new(actions.clone())),
        Arc::new(SubjectsHandler::new(actions.clone())),
        Arc::new(SupportHandler::new(actions.clone())),
    ]
}
