use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::Arc;

use super::messages;
use super::replies::{self, UserStatus};
use crate::cache::{Clock, SystemClock};
use crate::conversation::{GlobalCommand, HandlerContext, Navigator, Screen, Transition};
use crate::domain::{StudentProfile, User, UserLink};
use crate::messenger::Messenger;
use crate::repositories::{Period, Repositories};
use crate::sessions::State;

/// Renders every screen of the assistant.
///
/// Each operation reads what it needs from the repositories and returns a
/// [`Transition`]; nothing is sent or stored here. The dispatcher applies the
/// state change and delivers the effects.
pub struct Actions {
    pub(super) repos: Repositories,
    pub(super) messenger: Arc<dyn Messenger>,
    pub(super) timezone: Tz,
    pub(super) clock: Arc<dyn Clock>,
}

/// A user allowed into the menus: active, with a primary link whose student
/// record exists.
pub(super) struct ActiveStudent {
    pub user: User,
    pub link: UserLink,
    pub student: StudentProfile,
}

impl Actions {
    pub fn new(repos: Repositories, messenger: Arc<dyn Messenger>, timezone: Tz) -> Self {
        Self {
            repos,
            messenger,
            timezone,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub(super) async fn user(&self, psid: &str) -> Result<Option<User>> {
        self.repos.users.find_by_psid(psid).await
    }

    pub async fn status(&self, psid: &str) -> Result<UserStatus> {
        let Some(user) = self.user(psid).await? else {
            return Ok(UserStatus::Unregistered);
        };
        if !user.is_active {
            return Ok(UserStatus::Deactivated);
        }
        match self.repos.links.primary_link(user.id).await {
            Ok(Some(_)) => Ok(UserStatus::LinkedPrimary),
            Ok(None) => Ok(UserStatus::Registered),
            Err(e) => {
                tracing::warn!(user = %psid, error = %e, "Primary link lookup failed");
                Ok(UserStatus::Registered)
            }
        }
    }

    /// `text` with the quick replies matching the user's status. Deactivated
    /// users get the deactivation notice instead.
    pub async fn with_status(&self, psid: &str, text: &str) -> Result<Transition> {
        let status = self.status(psid).await?;
        let text = if status == UserStatus::Deactivated {
            messages::ACCOUNT_DEACTIVATED
        } else {
            text
        };
        Ok(Transition::quick_replies(text, replies::for_status(status)))
    }

    pub async fn welcome(&self, psid: &str) -> Result<Transition> {
        self.with_status(psid, messages::WELCOME).await
    }

    /// Resolve the user's active student, or the transition to show instead.
    pub(super) async fn active_student(
        &self,
        psid: &str,
    ) -> Result<std::result::Result<ActiveStudent, Transition>> {
        let Some(user) = self.user(psid).await? else {
            return Ok(Err(self.welcome(psid).await?));
        };
        if !user.is_active {
            return Ok(Err(self.with_status(psid, messages::ACCOUNT_DEACTIVATED).await?));
        }
        let Some(primary) = self.repos.primary_profile(user.id).await? else {
            let notice = self.with_status(psid, messages::NO_ACTIVE_PROFILE).await?;
            return Ok(Err(Transition::enter(State::Initial).then(notice)));
        };
        let Some(student) = primary.student else {
            tracing::warn!(
                user = %psid,
                school = %primary.link.school_id,
                student = %primary.link.student_id,
                "Student record missing for the primary profile"
            );
            return Ok(Err(self.with_status(psid, messages::STUDENT_NOT_FOUND).await?));
        };
        Ok(Ok(ActiveStudent {
            user,
            link: primary.link,
            student,
        }))
    }

    /// Main menu text for the active student. Does not change state.
    pub async fn main_menu(&self, psid: &str) -> Result<Transition> {
        let active = match self.active_student(psid).await? {
            Ok(active) => active,
            Err(denied) => return Ok(denied),
        };
        Ok(Transition::quick_replies(
            messages::main_menu(&active.student),
            replies::main_menu(),
        ))
    }

    pub async fn enter_main_menu(&self, psid: &str) -> Result<Transition> {
        Ok(Transition::enter(State::MainMenu).then(self.main_menu(psid).await?))
    }

    /// Default handler for input that matched nothing.
    pub async fn fallback(&self, psid: &str) -> Result<Transition> {
        let Some(user) = self.user(psid).await? else {
            return self.welcome(psid).await;
        };
        if !user.is_active {
            return Ok(Transition::quick_replies(
                messages::ACCOUNT_DEACTIVATED,
                replies::for_status(UserStatus::Deactivated),
            ));
        }
        if self.repos.links.primary_link(user.id).await?.is_some() {
            return self.enter_main_menu(psid).await;
        }
        Ok(Transition::text(messages::NOT_UNDERSTOOD)
            .then(self.with_status(psid, messages::HOW_CAN_I_HELP).await?))
    }

    pub(super) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(super) fn local_now(&self) -> DateTime<Tz> {
        self.now().with_timezone(&self.timezone)
    }

    /// The current calendar month in the configured timezone.
    pub fn current_month(&self) -> Result<Period> {
        let now = self.local_now();
        let (next_year, next_month) = if now.month() == 12 {
            (now.year() + 1, 1)
        } else {
            (now.year(), now.month() + 1)
        };
        Ok(Period {
            start: self.local_midnight(now.year(), now.month())?,
            end: self.local_midnight(next_year, next_month)?,
        })
    }

    /// The current calendar year in the configured timezone.
    pub fn current_year(&self) -> Result<Period> {
        let year = self.local_now().year();
        Ok(Period {
            start: self.local_midnight(year, 1)?,
            end: self.local_midnight(year + 1, 1)?,
        })
    }

    fn local_midnight(&self, year: i32, month: u32) -> Result<DateTime<Utc>> {
        self.timezone
            .with_ymd_and_hms(year, month, 1, 0, 0, 0)
            .earliest()
            .map(|at| at.with_timezone(&Utc))
            .ok_or_else(|| {
                anyhow!(
                    "no local midnight for {year}-{month:02}-01 in {}",
                    self.timezone
                )
            })
    }
}

#[async_trait]
impl Navigator for Actions {
    async fn global(
        &self,
        ctx: &HandlerContext,
        command: Option<GlobalCommand>,
    ) -> Result<Transition> {
        let psid = ctx.user_id.as_str();
        match command {
            Some(GlobalCommand::Register) => self.register(psid).await,
            Some(GlobalCommand::Menu) => self.enter_main_menu(psid).await,
            Some(GlobalCommand::MySaId) => self.account_code(psid).await,
            Some(GlobalCommand::ViewProfile) => self.view_profile(psid).await,
            Some(GlobalCommand::SwitchProfile) => self.switch_profile(psid).await,
            Some(GlobalCommand::Continue) => self.continue_profile(psid).await,
            Some(GlobalCommand::No) => self.with_status(psid, messages::DECLINED).await,
            Some(GlobalCommand::AboutUs) => self.with_status(psid, messages::ABOUT_US).await,
            Some(GlobalCommand::TalkToHuman) => {
                self.with_status(psid, messages::TALK_TO_HUMAN).await
            }
            None => self.fallback(psid).await,
        }
    }

    async fn render(&self, ctx: &HandlerContext, screen: Screen) -> Result<Transition> {
        let psid = ctx.user_id.as_str();
        match screen {
            Screen::Welcome => self.welcome(psid).await,
            Screen::ProfileOverview => self.view_profile(psid).await,
            Screen::MainMenu => self.main_menu(psid).await,
            Screen::GradeYears => self.grade_years(psid).await,
            Screen::ProfileMenu => self.profile_menu(psid).await,
        }
    }
}
