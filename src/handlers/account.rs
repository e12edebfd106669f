//! Registration, account code and linked-profile flows.

use anyhow::{bail, Result};
use std::fmt::Write;

use super::actions::Actions;
use super::messages;
use super::replies;
use crate::conversation::Transition;
use crate::domain::{LinkedProfile, NewUser, User};
use crate::sessions::{ProfileTarget, SelectionMap, SessionData, State};
use crate::util::{random_account_code, ACCOUNT_CODE_ATTEMPTS};

const DEFAULT_FB_NAME: &str = "USER";

impl Actions {
    pub async fn register(&self, psid: &str) -> Result<Transition> {
        let user = match self.register_user(psid).await {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!(user = %psid, error = %e, "Registration failed");
                return Ok(Transition::text(messages::REGISTRATION_FAILED));
            }
        };
        let Some(code) = user.code.as_deref() else {
            tracing::warn!(user = %psid, "Registered user has no account code");
            return Ok(Transition::text(messages::REGISTRATION_FAILED));
        };

        tracing::info!(user = %psid, user_id = user.id, "User registered");
        Ok(Transition::text(messages::REGISTERED)
            .then(self.with_status(psid, &messages::link_instructions(code)).await?))
    }

    /// Existing users are returned as-is (reactivated when inactive); new
    /// users get a unique account code.
    async fn register_user(&self, psid: &str) -> Result<User> {
        if let Some(existing) = self.user(psid).await? {
            if existing.is_active {
                return Ok(existing);
            }
            return match self.repos.users.reactivate(psid).await? {
                Some(user) => Ok(user),
                None => bail!("user {psid} disappeared during reactivation"),
            };
        }

        let code = self.unique_account_code().await?;
        let fb_name = match self.messenger.user_profile(psid).await {
            Ok(profile) if !profile.name.trim().is_empty() => profile.name,
            Ok(_) => DEFAULT_FB_NAME.to_string(),
            Err(e) => {
                tracing::debug!(
                    user = %psid,
                    error = %e,
                    "Profile lookup failed; using default name"
                );
                DEFAULT_FB_NAME.to_string()
            }
        };

        self.repos
            .users
            .create(NewUser {
                psid: psid.to_string(),
                fb_name,
                code,
            })
            .await
    }

    async fn unique_account_code(&self) -> Result<String> {
        for _ in 0..ACCOUNT_CODE_ATTEMPTS {
            let code = {
                let mut rng = rand::thread_rng();
                random_account_code(&mut rng)
            };
            if !self.repos.users.code_exists(&code).await? {
                return Ok(code);
            }
        }
        bail!("failed to generate a unique account code after {ACCOUNT_CODE_ATTEMPTS} attempts")
    }

    pub async fn account_code(&self, psid: &str) -> Result<Transition> {
        let Some(user) = self.user(psid).await? else {
            return self.welcome(psid).await;
        };
        if !user.is_active {
            return self.with_status(psid, messages::ACCOUNT_DEACTIVATED).await;
        }
        let Some(code) = user.code.as_deref() else {
            return self.welcome(psid).await;
        };
        Ok(Transition::text(messages::ACCOUNT_CODE_HEADER)
            .then(self.with_status(psid, code).await?))
    }

    pub async fn view_profile(&self, psid: &str) -> Result<Transition> {
        let Some(user) = self.user(psid).await? else {
            return self.welcome(psid).await;
        };
        if !user.is_active {
            return self.with_status(psid, messages::ACCOUNT_DEACTIVATED).await;
        }

        let profiles = self.repos.linked_profiles(user.id).await?;
        if profiles.is_empty() {
            let code = user.code.as_deref().unwrap_or_default();
            return Ok(Transition::text(messages::NO_LINKED_ACCOUNTS)
                .then(self.with_status(psid, &messages::link_instructions(code)).await?));
        }

        if let [only] = profiles.as_slice() {
            if let (false, Some(student)) = (only.link.is_primary, only.student.as_ref()) {
                return Ok(Transition::quick_replies(
                    messages::single_profile_confirmation(student),
                    replies::profile_confirmation(),
                ));
            }
        }

        let primary = profiles
            .iter()
            .find(|p| p.link.is_primary)
            .and_then(|p| p.student.as_ref());
        if let Some(student) = primary {
            let options = if profiles.len() > 1 {
                replies::profile_management()
            } else {
                replies::profile_confirmation()
            };
            return Ok(Transition::quick_replies(
                messages::primary_profile(student),
                options,
            ));
        }

        Ok(profile_chooser(State::ProfileView, &profiles))
    }

    pub async fn switch_profile(&self, psid: &str) -> Result<Transition> {
        let Some(user) = self.user(psid).await? else {
            return self.welcome(psid).await;
        };
        if !user.is_active {
            return self.with_status(psid, messages::ACCOUNT_DEACTIVATED).await;
        }

        let profiles = self.repos.linked_profiles(user.id).await?;
        if profiles.len() <= 1 {
            return self.with_status(psid, messages::SINGLE_PROFILE_ONLY).await;
        }
        Ok(profile_chooser(State::ProfileSwitch, &profiles))
    }

    /// Make `target` primary and land on the main menu.
    pub async fn select_profile(&self, psid: &str, target: &ProfileTarget) -> Result<Transition> {
        let Some(user) = self.user(psid).await? else {
            return self.welcome(psid).await;
        };
        if !user.is_active {
            return self.with_status(psid, messages::ACCOUNT_DEACTIVATED).await;
        }

        self.repos
            .links
            .set_primary(user.id, &target.student_id, &target.school_id)
            .await?;
        tracing::info!(
            user = %psid,
            school = %target.school_id,
            student = %target.student_id,
            "Primary profile changed"
        );

        let mut transition = Transition::none();
        if let Some(student) = self
            .repos
            .primary_profile(user.id)
            .await?
            .and_then(|p| p.student)
        {
            transition = transition.with_text(messages::profile_switched(&student));
        }
        Ok(transition
            .with_text(messages::WELCOME_ABOARD)
            .then(self.enter_main_menu(psid).await?))
    }

    /// Keep the current profile. A single link becomes primary.
    pub async fn continue_profile(&self, psid: &str) -> Result<Transition> {
        let Some(user) = self.user(psid).await? else {
            return self.welcome(psid).await;
        };
        if !user.is_active {
            return self.with_status(psid, messages::ACCOUNT_DEACTIVATED).await;
        }

        let profiles = self.repos.linked_profiles(user.id).await?;
        if profiles.is_empty() {
            return self
                .with_status(
                    psid,
                    "Sorry, we couldn't find any linked profiles. Please try again.",
                )
                .await;
        }
        if let [only] = profiles.as_slice() {
            self.repos
                .links
                .set_primary(user.id, &only.link.student_id, &only.link.school_id)
                .await?;
        }

        let single = profiles.len() == 1;
        let mut transition = Transition::none();
        if let Some(student) = profiles
            .iter()
            .find(|p| p.link.is_primary || single)
            .and_then(|p| p.student.as_ref())
        {
            transition = transition.with_text(messages::profile_confirmed(student));
        }
        Ok(transition
            .with_text(messages::WELCOME_ABOARD)
            .then(self.enter_main_menu(psid).await?))
    }
}

/// Numbered profile list plus the selection map for `state`.
fn profile_chooser(state: State, profiles: &[LinkedProfile]) -> Transition {
    let targets = profiles.iter().map(|p| ProfileTarget {
        student_id: p.link.student_id.clone(),
        school_id: p.link.school_id.clone(),
    });
    let delta = SessionData::new().with_profile_map(state, SelectionMap::numbered(targets));
    Transition::enter_with(state, delta)
        .with_quick_replies(account_list(profiles), replies::back())
}

pub(super) fn account_list(profiles: &[LinkedProfile]) -> String {
    let mut out = format!("{}\n\n", messages::SELECT_PROFILE);
    for (i, profile) in profiles.iter().enumerate() {
        let _ = write!(out, "[{}] ", i + 1);
        let Some(student) = profile.student.as_ref() else {
            let _ = writeln!(out, "{}\n", profile.link.student_id);
            continue;
        };
        let primary = if profile.link.is_primary { " (Primary)" } else { "" };
        let _ = writeln!(out, "{} {}{primary}", student.first_name, student.last_name);
        let _ = writeln!(out, "Student ID: {}", student.student_id);
        let _ = writeln!(out, "School: {}", student.school.school_name);
        if !student.year_level.is_empty() {
            let _ = write!(out, "Year: {}", student.year_level);
            if !student.course.is_empty() {
                let _ = write!(out, " - {}", student.course);
            }
            out.push('\n');
        }
        out.push('\n');
    }
    out
}
