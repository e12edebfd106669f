//! Paginated lists: the bulletin board and attendance records.

use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use std::fmt::Write;

use super::actions::Actions;
use super::messages;
use super::replies;
use crate::conversation::Transition;
use crate::domain::Bulletin;
use crate::pagination::{paginate, Page};
use crate::sessions::{SessionData, State};
use crate::util::{extract_tag, truncate_chars};

pub const BULLETINS_PER_PAGE: usize = 3;
pub const ATTENDANCE_PER_PAGE: usize = 10;

const BULLETIN_HEADER: &str = "📰 *Bulletin Board*\n\nStay informed with the latest school updates.";
const DESCRIPTION_LIMIT: usize = 200;
const SEPARATOR: &str = "\n━━━━━━━━━━━━━━━━━━\n";

fn footer_replies(window: &Page) -> Vec<crate::messenger::QuickReply> {
    if window.has_more {
        replies::view_more()
    } else {
        replies::back()
    }
}

impl Actions {
    pub async fn bulletin_page(&self, psid: &str, page: usize) -> Result<Transition> {
        let active = match self.active_student(psid).await? {
            Ok(active) => active,
            Err(denied) => return Ok(denied),
        };
        let school_id = active.student.school.school_id.as_str();

        let total = self.repos.bulletins.active_count(school_id).await?;
        let window = paginate(total, BULLETINS_PER_PAGE, page);
        let bulletins = self
            .repos
            .bulletins
            .active_page(school_id, window.offset, window.page_size)
            .await?;

        if bulletins.is_empty() {
            let text = if window.offset == 0 {
                messages::NO_BULLETINS
            } else {
                "No more bulletins to show."
            };
            return Ok(Transition::quick_replies(text, replies::back()));
        }

        let delta = SessionData::new()
            .with_cursor(State::ViewBulletin, window.cursor(bulletins.len()));
        let mut transition =
            Transition::enter_with(State::ViewBulletin, delta).with_text(BULLETIN_HEADER);
        let last = bulletins.len() - 1;
        for (i, bulletin) in bulletins.iter().enumerate() {
            let mut text = self.render_bulletin(bulletin);
            if i < last {
                text.push_str(SEPARATOR);
            }
            transition = transition.with_text(text);
        }

        tracing::debug!(user = %psid, page = window.page, total, "Rendered bulletin page");
        Ok(transition.with_quick_replies(
            format!("_Page {} of {}_", window.page, window.total_pages),
            footer_replies(&window),
        ))
    }

    fn render_bulletin(&self, bulletin: &Bulletin) -> String {
        let mut text = format!("*Title:* {}\n", bulletin.title);

        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1);
        if let Some(start) = bulletin.period_start {
            if Some(start.date_naive()) != epoch {
                let local = start.with_timezone(&self.timezone);
                let _ = writeln!(text, "*Date:* {}", local.format("%B %d, %Y"));
            }
        }

        if let Some(url) = bulletin
            .image_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty() && *u != ".")
        {
            let _ = writeln!(text, "*Image:* {url}");
        }

        if let Some(description) = bulletin.description.as_deref().filter(|d| !d.is_empty()) {
            let _ = write!(
                text,
                "\n*Description:*\n{}\n",
                truncate_chars(description, DESCRIPTION_LIMIT)
            );
        }

        if let Some(link) = bulletin
            .notes
            .as_deref()
            .and_then(|notes| extract_tag(notes, "redirectionlink"))
        {
            let _ = write!(text, "\n*Link:* {link}\n");
        }

        text
    }

    /// Attendance records of the current month, newest first.
    pub async fn attendance_page(&self, psid: &str, page: usize) -> Result<Transition> {
        let active = match self.active_student(psid).await? {
            Ok(active) => active,
            Err(denied) => return Ok(denied),
        };
        let school_id = active.student.school.school_id.as_str();
        let student_id = active.student.student_id.as_str();
        let period = self.current_month()?;

        let total = self
            .repos
            .attendance
            .count(school_id, student_id, period)
            .await?;
        let window = paginate(total, ATTENDANCE_PER_PAGE, page);
        let records = self
            .repos
            .attendance
            .page(school_id, student_id, period, window.offset, window.page_size)
            .await?;

        if records.is_empty() {
            let text = if window.page == 1 {
                messages::NO_ATTENDANCE
            } else {
                "No more records to show."
            };
            return Ok(Transition::quick_replies(text, replies::back()));
        }

        let now = self.local_now();
        let mut text = format!(
            "📋 *Your Attendance Records*\n\n📅 *{} {}*\n\n",
            now.format("%B"),
            now.year()
        );

        // Records arrive newest first; group consecutive records by local date.
        let mut current_day: Option<NaiveDate> = None;
        for record in &records {
            let local = record.recorded_at.with_timezone(&self.timezone);
            let day = local.date_naive();
            if current_day != Some(day) {
                if current_day.is_some() {
                    text.push('\n');
                }
                let _ = writeln!(text, "📅 *{}*", day.format("%A, %b %d, %Y"));
                current_day = Some(day);
            }
            let _ = writeln!(text, "  {} {}", local.format("%H:%M:%S"), record.kind);
        }
        let _ = write!(text, "\n_Page {} of {}_", window.page, window.total_pages);

        let delta = SessionData::new().with_cursor(State::ViewDtr, window.cursor(records.len()));
        Ok(Transition::enter_with(State::ViewDtr, delta)
            .with_quick_replies(text, footer_replies(&window)))
    }
}
