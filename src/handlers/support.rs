//! Support inquiries and ticket history.

use anyhow::Result;
use std::fmt::Write;

use super::actions::Actions;
use super::messages;
use super::replies;
use crate::conversation::Transition;
use crate::domain::{MessageAuthor, NewSupportThread, SupportMessage, ThreadStatus};
use crate::sessions::{SelectionMap, SessionData, State};

const MAX_TICKETS: usize = 10;
const HELP_TOPIC: &str = "General Inquiry";
const THREAD_SUBJECT: &str = "From Messenger App";

impl Actions {
    /// Prompt for an inquiry; enters `AskSupport` with no current thread.
    pub async fn ask_support(&self, psid: &str) -> Result<Transition> {
        if let Err(denied) = self.active_student(psid).await? {
            return Ok(denied);
        }
        let delta = SessionData::new().with_thread_id(State::AskSupport, "");
        Ok(Transition::enter_with(State::AskSupport, delta)
            .with_quick_replies(messages::ASK_SUPPORT, replies::ask_support()))
    }

    /// Append `message` to the current thread, opening one when needed.
    pub async fn submit_support_message(
        &self,
        psid: &str,
        message: &str,
        thread_id: Option<&str>,
    ) -> Result<Transition> {
        let active = match self.active_student(psid).await? {
            Ok(active) => active,
            Err(denied) => return Ok(denied),
        };
        let student = &active.student;
        let school_id = student.school.school_id.as_str();

        let mut transition = Transition::none();
        let thread_id = match thread_id {
            Some(id) => id.to_string(),
            None => {
                let created = self
                    .repos
                    .support
                    .create_thread(
                        school_id,
                        NewSupportThread {
                            borrower_id: student.borrower_id.clone(),
                            borrower_name: student.full_name(),
                            mobile_no: student.mobile_number.clone(),
                            help_topic: HELP_TOPIC.to_string(),
                            subject: Some(THREAD_SUBJECT.to_string()),
                        },
                    )
                    .await;
                let thread = match created {
                    Ok(thread) => thread,
                    Err(e) => {
                        tracing::warn!(user = %psid, error = %e, "Failed to create support thread");
                        return self
                            .with_status(
                                psid,
                                "Failed to create support ticket. Please try again later.",
                            )
                            .await;
                    }
                };
                tracing::info!(user = %psid, thread = %thread.thread_id, "Support thread opened");
                let delta =
                    SessionData::new().with_thread_id(State::AskSupport, thread.thread_id.clone());
                transition = Transition::enter_with(State::AskSupport, delta).then(
                    self.with_status(psid, &messages::ticket_created(&thread.thread_id))
                        .await?,
                );
                thread.thread_id
            }
        };

        let saved = self
            .repos
            .support
            .add_message(
                school_id,
                SupportMessage {
                    thread_id: thread_id.clone(),
                    author: MessageAuthor::Student,
                    author_id: student.student_id.clone(),
                    author_name: student.full_name(),
                    message: message.to_string(),
                    sent_at: Some(self.now()),
                },
            )
            .await;
        if let Err(e) = saved {
            tracing::warn!(
                user = %psid,
                thread = %thread_id,
                error = %e,
                "Failed to save support message"
            );
            return Ok(transition.then(
                self.with_status(psid, "Failed to send your message. Please try again.")
                    .await?,
            ));
        }

        Ok(transition
            .then(Transition::enter(State::Initial))
            .then(self.with_status(psid, messages::SUPPORT_MESSAGE_SENT).await?))
    }

    /// Up to ten tickets of the student; enters `SelectSupportTicket`.
    pub async fn ticket_list(&self, psid: &str) -> Result<Transition> {
        let active = match self.active_student(psid).await? {
            Ok(active) => active,
            Err(denied) => return Ok(denied),
        };
        let student = &active.student;
        let tickets = self
            .repos
            .support
            .threads_by_borrower(&student.school.school_id, &student.borrower_id)
            .await?;
        if tickets.is_empty() {
            return Ok(Transition::quick_replies(messages::NO_TICKETS, replies::back()));
        }

        let shown: Vec<_> = tickets.iter().take(MAX_TICKETS).collect();
        let mut text = String::from("📋 Your Support Tickets:\n\n");
        for (i, ticket) in shown.iter().enumerate() {
            let closed = if ticket.status == ThreadStatus::Closed {
                " (Closed)"
            } else {
                ""
            };
            let _ = writeln!(text, "[{}] #{}{closed}", i + 1, ticket.thread_id);
        }
        text.push_str("\nPlease reply with the number of the ticket you want to view.");

        let map = SelectionMap::numbered(shown.iter().map(|t| t.thread_id.clone()));
        let delta = SessionData::new().with_tickets(State::SelectSupportTicket, map);
        Ok(Transition::enter_with(State::SelectSupportTicket, delta)
            .with_quick_replies(text, replies::back()))
    }

    /// Ticket header and conversation. State is unchanged so another
    /// ticket can be picked.
    pub async fn ticket_detail(&self, psid: &str, thread_id: &str) -> Result<Transition> {
        let active = match self.active_student(psid).await? {
            Ok(active) => active,
            Err(denied) => return Ok(denied),
        };
        let school_id = active.student.school.school_id.as_str();

        let Some(ticket) = self.repos.support.thread(school_id, thread_id).await? else {
            return self.with_status(psid, messages::TICKET_NOT_FOUND).await;
        };
        let conversation = self.repos.support.messages(school_id, thread_id).await?;

        let mut text = format!(
            "📋 Ticket #{} ({})\n\n",
            ticket.thread_id,
            ticket.status.as_str()
        );
        if !ticket.help_topic.is_empty() {
            let _ = writeln!(text, "Topic: {}", ticket.help_topic);
        }
        text.push_str("\n💬 Conversation:\n\n");
        for entry in &conversation {
            if let Some(sent_at) = entry.sent_at {
                let local = sent_at.with_timezone(&self.timezone);
                let _ = writeln!(text, "{}", local.format("%b %-d, %-I:%M %p"));
            }
            let author = match entry.author {
                MessageAuthor::Student => "You:",
                MessageAuthor::Support => "Support:",
            };
            let _ = write!(text, "{author}\n{}\n\n", entry.message);
        }

        if ticket.status == ThreadStatus::Closed {
            text.push_str("\n\nThis ticket is closed. You can view other tickets or go back.");
            return Ok(Transition::quick_replies(text, replies::back()));
        }

        text.push_str(
            "\n\nYou can select another ticket to view its details or go back to the main menu.",
        );
        Ok(Transition::text(text).with_quick_replies(messages::WHAT_NEXT, replies::back()))
    }
}
