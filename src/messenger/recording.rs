//! Messenger that records outbound messages in memory instead of sending them.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use super::traits::{Messenger, MessengerError, QuickReply, UserProfile};

/// One recorded outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub recipient: String,
    pub text: String,
    /// Empty for plain text messages.
    pub replies: Vec<QuickReply>,
}

/// In-memory [`Messenger`] test double; keeps every message until [`take`](Self::take).
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<SentMessage>>,
    profiles: Mutex<HashMap<String, UserProfile>>,
    fail_sends: Mutex<bool>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(self, user_id: &str, name: &str) -> Self {
        self.profiles.lock().insert(
            user_id.to_string(),
            UserProfile {
                id: user_id.to_string(),
                name: name.to_string(),
                ..UserProfile::default()
            },
        );
        self
    }

    /// Make every subsequent send fail with an API error.
    pub fn fail_sends(&self, fail: bool) {
        *self.fail_sends.lock() = fail;
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent.lock().iter().map(|m| m.text.clone()).collect()
    }

    /// Drain and return everything recorded so far.
    pub fn take(&self) -> Vec<SentMessage> {
        std::mem::take(&mut *self.sent.lock())
    }

    fn record(
        &self,
        recipient: &str,
        text: &str,
        replies: &[QuickReply],
    ) -> Result<(), MessengerError> {
        if *self.fail_sends.lock() {
            return Err(MessengerError::Api {
                status: 500,
                body: "send disabled".to_string(),
            });
        }
        self.sent.lock().push(SentMessage {
            recipient: recipient.to_string(),
            text: text.to_string(),
            replies: replies.to_vec(),
        });
        Ok(())
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(&self, recipient: &str, text: &str) -> Result<(), MessengerError> {
        self.record(recipient, text, &[])
    }

    async fn send_quick_replies(
        &self,
        recipient: &str,
        text: &str,
        replies: &[QuickReply],
    ) -> Result<(), MessengerError> {
        self.record(recipient, text, replies)
    }

    async fn user_profile(&self, user_id: &str) -> Result<UserProfile, MessengerError> {
        self.profiles
            .lock()
            .get(user_id)
            .cloned()
            .ok_or_else(|| MessengerError::Api {
                status: 404,
                body: format!("unknown user {user_id}"),
            })
    }

    async fn set_get_started(&self, _payload: &str) -> Result<(), MessengerError> {
        Ok(())
    }

    async fn set_greeting(&self, _text: &str) -> Result<(), MessengerError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}
