use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A tappable reply chip shown under a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickReply {
    pub title: String,
    /// Sent back as the message's quick-reply payload when tapped.
    pub payload: String,
}

impl QuickReply {
    pub fn new(title: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            payload: payload.into(),
        }
    }
}

/// Public profile of a messaging-platform user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MessengerError {
    #[error("messenger transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("messenger API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("messenger response could not be decoded: {0}")]
    Decode(String),

    #[error("messenger page access token is not configured")]
    NotConfigured,
}

/// Outbound side of the messaging platform.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(&self, recipient: &str, text: &str) -> Result<(), MessengerError>;

    async fn send_quick_replies(
        &self,
        recipient: &str,
        text: &str,
        replies: &[QuickReply],
    ) -> Result<(), MessengerError>;

    async fn user_profile(&self, user_id: &str) -> Result<UserProfile, MessengerError>;

    /// Register the payload delivered when a user taps "Get Started".
    async fn set_get_started(&self, payload: &str) -> Result<(), MessengerError>;

    async fn set_greeting(&self, text: &str) -> Result<(), MessengerError>;

    fn name(&self) -> &str;
}
