//! Messenger for deployments without a page token: logs outbound messages and drops them.

use async_trait::async_trait;

use super::traits::{Messenger, MessengerError, QuickReply, UserProfile};

/// Stateless [`Messenger`] that never sends anything and keeps nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunMessenger;

impl DryRunMessenger {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Messenger for DryRunMessenger {
    async fn send_text(&self, recipient: &str, text: &str) -> Result<(), MessengerError> {
        tracing::debug!(
            recipient,
            chars = text.chars().count(),
            "Dry run: text not sent"
        );
        Ok(())
    }

    async fn send_quick_replies(
        &self,
        recipient: &str,
        text: &str,
        replies: &[QuickReply],
    ) -> Result<(), MessengerError> {
        tracing::debug!(
            recipient,
            chars = text.chars().count(),
            replies = replies.len(),
            "Dry run: quick replies not sent"
        );
        Ok(())
    }

    async fn user_profile(&self, _user_id: &str) -> Result<UserProfile, MessengerError> {
        Err(MessengerError::NotConfigured)
    }

    async fn set_get_started(&self, _payload: &str) -> Result<(), MessengerError> {
        Err(MessengerError::NotConfigured)
    }

    async fn set_greeting(&self, _text: &str) -> Result<(), MessengerError> {
        Err(MessengerError::NotConfigured)
    }

    fn name(&self) -> &str {
        "dry-run"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn sends_succeed_without_a_token() {
        let m = DryRunMessenger::new();
        assert_ok!(m.send_text("u1", "hello").await);
        assert_ok!(
            m.send_quick_replies("u1", "pick", &[QuickReply::new("Back", "BACK")])
                .await
        );
    }

    #[tokio::test]
    async fn profile_calls_report_missing_configuration() {
        let m = DryRunMessenger::new();
        let err = assert_err!(m.user_profile("u1").await);
        assert!(matches!(err, MessengerError::NotConfigured));
        assert_err!(m.set_get_started("GET_STARTED").await);
        assert_err!(m.set_greeting("hi").await);
    }
}
