//! Graph API client for the Messenger Send and Profile APIs.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;

use super::traits::{Messenger, MessengerError, QuickReply, UserProfile};
use crate::config::MessengerConfig;

const MAX_ERROR_BODY_CHARS: usize = 300;

pub struct GraphMessenger {
    base_url: String,
    api_version: String,
    page_access_token: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct WireQuickReply<'a> {
    content_type: &'static str,
    title: &'a str,
    payload: &'a str,
}

impl GraphMessenger {
    pub fn new(
        base_url: &str,
        api_version: &str,
        page_access_token: &str,
        timeout: Duration,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_version: api_version.trim_matches('/').to_string(),
            page_access_token: page_access_token.to_string(),
            client: Client::builder()
                .timeout(timeout)
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    pub fn from_config(config: &MessengerConfig) -> Self {
        Self::new(
            &config.graph_api_base,
            &config.api_version,
            &config.page_access_token,
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            self.api_version,
            path.trim_start_matches('/')
        )
    }

    fn token(&self) -> Result<&str, MessengerError> {
        if self.page_access_token.is_empty() {
            return Err(MessengerError::NotConfigured);
        }
        Ok(&self.page_access_token)
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<(), MessengerError> {
        let response = self
            .client
            .post(self.endpoint(path))
            .query(&[("access_token", self.token()?)])
            .json(body)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, MessengerError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());
    Err(MessengerError::Api {
        status: status.as_u16(),
        body: crate::util::truncate_chars(&body, MAX_ERROR_BODY_CHARS),
    })
}

pub(crate) fn text_payload(recipient: &str, text: &str) -> serde_json::Value {
    json!({
        "recipient": { "id": recipient },
        "messaging_type": "RESPONSE",
        "message": { "text": text },
    })
}

pub(crate) fn quick_reply_payload(
    recipient: &str,
    text: &str,
    replies: &[QuickReply],
) -> serde_json::Value {
    let quick_replies: Vec<WireQuickReply<'_>> = replies
        .iter()
        .map(|r| WireQuickReply {
            content_type: "text",
            title: &r.title,
            payload: &r.payload,
        })
        .collect();
    json!({
        "recipient": { "id": recipient },
        "messaging_type": "RESPONSE",
        "message": { "text": text, "quick_replies": quick_replies },
    })
}

#[async_trait]
impl Messenger for GraphMessenger {
    async fn send_text(&self, recipient: &str, text: &str) -> Result<(), MessengerError> {
        self.post("me/messages", &text_payload(recipient, text)).await?;
        tracing::debug!(recipient, "Text message sent");
        Ok(())
    }

    async fn send_quick_replies(
        &self,
        recipient: &str,
        text: &str,
        replies: &[QuickReply],
    ) -> Result<(), MessengerError> {
        self.post("me/messages", &quick_reply_payload(recipient, text, replies))
            .await?;
        tracing::debug!(recipient, replies = replies.len(), "Quick replies sent");
        Ok(())
    }

    async fn user_profile(&self, user_id: &str) -> Result<UserProfile, MessengerError> {
        let response = self
            .client
            .get(self.endpoint(user_id))
            .query(&[
                ("fields", "id,name,first_name,last_name"),
                ("access_token", self.token()?),
            ])
            .send()
            .await?;
        let response = check_status(response).await?;
        response
            .json::<UserProfile>()
            .await
            .map_err(|e| MessengerError::Decode(e.to_string()))
    }

    async fn set_get_started(&self, payload: &str) -> Result<(), MessengerError> {
        self.post(
            "me/messenger_profile",
            &json!({ "get_started": { "payload": payload } }),
        )
        .await
    }

    async fn set_greeting(&self, text: &str) -> Result<(), MessengerError> {
        self.post(
            "me/messenger_profile",
            &json!({ "greeting": [{ "locale": "default", "text": text }] }),
        )
        .await
    }

    fn name(&self) -> &str {
        "graph"
    }
}
