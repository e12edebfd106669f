//! Webhook handlers for the messaging platform.
//!
//! `GET /webhook` answers the subscription handshake, `POST /webhook` receives
//! messaging events. Events are dispatched in delivery order and the platform
//! always gets a 200 once the payload parses, whatever the handlers did.

use super::AppState;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::conversation::InboundEvent;

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

// ── Payload types ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub messaging: Vec<Messaging>,
}

#[derive(Debug, Deserialize)]
pub struct Messaging {
    pub sender: Sender,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
    #[serde(default)]
    pub postback: Option<Postback>,
}

#[derive(Debug, Deserialize)]
pub struct Sender {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub quick_reply: Option<QuickReplyPayload>,
    #[serde(default)]
    pub is_echo: bool,
}

#[derive(Debug, Deserialize)]
pub struct QuickReplyPayload {
    pub payload: String,
}

#[derive(Debug, Deserialize)]
pub struct Postback {
    #[serde(default)]
    pub payload: String,
}

impl Messaging {
    /// Events carried by one messaging entry: the postback first, then the
    /// message. Echoes of our own messages and empty texts are skipped.
    pub fn into_events(self) -> Vec<InboundEvent> {
        let user = self.sender.id;
        let mut events = Vec::new();
        if let Some(postback) = self.postback.filter(|p| !p.payload.is_empty()) {
            events.push(InboundEvent::postback(user.clone(), postback.payload));
        }
        if let Some(message) = self.message.filter(|m| !m.is_echo) {
            let text = message.text.unwrap_or_default();
            match message.quick_reply {
                Some(reply) => events.push(InboundEvent::quick_reply(user, text, reply.payload)),
                None if !text.is_empty() => events.push(InboundEvent::text(user, text)),
                None => {}
            }
        }
        events
    }
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

// ── Signature ───────────────────────────────────────────────────

/// Check a `sha256=<hex>` signature of `body` under `secret`.
pub fn verify_signature(secret: &str, body: &[u8], header: Option<&str>) -> bool {
    let Some(hex_sig) = header.and_then(|h| h.trim().strip_prefix("sha256=")) else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_sig) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

// ── Handlers ────────────────────────────────────────────────────

/// GET /health
pub async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /webhook: subscription handshake
pub async fn handle_verify(
    State(state): State<AppState>,
    Query(params): Query<VerifyQuery>,
) -> Response {
    let expected = state.verify_token.as_ref();
    let matches = !expected.is_empty() && params.verify_token.as_deref() == Some(expected);
    if !matches {
        tracing::warn!(mode = ?params.mode, "Webhook verification rejected");
        return error(StatusCode::FORBIDDEN, "Invalid verification token");
    }
    tracing::info!("Webhook verified");
    (StatusCode::OK, params.challenge.unwrap_or_default()).into_response()
}

/// POST /webhook: messaging events
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(secret) = state.app_secret.as_deref() {
        let header = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok());
        if !verify_signature(secret, &body, header) {
            tracing::warn!("Webhook signature mismatch");
            return error(StatusCode::UNAUTHORIZED, "Invalid signature");
        }
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::debug!(error = %e, "Malformed webhook body");
            return error(StatusCode::BAD_REQUEST, "Invalid request body");
        }
    };

    if payload.object != "page" {
        return Json(serde_json::json!({ "status": "ignored" })).into_response();
    }

    for messaging in payload.entry.into_iter().flat_map(|e| e.messaging) {
        for event in messaging.into_events() {
            let user = event.user_id.clone();
            let outcome = state.dispatcher.dispatch(event).await;
            tracing::debug!(user = %user, outcome = ?outcome, "Event dispatched");
        }
    }

    Json(serde_json::json!({ "status": "ok" })).into_response()
}
