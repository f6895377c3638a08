//! WhatsApp channel — sends text through the WhatsApp Cloud (Graph) API and
//! parses inbound webhook envelopes.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use crate::channels::{InboundMessage, OutboundSender};
use crate::error::ChannelError;

/// Graph API version used when none is configured.
pub const DEFAULT_API_VERSION: &str = "v17.0";

const GRAPH_BASE_URL: &str = "https://graph.facebook.com";

/// WhatsApp Cloud API channel bound to one sending phone number.
pub struct WhatsAppChannel {
    access_token: SecretString,
    phone_number_id: String,
    api_version: String,
    client: reqwest::Client,
}

impl WhatsAppChannel {
    pub fn new(access_token: SecretString, phone_number_id: String, api_version: String) -> Self {
        Self {
            access_token,
            phone_number_id,
            api_version,
            client: reqwest::Client::new(),
        }
    }

    pub fn phone_number_id(&self) -> &str {
        &self.phone_number_id
    }

    fn api_url(&self, path: &str) -> String {
        format!("{GRAPH_BASE_URL}/{}/{path}", self.api_version)
    }

    fn messages_url(&self) -> String {
        self.api_url(&format!("{}/messages", self.phone_number_id))
    }

    /// Check that the token can read the sending phone number.
    pub async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url(&self.phone_number_id))
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await
            .map_err(|e| ChannelError::HealthCheckFailed {
                name: "whatsapp".into(),
                reason: e.to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::HealthCheckFailed {
                name: "whatsapp".into(),
                reason: format!("phone number lookup returned {}", resp.status()),
            })
        }
    }
}

/// JSON body for a plain text message.
fn text_payload(to: &str, body: &str) -> Value {
    json!({
        "messaging_product": "whatsapp",
        "to": to,
        "type": "text",
        "text": { "body": body }
    })
}

#[async_trait]
impl OutboundSender for WhatsAppChannel {
    fn name(&self) -> &str {
        "whatsapp"
    }

    async fn send_text(&self, recipient: &str, text: &str) -> Result<(), ChannelError> {
        let resp = self
            .client
            .post(self.messages_url())
            .bearer_auth(self.access_token.expose_secret())
            .json(&text_payload(recipient, text))
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "whatsapp".into(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: "whatsapp".into(),
                reason: format!("messages API returned {status}: {body}"),
            });
        }

        tracing::debug!(recipient = recipient, chars = text.chars().count(), "WhatsApp message sent");
        Ok(())
    }
}

// ── Inbound parsing ─────────────────────────────────────────────────

/// Extract every text message from a webhook envelope.
///
/// Walks `entry[].changes[].value.messages[]`. Items without a sender or a
/// text body are skipped. When `phone_number_id` is given, changes addressed
/// to a different number are ignored.
pub fn parse_webhook_payload(payload: &Value, phone_number_id: Option<&str>) -> Vec<InboundMessage> {
    let mut messages = Vec::new();

    let entries = payload
        .get("entry")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for entry in entries {
        let changes = entry
            .get("changes")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for change in changes {
            let Some(value) = change.get("value") else {
                continue;
            };

            let metadata_phone_id = value
                .get("metadata")
                .and_then(|m| m.get("phone_number_id"))
                .and_then(Value::as_str)
                .unwrap_or("");
            let expected = phone_number_id.unwrap_or("");
            if !expected.is_empty() && !metadata_phone_id.is_empty() && expected != metadata_phone_id
            {
                tracing::debug!(
                    phone_number_id = metadata_phone_id,
                    "Skipping change for another phone number"
                );
                continue;
            }

            let items = value
                .get("messages")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();

            for item in items {
                match parse_message(item) {
                    Ok(message) => messages.push(message),
                    Err(e) => tracing::debug!("Skipping webhook item: {e}"),
                }
            }
        }
    }

    messages
}

fn parse_message(item: &Value) -> Result<InboundMessage, ChannelError> {
    let from = item
        .get("from")
        .and_then(Value::as_str)
        .filter(|f| !f.trim().is_empty())
        .ok_or_else(|| ChannelError::InvalidMessage("message without sender".into()))?;
    let body = item
        .get("text")
        .and_then(|t| t.get("body"))
        .and_then(Value::as_str)
        .ok_or_else(|| {
            let kind = item.get("type").and_then(Value::as_str).unwrap_or("unknown");
            ChannelError::InvalidMessage(format!("non-text message of type '{kind}'"))
        })?;

    Ok(InboundMessage::new(from.trim(), body))
}
