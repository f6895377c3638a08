//! Channel seams: inbound messages and the outbound text sender.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// A text message received from a chat user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Stable external identifier of the sender (phone number).
    pub sender_id: String,
    /// Message body, trimmed.
    pub text: String,
}

impl InboundMessage {
    pub fn new(sender_id: impl Into<String>, text: &str) -> Self {
        Self {
            sender_id: sender_id.into(),
            text: text.trim().to_string(),
        }
    }
}

/// Delivers a single text message to a recipient.
#[async_trait]
pub trait OutboundSender: Send + Sync {
    /// Channel name used in logs and errors.
    fn name(&self) -> &str;

    async fn send_text(&self, recipient: &str, text: &str) -> Result<(), ChannelError>;
}
