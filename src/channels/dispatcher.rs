//! Chunked dispatcher — delivers long text in transport-sized pieces.

use std::sync::Arc;

use tracing::{debug, warn};

use super::channel::OutboundSender;

/// WhatsApp text bodies are capped well below 4096 chars; stay under it.
pub const DEFAULT_MAX_CHUNK: usize = 3500;

/// Split `text` into consecutive slices of at most `max_chunk` characters.
///
/// Counts Unicode scalar values, so multi-byte text is never cut inside a
/// code point. Every slice but the last is exactly `max_chunk` long. Empty
/// input yields no chunks. A `max_chunk` of zero is treated as one.
pub fn split_chunks(text: &str, max_chunk: usize) -> Vec<&str> {
    let max_chunk = max_chunk.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let end = rest
            .char_indices()
            .nth(max_chunk)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let (head, tail) = rest.split_at(end);
        chunks.push(head);
        rest = tail;
    }

    chunks
}

/// Outcome of a multi-message delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
    /// Texts that reached the transport, in send order.
    pub delivered: Vec<String>,
}

impl DispatchReport {
    fn record(&mut self, text: &str, ok: bool) {
        if ok {
            self.sent += 1;
            self.delivered.push(text.to_string());
        } else {
            self.failed += 1;
        }
    }
}

/// Sends text through an [`OutboundSender`], chunking long bodies.
pub struct ChunkedDispatcher {
    sender: Arc<dyn OutboundSender>,
    max_chunk: usize,
}

impl ChunkedDispatcher {
    pub fn new(sender: Arc<dyn OutboundSender>, max_chunk: usize) -> Self {
        Self {
            sender,
            max_chunk: max_chunk.max(1),
        }
    }

    pub fn max_chunk(&self) -> usize {
        self.max_chunk
    }

    /// Send a single message. Failures are logged and reported as `false`.
    pub async fn send(&self, recipient: &str, text: &str) -> bool {
        match self.sender.send_text(recipient, text).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    channel = self.sender.name(),
                    recipient = recipient,
                    error = %e,
                    "Failed to send message"
                );
                false
            }
        }
    }

    /// Send `text` as ordered chunks followed by one call-to-action message.
    ///
    /// Each send is awaited before the next starts. A failed send does not
    /// stop the remaining ones.
    pub async fn send_long(
        &self,
        recipient: &str,
        text: &str,
        call_to_action: &str,
    ) -> DispatchReport {
        let chunks = split_chunks(text, self.max_chunk);
        debug!(
            recipient = recipient,
            chunks = chunks.len(),
            "Dispatching long message"
        );

        let mut report = DispatchReport::default();
        for chunk in chunks {
            let ok = self.send(recipient, chunk).await;
            report.record(chunk, ok);
        }
        let ok = self.send(recipient, call_to_action).await;
        report.record(call_to_action, ok);

        if report.failed > 0 {
            warn!(
                recipient = recipient,
                sent = report.sent,
                failed = report.failed,
                "Long message partially delivered"
            );
        }
        report
    }
}
