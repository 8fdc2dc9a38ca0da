//! Outbound transport capability.
//!
//! The engine never talks to a chat platform directly; it borrows a single
//! `send` capability from the transport adapter. Formatting payloads (such
//! as keyboard markup) are passed through as opaque JSON and never built or
//! inspected here.

use crate::id::UserId;
use crate::message::User;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Errors from sending through the transport adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The adapter failed to deliver the message.
    SendFailed { reason: String },
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SendFailed { reason } => write!(f, "send failed: {reason}"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Trait for the outbound capability consumed from the transport adapter.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a text reply to a recipient.
    ///
    /// `formatting` is an opaque payload the adapter may translate into
    /// platform markup; `None` sends plain text.
    async fn send(
        &self,
        text: &str,
        recipient: &User,
        formatting: Option<JsonValue>,
    ) -> Result<(), TransportError>;
}

/// A message captured by [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// The outbound text.
    pub text: String,
    /// Who it was addressed to.
    pub recipient: UserId,
    /// The opaque formatting payload, if any.
    pub formatting: Option<JsonValue>,
}

/// A transport that records every send instead of delivering it.
///
/// Useful for exercising plugins without a real adapter.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<SentMessage>>,
}

impl RecordingTransport {
    /// Creates an empty recording transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of everything sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns just the outbound texts, in send order.
    #[must_use]
    pub fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .map(|m| m.text)
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(
        &self,
        text: &str,
        recipient: &User,
        formatting: Option<JsonValue>,
    ) -> Result<(), TransportError> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SentMessage {
                text: text.to_string(),
                recipient: recipient.id.clone(),
                formatting,
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_transport_captures_sends() {
        let transport = RecordingTransport::new();
        let user = User::new("u1", "Alice");

        transport.send("hi", &user, None).await.expect("send");
        transport
            .send("pick one", &user, Some(serde_json::json!({"keyboard": [["a", "b"]]})))
            .await
            .expect("send");

        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].text, "hi");
        assert_eq!(sent[0].recipient, UserId::from("u1"));
        assert!(sent[0].formatting.is_none());
        assert!(sent[1].formatting.is_some());
        assert_eq!(transport.texts(), vec!["hi", "pick one"]);
    }
}
