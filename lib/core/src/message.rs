//! The normalized message model.
//!
//! The transport adapter translates platform-specific updates into this
//! shape before dispatch. Nothing in here depends on any particular chat
//! platform's wire format.

use crate::id::{ChatId, MessageId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The sender of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Platform-assigned user identifier.
    pub id: UserId,
    /// Display name, as reported by the platform.
    pub name: String,
}

impl User {
    /// Creates a user.
    #[must_use]
    pub fn new(id: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// The chat a message was received in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    /// Platform-assigned chat identifier.
    pub id: ChatId,
}

impl Chat {
    /// Creates a chat.
    #[must_use]
    pub fn new(id: impl Into<ChatId>) -> Self {
        Self { id: id.into() }
    }
}

/// A normalized inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Platform-assigned message identifier.
    pub id: MessageId,
    /// The message text.
    pub text: String,
    /// Who sent the message.
    pub sender: User,
    /// The chat it arrived in.
    pub chat: Chat,
    /// When the platform says the message was sent.
    pub date: DateTime<Utc>,
}

impl Message {
    /// Creates a message stamped with the current time.
    #[must_use]
    pub fn new(id: impl Into<MessageId>, text: impl Into<String>, sender: User, chat: Chat) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            sender,
            chat,
            date: Utc::now(),
        }
    }
}
