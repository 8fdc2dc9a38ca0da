//! The per-user session record.
//!
//! A session exists for a user exactly while a conversation is in
//! progress. `answers` and `history` are append-only; one `UserAnswer` is
//! recorded per accepted transition, tagged with the state it answered.

use crate::state::StateKey;
use chrono::{DateTime, Utc};
use colloquy_core::{Message, SessionId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// One accepted answer, tagged with the state it was given in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAnswer {
    /// The raw answer text.
    pub answer: String,
    /// The state the session was in when the answer was accepted.
    pub state_key: StateKey,
}

/// A user's live progress through a plugin's state graph.
///
/// Timer handles are deliberately not part of this record: sessions must
/// round-trip through any [`SessionStore`](crate::store::SessionStore),
/// including durable ones. The engine keeps handles in its own side table
/// for exactly as long as the session is live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier.
    pub id: SessionId,
    /// The user this session belongs to.
    pub user_id: UserId,
    /// The state the conversation is currently in. Always a valid key of
    /// the owning plugin's state map.
    pub current_state_key: StateKey,
    /// Accepted answers, in order.
    pub answers: Vec<UserAnswer>,
    /// Raw messages that produced accepted transitions, in order.
    pub history: Vec<Message>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// Scratch space for plugin business code. The engine never reads it.
    #[serde(default)]
    pub data: JsonValue,
}

impl Session {
    /// Creates a fresh session positioned at the start state.
    #[must_use]
    pub fn new(user_id: UserId, start_key: StateKey) -> Self {
        Self {
            id: SessionId::new(),
            user_id,
            current_state_key: start_key,
            answers: Vec::new(),
            history: Vec::new(),
            created_at: Utc::now(),
            data: JsonValue::Null,
        }
    }

    /// Records an accepted answer against the current state.
    pub fn record_answer(&mut self, message: &Message) {
        self.answers.push(UserAnswer {
            answer: message.text.clone(),
            state_key: self.current_state_key.clone(),
        });
        self.history.push(message.clone());
    }

    /// Returns the number of accepted answers so far.
    #[must_use]
    pub fn answer_count(&self) -> usize {
        self.answers.len()
    }

    /// Returns the last accepted answer, if any.
    #[must_use]
    pub fn last_answer(&self) -> Option<&UserAnswer> {
        self.answers.last()
    }
}
