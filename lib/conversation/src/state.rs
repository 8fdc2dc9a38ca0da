//! The conversation state graph.
//!
//! A plugin's dialogue is a map of keyed states. Each state can send a
//! question when entered and owns the transition function that decides,
//! per inbound message, whether to advance and to where. The transition
//! function is the sole authority on answer validation: returning
//! [`Transition::Stay`] leaves the session exactly where it was.

use crate::session::Session;
use async_trait::async_trait;
use colloquy_core::{Message, Transport, User};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Opaque key naming a node in a plugin's state graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateKey(String);

impl StateKey {
    /// Creates a state key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StateKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for StateKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// The outcome of a transition function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Accept the answer and move to the named state.
    Advance(StateKey),
    /// Reject the answer; the session keeps waiting on the same state.
    Stay,
}

/// Everything a state's callbacks can see.
///
/// The session is a snapshot taken when the callback fires; mutating
/// conversation state happens only through [`Transition`] values.
pub struct StateContext {
    /// Name of the owning plugin.
    pub plugin: String,
    /// Outbound capability borrowed from the transport adapter.
    pub bot: Arc<dyn Transport>,
    /// The user this conversation belongs to.
    pub user: User,
    /// The message being processed. Empty text for synthetic re-entries
    /// into pass-through states.
    pub message: Message,
    /// Snapshot of the session at callback time.
    pub session: Session,
}

/// Behavior of a single state: its question side effect and its
/// transition function.
#[async_trait]
pub trait StateHandler: Send + Sync {
    /// Sends the state's prompt when the state is entered. Default: no
    /// question.
    async fn send_question(&self, _ctx: &StateContext) {}

    /// Decides the next state for an inbound message.
    ///
    /// Default: reject everything. Terminal states never have theirs
    /// called, so the default suits them.
    async fn next_key(&self, _ctx: &StateContext) -> Transition {
        Transition::Stay
    }
}

/// Handler for terminal states with no question of their own.
struct NoQuestion;

#[async_trait]
impl StateHandler for NoQuestion {}

/// One node of a plugin's conversation graph.
#[derive(Clone)]
pub struct State {
    /// Whether the state waits for user input. Pass-through states
    /// (`false`) advance immediately on a synthetic empty message.
    pub wait_for_answer: bool,
    /// Whether this is a terminal node.
    pub finish: bool,
    /// The state's behavior.
    pub handler: Arc<dyn StateHandler>,
}

impl State {
    /// A state that asks a question and waits for the user's answer.
    #[must_use]
    pub fn question(handler: impl StateHandler + 'static) -> Self {
        Self {
            wait_for_answer: true,
            finish: false,
            handler: Arc::new(handler),
        }
    }

    /// A state that runs its side effect and advances without consuming
    /// user input.
    #[must_use]
    pub fn pass_through(handler: impl StateHandler + 'static) -> Self {
        Self {
            wait_for_answer: false,
            finish: false,
            handler: Arc::new(handler),
        }
    }

    /// A terminal state with no closing question.
    #[must_use]
    pub fn finish() -> Self {
        Self {
            wait_for_answer: true,
            finish: true,
            handler: Arc::new(NoQuestion),
        }
    }

    /// A terminal state that sends a closing question/message on entry.
    #[must_use]
    pub fn finish_with(handler: impl StateHandler + 'static) -> Self {
        Self {
            wait_for_answer: true,
            finish: true,
            handler: Arc::new(handler),
        }
    }

    /// Marks the state as not waiting for input.
    ///
    /// On a terminal state this collapses the two-message teardown into a
    /// same-turn auto-advance: the session ends on the message that
    /// reached it.
    #[must_use]
    pub fn auto(mut self) -> Self {
        self.wait_for_answer = false;
        self
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("wait_for_answer", &self.wait_for_answer)
            .field("finish", &self.finish)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Always(StateKey);

    #[async_trait]
    impl StateHandler for Always {
        async fn next_key(&self, _ctx: &StateContext) -> Transition {
            Transition::Advance(self.0.clone())
        }
    }

    #[test]
    fn state_key_display_and_from() {
        let key = StateKey::from("ask_name");
        assert_eq!(key.as_str(), "ask_name");
        assert_eq!(key.to_string(), "ask_name");
    }

    #[test]
    fn state_key_serde_is_transparent() {
        let key = StateKey::from("ask_name");
        let json = serde_json::to_string(&key).expect("serialize");
        assert_eq!(json, "\"ask_name\"");
    }

    #[test]
    fn question_state_waits() {
        let state = State::question(Always(StateKey::from("next")));
        assert!(state.wait_for_answer);
        assert!(!state.finish);
    }

    #[test]
    fn pass_through_state_does_not_wait() {
        let state = State::pass_through(Always(StateKey::from("next")));
        assert!(!state.wait_for_answer);
        assert!(!state.finish);
    }

    #[test]
    fn finish_state_is_terminal() {
        let state = State::finish();
        assert!(state.finish);
        assert!(state.wait_for_answer);

        let auto = State::finish().auto();
        assert!(auto.finish);
        assert!(!auto.wait_for_answer);
    }
}
