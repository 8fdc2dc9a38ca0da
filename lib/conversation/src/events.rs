//! Lifecycle hooks for plugin business code.
//!
//! The engine fires these callbacks at session boundaries and on timer
//! ticks. All hooks default to no-ops so a plugin implements only what it
//! needs. Hooks receive snapshots; mutating conversation state is the
//! transition function's job, not theirs.

use crate::session::Session;
use async_trait::async_trait;
use colloquy_core::{Message, Transport, User};
use std::sync::Arc;

/// Context passed to every event hook.
///
/// Fields other than `plugin` and `bot` are present only when the firing
/// event has them: `on_bot_init` carries neither user nor session, timer
/// events carry no message.
pub struct EventContext {
    /// Name of the firing plugin.
    pub plugin: String,
    /// Outbound capability borrowed from the transport adapter.
    pub bot: Arc<dyn Transport>,
    /// The user involved, when the event concerns one.
    pub user: Option<User>,
    /// The message that caused the event, when one did.
    pub message: Option<Message>,
    /// Snapshot of the session at event time.
    pub session: Option<Session>,
}

/// The callback set a conversational plugin's business code implements.
#[async_trait]
pub trait ConversationEvents: Send + Sync {
    /// Fired once at startup, before any messages are dispatched.
    async fn on_bot_init(&self, _ctx: &EventContext) {}

    /// Fired when a trigger creates a new session.
    async fn on_session_start(&self, _ctx: &EventContext) {}

    /// Fired on every accepted answer, after it is recorded and before
    /// the state key moves.
    async fn on_answer(&self, _ctx: &EventContext) {}

    /// Fired when the conversation reaches its end and the session is
    /// about to be torn down.
    async fn on_session_end(&self, _ctx: &EventContext) {}

    /// Fired on every reminder tick while the session awaits input.
    async fn on_session_remind(&self, _ctx: &EventContext) {}

    /// Fired once when an inactive session is force-terminated. The
    /// session has already been deleted from the store when this runs.
    async fn on_session_expired(&self, _ctx: &EventContext) {}
}

/// An event set that does nothing; useful as a placeholder.
pub struct NoEvents;

#[async_trait]
impl ConversationEvents for NoEvents {}

#[cfg(test)]
mod tests {
    use super::*;
    use colloquy_core::RecordingTransport;

    #[tokio::test]
    async fn default_hooks_are_no_ops() {
        let events = NoEvents;
        let ctx = EventContext {
            plugin: "survey".to_string(),
            bot: Arc::new(RecordingTransport::new()),
            user: None,
            message: None,
            session: None,
        };

        // None of these should panic or send anything.
        events.on_bot_init(&ctx).await;
        events.on_session_start(&ctx).await;
        events.on_answer(&ctx).await;
        events.on_session_end(&ctx).await;
        events.on_session_remind(&ctx).await;
        events.on_session_expired(&ctx).await;
    }
}
