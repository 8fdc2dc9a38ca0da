//! Stateless reactor plugins.
//!
//! A reactor pairs a trigger with a callback and keeps no per-user
//! state: every matching message fires the callback independently.

use async_trait::async_trait;
use colloquy_core::{Message, Transport, Trigger, TriggerError, User};
use std::sync::Arc;

/// What a reactor callback can see.
pub struct ReactorContext {
    /// Name of the owning plugin.
    pub plugin: String,
    /// Outbound capability borrowed from the transport adapter.
    pub bot: Arc<dyn Transport>,
    /// The sender, absent for the init hook.
    pub user: Option<User>,
    /// The matching message, absent for the init hook.
    pub message: Option<Message>,
}

/// Callbacks of a reactor plugin. Both hooks default to no-ops.
#[async_trait]
pub trait ReactorEvents: Send + Sync {
    /// Fired once at startup, before any messages are dispatched.
    async fn on_bot_init(&self, _ctx: &ReactorContext) {}

    /// Fired for every message whose text matches the trigger.
    async fn on_text(&self, _ctx: &ReactorContext) {}
}

/// A trigger-to-callback plugin with no session state.
pub struct ReactorPlugin {
    name: String,
    trigger: Trigger,
    events: Arc<dyn ReactorEvents>,
}

impl std::fmt::Debug for ReactorPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactorPlugin")
            .field("name", &self.name)
            .field("trigger", &self.trigger)
            .finish_non_exhaustive()
    }
}

impl ReactorPlugin {
    /// Builds a reactor from its name, raw trigger string, and callbacks.
    ///
    /// The trigger follows the usual syntax: plain text for exact match,
    /// a `"regexp "` prefix for pattern mode.
    pub fn new(
        name: impl Into<String>,
        trigger: &str,
        events: Arc<dyn ReactorEvents>,
    ) -> Result<Arc<Self>, TriggerError> {
        Ok(Arc::new(Self {
            name: name.into(),
            trigger: Trigger::parse(trigger)?,
            events,
        }))
    }

    /// Returns the plugin name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fired once at startup.
    pub async fn on_init(&self, bot: &Arc<dyn Transport>) {
        let ctx = self.ctx(bot, None, None);
        self.events.on_bot_init(&ctx).await;
    }

    /// Fires the callback iff the message text matches the trigger.
    pub async fn on_text(&self, bot: &Arc<dyn Transport>, msg: &Message) {
        if !self.trigger.matches(&msg.text) {
            return;
        }
        let ctx = self.ctx(bot, Some(msg.sender.clone()), Some(msg.clone()));
        self.events.on_text(&ctx).await;
    }

    fn ctx(
        &self,
        bot: &Arc<dyn Transport>,
        user: Option<User>,
        message: Option<Message>,
    ) -> ReactorContext {
        ReactorContext {
            plugin: self.name.clone(),
            bot: Arc::clone(bot),
            user,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colloquy_core::{Chat, RecordingTransport};
    use std::sync::Mutex;
    use std::sync::PoisonError;

    struct Echo {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ReactorEvents for Echo {
        async fn on_text(&self, ctx: &ReactorContext) {
            let text = ctx.message.as_ref().map_or("", |m| m.text.as_str());
            self.seen
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(text.to_string());
            if let Some(user) = &ctx.user {
                let _ = ctx.bot.send("pong", user, None).await;
            }
        }
    }

    fn msg(text: &str) -> Message {
        Message::new("m1", text, User::new("u1", "Alice"), Chat::new("c1"))
    }

    #[tokio::test]
    async fn fires_only_on_matching_text() {
        let events = Arc::new(Echo {
            seen: Mutex::new(Vec::new()),
        });
        let plugin =
            ReactorPlugin::new("ping", "regexp ^/ping", Arc::clone(&events) as _).expect("valid");
        let bot = Arc::new(RecordingTransport::new());
        let transport = Arc::clone(&bot) as Arc<dyn Transport>;

        plugin.on_text(&transport, &msg("/ping now")).await;
        plugin.on_text(&transport, &msg("hello")).await;

        assert_eq!(
            events
                .seen
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            vec!["/ping now"]
        );
        assert_eq!(bot.texts(), vec!["pong"]);
    }

    #[tokio::test]
    async fn rejects_invalid_trigger() {
        let events = Arc::new(Echo {
            seen: Mutex::new(Vec::new()),
        });
        let err = ReactorPlugin::new("bad", "regexp [oops", events as _).expect_err("bad pattern");
        assert!(matches!(err, TriggerError::InvalidPattern { .. }));
    }
}
