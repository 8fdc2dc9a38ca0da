//! Message fan-out to the registered plugins.
//!
//! The dispatcher is the glue between a transport adapter and the
//! plugin set. Every inbound message is offered to all plugins in
//! registration order; a failing plugin is logged and never blocks the
//! rest.

use crate::plugin::Plugin;
use colloquy_core::{Message, Transport};
use std::sync::Arc;
use tracing::{debug, warn};

/// Owns the transport handle and the registered plugins.
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    plugins: Vec<Plugin>,
}

impl Dispatcher {
    /// Creates a dispatcher around a transport adapter.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            plugins: Vec::new(),
        }
    }

    /// Registers a plugin. Dispatch order is registration order.
    pub fn register(&mut self, plugin: impl Into<Plugin>) {
        let plugin = plugin.into();
        debug!(plugin = plugin.name(), "plugin registered");
        self.plugins.push(plugin);
    }

    /// Returns the registered plugin names, in dispatch order.
    #[must_use]
    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(Plugin::name).collect()
    }

    /// Runs every plugin's init hook once, in registration order.
    ///
    /// Call before the first [`dispatch`](Self::dispatch).
    pub async fn init(&self) {
        for plugin in &self.plugins {
            plugin.on_init(&self.transport).await;
        }
    }

    /// Offers a message to every plugin, in registration order.
    ///
    /// Each plugin decides for itself whether the message concerns it;
    /// several plugins may act on the same message. Plugin errors are
    /// logged and swallowed so one broken plugin cannot starve the rest.
    pub async fn dispatch(&self, msg: &Message) {
        for plugin in &self.plugins {
            if let Err(e) = plugin.on_text(&self.transport, msg).await {
                warn!(plugin = plugin.name(), error = %e, "plugin failed on message");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactor::{ReactorContext, ReactorEvents, ReactorPlugin};
    use async_trait::async_trait;
    use colloquy_core::{Chat, RecordingTransport, User};
    use std::sync::{Mutex, PoisonError};

    struct Tagger {
        tag: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl ReactorEvents for Tagger {
        async fn on_bot_init(&self, _ctx: &ReactorContext) {
            self.record("init");
        }

        async fn on_text(&self, _ctx: &ReactorContext) {
            self.record("text");
        }
    }

    impl Tagger {
        fn record(&self, event: &str) {
            self.log
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(format!("{}:{event}", self.tag));
        }
    }

    fn msg(text: &str) -> Message {
        Message::new("m1", text, User::new("u1", "Alice"), Chat::new("c1"))
    }

    fn tagged(
        name: &'static str,
        trigger: &str,
        log: &Arc<Mutex<Vec<String>>>,
    ) -> Arc<ReactorPlugin> {
        ReactorPlugin::new(
            name,
            trigger,
            Arc::new(Tagger {
                tag: name,
                log: Arc::clone(log),
            }),
        )
        .expect("valid trigger")
    }

    #[tokio::test]
    async fn init_and_dispatch_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let transport = Arc::new(RecordingTransport::new()) as Arc<dyn Transport>;

        let mut dispatcher = Dispatcher::new(transport);
        dispatcher.register(tagged("first", "regexp ^hello", &log));
        dispatcher.register(tagged("second", "regexp hello", &log));
        dispatcher.register(tagged("third", "goodbye", &log));

        dispatcher.init().await;
        dispatcher.dispatch(&msg("hello there")).await;

        // All three init in order; the first two both match the message.
        assert_eq!(
            log.lock().unwrap_or_else(PoisonError::into_inner).clone(),
            vec![
                "first:init",
                "second:init",
                "third:init",
                "first:text",
                "second:text"
            ]
        );
        assert_eq!(
            dispatcher.plugin_names(),
            vec!["first", "second", "third"]
        );
    }

    #[tokio::test]
    async fn unmatched_message_reaches_no_plugin() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let transport = Arc::new(RecordingTransport::new()) as Arc<dyn Transport>;

        let mut dispatcher = Dispatcher::new(transport);
        dispatcher.register(tagged("only", "exact", &log));

        dispatcher.dispatch(&msg("something else")).await;

        assert!(log.lock().unwrap_or_else(PoisonError::into_inner).is_empty());
    }
}
