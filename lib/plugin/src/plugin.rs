//! The plugin sum type the dispatcher works against.

use crate::reactor::ReactorPlugin;
use colloquy_conversation::{ConversationalPlugin, EngineError};
use colloquy_core::{Message, Transport};
use std::sync::Arc;

/// A registered plugin, of either kind.
#[derive(Clone)]
pub enum Plugin {
    /// A per-user state machine with sessions and timers.
    Conversational(Arc<ConversationalPlugin>),
    /// A stateless trigger-to-callback plugin.
    Reactor(Arc<ReactorPlugin>),
}

impl Plugin {
    /// Returns the plugin name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Conversational(p) => p.name(),
            Self::Reactor(p) => p.name(),
        }
    }

    /// Fired once at startup.
    pub async fn on_init(&self, bot: &Arc<dyn Transport>) {
        match self {
            Self::Conversational(p) => p.on_init(bot).await,
            Self::Reactor(p) => p.on_init(bot).await,
        }
    }

    /// Offers an inbound message to the plugin.
    ///
    /// Reactor plugins cannot fail; conversational plugins surface
    /// engine errors.
    pub async fn on_text(&self, bot: &Arc<dyn Transport>, msg: &Message) -> Result<(), EngineError> {
        match self {
            Self::Conversational(p) => p.on_text(bot, msg).await,
            Self::Reactor(p) => {
                p.on_text(bot, msg).await;
                Ok(())
            }
        }
    }
}

impl From<Arc<ConversationalPlugin>> for Plugin {
    fn from(p: Arc<ConversationalPlugin>) -> Self {
        Self::Conversational(p)
    }
}

impl From<Arc<ReactorPlugin>> for Plugin {
    fn from(p: Arc<ReactorPlugin>) -> Self {
        Self::Reactor(p)
    }
}
