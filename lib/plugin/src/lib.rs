//! Plugin kinds and message dispatch.
//!
//! Two plugin shapes share the dispatcher:
//! - Conversational: a per-user state machine with sessions and timers
//!   (see `colloquy-conversation`).
//! - Reactor: a stateless trigger-to-callback mapping for one-shot
//!   commands.
//!
//! The [`Dispatcher`] owns the transport and the registered plugins and
//! fans every inbound message out to all of them in registration order.

mod dispatcher;
mod plugin;
mod reactor;

pub use dispatcher::Dispatcher;
pub use plugin::Plugin;
pub use reactor::{ReactorContext, ReactorEvents, ReactorPlugin};
