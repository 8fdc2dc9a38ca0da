//! Conversational state machine for the colloquy framework.
//!
//! This crate provides:
//!
//! - **State Graph**: keyed states with question side effects and
//!   author-owned transition functions
//! - **Session Model**: per-user progress through a plugin's state graph
//! - **Session Store**: pluggable persistence, in-memory by default
//! - **Events**: lifecycle hooks a plugin's business code implements
//! - **Engine**: the per-user state machine driving multi-step dialogues,
//!   with reminder and expiry timers

pub mod engine;
pub mod error;
pub mod events;
pub mod session;
pub mod state;
pub mod store;

pub use engine::{ConversationalConfig, ConversationalPlugin};
pub use error::{ConfigError, EngineError, StoreError};
pub use events::{ConversationEvents, EventContext, NoEvents};
pub use session::{Session, UserAnswer};
pub use state::{State, StateContext, StateHandler, StateKey, Transition};
pub use store::{MemorySessionStore, SessionStore};
