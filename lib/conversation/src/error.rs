//! Error types for the conversation crate.
//!
//! - `StoreError`: errors from session store operations
//! - `ConfigError`: plugin construction failures
//! - `EngineError`: errors surfaced by the engine's run loop

use crate::state::StateKey;
use colloquy_core::TriggerError;
use std::fmt;

/// Errors from session store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store failed.
    Backend { reason: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend { reason } => write!(f, "session store failed: {reason}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Plugin construction errors.
///
/// These are fatal: a plugin with a broken configuration never starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The state map does not contain the start key.
    MissingStartKey { key: StateKey },
    /// The state map is empty.
    EmptyStates,
    /// The trigger string was empty.
    EmptyTrigger,
    /// The trigger pattern failed to compile.
    InvalidTriggerPattern { pattern: String, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingStartKey { key } => {
                write!(f, "states do not contain start key '{key}'")
            }
            Self::EmptyStates => write!(f, "state map is empty"),
            Self::EmptyTrigger => write!(f, "trigger is empty"),
            Self::InvalidTriggerPattern { pattern, reason } => {
                write!(f, "invalid trigger pattern '{pattern}': {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<TriggerError> for ConfigError {
    fn from(err: TriggerError) -> Self {
        match err {
            TriggerError::Empty => Self::EmptyTrigger,
            TriggerError::InvalidPattern { pattern, reason } => {
                Self::InvalidTriggerPattern { pattern, reason }
            }
        }
    }
}

/// Errors surfaced by the engine's run loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A session store operation failed.
    Store(StoreError),
    /// A transition function returned a key not present in the state map.
    UnknownStateKey { key: StateKey },
    /// A chain of pass-through states exceeded the step limit.
    ///
    /// Pass-through cycles in the state graph are disallowed; this
    /// surfaces one instead of looping forever.
    PassThroughLimit { steps: usize },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(e) => write!(f, "engine store operation failed: {e}"),
            Self::UnknownStateKey { key } => {
                write!(f, "transition returned unknown state key '{key}'")
            }
            Self::PassThroughLimit { steps } => {
                write!(f, "pass-through chain exceeded {steps} steps")
            }
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}
