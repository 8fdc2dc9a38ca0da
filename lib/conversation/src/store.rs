//! Pluggable session persistence.
//!
//! The engine reads and writes sessions through this trait only, so the
//! default in-memory map can be swapped for a durable store without
//! engine changes. Store operations are fallible; the engine surfaces
//! failures to its caller rather than silently losing session state.

use crate::error::StoreError;
use crate::session::Session;
use async_trait::async_trait;
use colloquy_core::UserId;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Trait for session storage, keyed by user.
///
/// Implementations need not serialize concurrent mutation for the same
/// key; the engine already holds a per-user exclusive region around every
/// operation.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Looks up the session for a user.
    async fn get(&self, user: &UserId) -> Result<Option<Session>, StoreError>;

    /// Writes the session for a user, replacing any previous one.
    async fn set(&self, user: &UserId, session: Session) -> Result<(), StoreError>;

    /// Deletes the session for a user. Deleting a missing session is not
    /// an error.
    async fn delete(&self, user: &UserId) -> Result<(), StoreError>;
}

/// The default in-memory store: a map with no eviction beyond explicit
/// delete. Created with the plugin, torn down with it.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<UserId, Session>>,
}

impl MemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if no session is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, user: &UserId) -> Result<Option<Session>, StoreError> {
        Ok(self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user)
            .cloned())
    }

    async fn set(&self, user: &UserId, session: Session) -> Result<(), StoreError> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user.clone(), session);
        Ok(())
    }

    async fn delete(&self, user: &UserId) -> Result<(), StoreError> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(user);
        Ok(())
    }
}
