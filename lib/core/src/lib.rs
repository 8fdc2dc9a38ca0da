//! Core domain types and utilities for the colloquy plugin framework.
//!
//! This crate provides the foundational types shared by every other crate:
//! strongly-typed IDs, the normalized message model consumed from the
//! transport adapter, the outbound transport capability, and trigger
//! matching for plugin activation.

pub mod id;
pub mod message;
pub mod transport;
pub mod trigger;

pub use id::{ChatId, MessageId, ParseIdError, SessionId, UserId};
pub use message::{Chat, Message, User};
pub use transport::{RecordingTransport, SentMessage, Transport, TransportError};
pub use trigger::{Trigger, TriggerError};
