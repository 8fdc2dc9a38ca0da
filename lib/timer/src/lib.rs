//! Cancellable session timers for the colloquy framework.
//!
//! This crate provides:
//!
//! - **TimerService**: the scheduling contract: one-shot expiry timers,
//!   periodic reminder timers, idempotent cancellation
//! - **TokioTimerService**: the default implementation on tokio tasks

pub mod service;

pub use service::{OneShotTask, PeriodicTask, TimerId, TimerService, TokioTimerService};
