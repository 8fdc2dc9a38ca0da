//! Timer scheduling for conversation sessions.
//!
//! Expiry timers are one-shot; reminder timers are periodic and keep
//! firing until cancelled. Handles are owned by the session that created
//! them, and cancellation is idempotent: cancelling an already-fired or
//! already-cancelled handle is a no-op, not an error.

use futures::future::{AbortHandle, Abortable, BoxFuture};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;
use ulid::Ulid;

/// Unique handle for a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerId(Ulid);

impl TimerId {
    /// Creates a new timer ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for TimerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tmr_{}", self.0)
    }
}

/// The callback run when a one-shot timer fires. Consumed on fire.
pub type OneShotTask = BoxFuture<'static, ()>;

/// The callback factory run on every tick of a periodic timer.
pub type PeriodicTask = Box<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Trait for scheduling cancellable session timers.
pub trait TimerService: Send + Sync {
    /// Schedules a one-shot expiry callback to run after `after`.
    fn schedule_expire(&self, after: Duration, task: OneShotTask) -> TimerId;

    /// Schedules a periodic reminder callback, first firing after `every`
    /// and then once per period until cancelled.
    fn schedule_remind(&self, every: Duration, task: PeriodicTask) -> TimerId;

    /// Cancels a timer.
    ///
    /// Returns true if a pending timer was cancelled, false if the handle
    /// had already fired or was already cancelled. Either way the call is
    /// a no-op beyond that.
    fn cancel(&self, id: TimerId) -> bool;
}

type Registry = Arc<Mutex<HashMap<TimerId, AbortHandle>>>;

/// The default `TimerService`, one tokio task per timer.
///
/// A one-shot timer deregisters itself immediately before running its
/// callback, so a concurrent cancel either stops the callback entirely or
/// observes "already fired", never both.
#[derive(Default)]
pub struct TokioTimerService {
    registry: Registry,
}

impl TokioTimerService {
    /// Creates an empty timer service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of timers currently pending.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl TimerService for TokioTimerService {
    fn schedule_expire(&self, after: Duration, task: OneShotTask) -> TimerId {
        let id = TimerId::new();
        let (abort, registration) = AbortHandle::new_pair();

        // Register before spawning so the timer can never fire unseen.
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, abort);

        let registry = Arc::clone(&self.registry);
        tokio::spawn(Abortable::new(
            async move {
                tokio::time::sleep(after).await;

                // Deregister first: a cancel racing with this fire either
                // wins (entry gone, we stop) or sees "already fired".
                let armed = registry
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&id)
                    .is_some();
                if !armed {
                    return;
                }

                debug!(timer = %id, "expiry timer fired");
                task.await;
            },
            registration,
        ));

        id
    }

    fn schedule_remind(&self, every: Duration, task: PeriodicTask) -> TimerId {
        let id = TimerId::new();
        let (abort, registration) = AbortHandle::new_pair();

        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, abort);

        let registry = Arc::clone(&self.registry);
        tokio::spawn(Abortable::new(
            async move {
                loop {
                    tokio::time::sleep(every).await;

                    let armed = registry
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .contains_key(&id);
                    if !armed {
                        return;
                    }

                    debug!(timer = %id, "reminder timer fired");
                    task().await;
                }
            },
            registration,
        ));

        id
    }

    fn cancel(&self, id: TimerId) -> bool {
        let handle = self
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);

        match handle {
            Some(abort) => {
                abort.abort();
                debug!(timer = %id, "timer cancelled");
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_one_shot(counter: &Arc<AtomicUsize>) -> OneShotTask {
        let counter = Arc::clone(counter);
        Box::pin(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn counting_periodic(counter: &Arc<AtomicUsize>) -> PeriodicTask {
        let counter = Arc::clone(counter);
        Box::new(move || {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        })
    }

    #[tokio::test(start_paused = true)]
    async fn expire_fires_once() {
        let service = TokioTimerService::new();
        let counter = Arc::new(AtomicUsize::new(0));

        service.schedule_expire(Duration::from_secs(30), counting_one_shot(&counter));
        assert_eq!(service.pending(), 1);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(service.pending(), 0);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_before_fire_stops_the_timer() {
        let service = TokioTimerService::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let id = service.schedule_expire(Duration::from_secs(30), counting_one_shot(&counter));
        assert!(service.cancel(id));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_after_fire_reports_already_fired() {
        let service = TokioTimerService::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let id = service.schedule_expire(Duration::from_secs(10), counting_one_shot(&counter));
        tokio::time::sleep(Duration::from_secs(11)).await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!service.cancel(id));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_idempotent() {
        let service = TokioTimerService::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let id = service.schedule_expire(Duration::from_secs(30), counting_one_shot(&counter));
        assert!(service.cancel(id));
        assert!(!service.cancel(id));

        // Cancelling a handle that was never scheduled is also a no-op.
        assert!(!service.cancel(TimerId::new()));
    }

    #[tokio::test(start_paused = true)]
    async fn remind_fires_periodically_until_cancelled() {
        let service = TokioTimerService::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let id = service.schedule_remind(Duration::from_secs(30), counting_periodic(&counter));

        tokio::time::sleep(Duration::from_secs(95)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        assert!(service.cancel(id));
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn timers_are_independent() {
        let service = TokioTimerService::new();
        let expired = Arc::new(AtomicUsize::new(0));
        let reminded = Arc::new(AtomicUsize::new(0));

        let remind = service.schedule_remind(Duration::from_secs(30), counting_periodic(&reminded));
        service.schedule_expire(Duration::from_secs(70), counting_one_shot(&expired));

        tokio::time::sleep(Duration::from_secs(75)).await;
        assert_eq!(reminded.load(Ordering::SeqCst), 2);
        assert_eq!(expired.load(Ordering::SeqCst), 1);

        assert!(service.cancel(remind));
        assert_eq!(service.pending(), 0);
    }

    #[test]
    fn timer_id_display_format() {
        let id = TimerId::new();
        assert!(id.to_string().starts_with("tmr_"));
    }
}
