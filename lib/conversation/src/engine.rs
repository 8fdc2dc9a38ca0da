//! The conversational engine.
//!
//! A per-user finite-state machine that drives multi-step dialogues,
//! persists progress between messages through a [`SessionStore`], and
//! manages reminder/expiry timers through a
//! [`TimerService`](colloquy_timer::TimerService).
//!
//! Message handling and timer callbacks are serialized per user: all
//! engine operations for one user are mutually exclusive, while
//! operations for different users proceed in parallel.

use crate::error::{ConfigError, EngineError};
use crate::events::{ConversationEvents, EventContext};
use crate::session::Session;
use crate::state::{State, StateContext, StateKey, Transition};
use crate::store::{MemorySessionStore, SessionStore};
use colloquy_core::{Message, Transport, Trigger, User, UserId};
use colloquy_timer::{TimerId, TimerService, TokioTimerService};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Configuration for a conversational plugin.
///
/// Construction validates it: `states` must contain `start_key`, the
/// trigger must be non-empty and, in pattern mode, must compile. A zero
/// duration disables the corresponding timer.
pub struct ConversationalConfig {
    /// Plugin name, used in logs and event contexts.
    pub name: String,
    /// Raw trigger string; `"regexp "` prefix selects pattern mode.
    pub trigger: String,
    /// The state graph.
    pub states: HashMap<StateKey, State>,
    /// Where new sessions begin.
    pub start_key: StateKey,
    /// Lifecycle hooks.
    pub events: Arc<dyn ConversationEvents>,
    /// Session persistence; defaults to [`MemorySessionStore`].
    pub store: Option<Arc<dyn SessionStore>>,
    /// Timer scheduling; defaults to
    /// [`TokioTimerService`](colloquy_timer::TokioTimerService).
    pub timers: Option<Arc<dyn TimerService>>,
    /// Reminder period; zero disables reminders.
    pub remind_every: Duration,
    /// Inactivity expiry; zero disables expiry.
    pub expire_after: Duration,
}

/// Timer handles for one live session.
///
/// Kept engine-side rather than in the serialized [`Session`] so durable
/// stores stay swappable. An entry exists iff the session is live.
///
/// `epoch` increments on every reset. A fired one-shot has already left
/// the timer service's registry, so cancelling its handle is a no-op;
/// the epoch is what lets a firing that lost the lock race to a reset
/// recognize it was superseded and stand down.
#[derive(Debug, Default)]
struct SessionTimers {
    remind: Option<TimerId>,
    expire: Option<TimerId>,
    epoch: u64,
}

/// Per-user exclusive regions.
#[derive(Default)]
struct UserLocks {
    inner: Mutex<HashMap<UserId, Arc<tokio::sync::Mutex<()>>>>,
}

impl UserLocks {
    fn for_user(&self, user: &UserId) -> Arc<tokio::sync::Mutex<()>> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(user.clone())
            .or_default()
            .clone()
    }
}

/// A stateful plugin: trigger, state graph, session lifecycle, timers.
pub struct ConversationalPlugin {
    name: String,
    trigger: Trigger,
    states: HashMap<StateKey, State>,
    start_key: StateKey,
    events: Arc<dyn ConversationEvents>,
    store: Arc<dyn SessionStore>,
    timers: Arc<dyn TimerService>,
    remind_every: Option<Duration>,
    expire_after: Option<Duration>,
    session_timers: Mutex<HashMap<UserId, SessionTimers>>,
    locks: UserLocks,
    // Handed to timer callbacks; a Weak so outstanding timers never keep
    // a dropped plugin alive.
    weak: Weak<Self>,
}

impl std::fmt::Debug for ConversationalPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationalPlugin")
            .field("name", &self.name)
            .field("trigger", &self.trigger)
            .field("start_key", &self.start_key)
            .finish_non_exhaustive()
    }
}

impl ConversationalPlugin {
    /// Builds a plugin from its configuration.
    ///
    /// Fails fast on a broken configuration; nothing here is recoverable
    /// at runtime.
    pub fn new(config: ConversationalConfig) -> Result<Arc<Self>, ConfigError> {
        if config.states.is_empty() {
            return Err(ConfigError::EmptyStates);
        }
        if !config.states.contains_key(&config.start_key) {
            return Err(ConfigError::MissingStartKey {
                key: config.start_key,
            });
        }
        let trigger = Trigger::parse(&config.trigger)?;

        let non_zero = |d: Duration| if d.is_zero() { None } else { Some(d) };

        Ok(Arc::new_cyclic(|weak| Self {
            name: config.name,
            trigger,
            states: config.states,
            start_key: config.start_key,
            events: config.events,
            store: config
                .store
                .unwrap_or_else(|| Arc::new(MemorySessionStore::new())),
            timers: config
                .timers
                .unwrap_or_else(|| Arc::new(TokioTimerService::new())),
            remind_every: non_zero(config.remind_every),
            expire_after: non_zero(config.expire_after),
            session_timers: Mutex::new(HashMap::new()),
            locks: UserLocks::default(),
            weak: weak.clone(),
        }))
    }

    /// Returns the plugin name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the session store this plugin persists through.
    #[must_use]
    pub fn store(&self) -> Arc<dyn SessionStore> {
        Arc::clone(&self.store)
    }

    /// Fired once at startup, before any messages are dispatched.
    pub async fn on_init(&self, bot: &Arc<dyn Transport>) {
        let ctx = self.event_ctx(bot, None, None, None);
        self.events.on_bot_init(&ctx).await;
    }

    /// Entry point per inbound message.
    ///
    /// The engine runs iff the trigger matches the text or a session
    /// already exists for the sender; otherwise the message is ignored by
    /// this plugin.
    #[instrument(skip_all, fields(plugin = %self.name, user = %msg.sender.id))]
    pub async fn on_text(&self, bot: &Arc<dyn Transport>, msg: &Message) -> Result<(), EngineError> {
        let triggered = self.trigger.matches(&msg.text);
        if !triggered && self.store.get(&msg.sender.id).await?.is_none() {
            return Ok(());
        }

        let lock = self.locks.for_user(&msg.sender.id);
        let _guard = lock.lock().await;

        // The session may have expired while we waited for the lock; a
        // non-trigger message must not revive it.
        if !triggered && self.store.get(&msg.sender.id).await?.is_none() {
            return Ok(());
        }

        self.run(bot, msg.clone()).await
    }

    /// One full pass of the state machine for a message.
    ///
    /// Pass-through states re-enter the loop with a synthetic empty-text
    /// message instead of recursing; the step guard turns a pass-through
    /// cycle into [`EngineError::PassThroughLimit`] rather than an
    /// infinite loop.
    async fn run(&self, bot: &Arc<dyn Transport>, mut msg: Message) -> Result<(), EngineError> {
        let user = msg.sender.clone();
        let max_steps = self.states.len() + 1;

        for _ in 0..max_steps {
            let state = match self.store.get(&user.id).await? {
                None => {
                    let session = Session::new(user.id.clone(), self.start_key.clone());
                    self.store.set(&user.id, session.clone()).await?;
                    debug!(session = %session.id, "session started");

                    let ctx = self.event_ctx(
                        bot,
                        Some(user.clone()),
                        Some(msg.clone()),
                        Some(session),
                    );
                    self.events.on_session_start(&ctx).await;

                    self.state_for(&self.start_key)?
                }
                Some(session) => {
                    let state = self.state_for(&session.current_state_key)?;
                    if state.finish {
                        // Teardown happens on entry to a session already
                        // sitting on a terminal state, never on the
                        // message that moved it there.
                        self.end_session(bot, &msg, session).await?;
                        return Ok(());
                    }

                    let ctx = self.state_ctx(bot, &user, &msg, session.clone());
                    match state.handler.next_key(&ctx).await {
                        Transition::Stay => {
                            // Silent retry: nothing recorded, no event
                            // fired, but the rejection still counts as
                            // activity for the timers.
                            self.reset_timers(bot, &user);
                            return Ok(());
                        }
                        Transition::Advance(next) => {
                            let next_state = self.state_for(&next)?;

                            let mut session = session;
                            session.record_answer(&msg);
                            self.store.set(&user.id, session.clone()).await?;

                            let ctx = self.event_ctx(
                                bot,
                                Some(user.clone()),
                                Some(msg.clone()),
                                Some(session.clone()),
                            );
                            self.events.on_answer(&ctx).await;

                            debug!(
                                from = %session.current_state_key,
                                to = %next,
                                "transition accepted"
                            );
                            session.current_state_key = next;
                            self.store.set(&user.id, session).await?;

                            next_state
                        }
                    }
                }
            };

            // Send-question step, shared by the start and transition
            // paths: push the timers back, ask, then either wait for the
            // user or fall through to the next automatic state.
            self.reset_timers(bot, &user);

            let Some(session) = self.store.get(&user.id).await? else {
                return Ok(());
            };
            let ctx = self.state_ctx(bot, &user, &msg, session);
            state.handler.send_question(&ctx).await;

            if state.wait_for_answer {
                return Ok(());
            }
            msg.text.clear();
        }

        Err(EngineError::PassThroughLimit { steps: max_steps })
    }

    /// Tears down a session that has reached a terminal state.
    async fn end_session(
        &self,
        bot: &Arc<dyn Transport>,
        msg: &Message,
        session: Session,
    ) -> Result<(), EngineError> {
        debug!(session = %session.id, "session ended");

        let ctx = self.event_ctx(
            bot,
            Some(msg.sender.clone()),
            Some(msg.clone()),
            Some(session.clone()),
        );
        self.events.on_session_end(&ctx).await;

        self.cancel_timers(&session.user_id);
        self.store.delete(&session.user_id).await?;
        Ok(())
    }

    /// Cancels and drops both timer handles for a user.
    fn cancel_timers(&self, user: &UserId) {
        let entry = self
            .session_timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(user);

        if let Some(timers) = entry {
            if let Some(id) = timers.remind {
                self.timers.cancel(id);
            }
            if let Some(id) = timers.expire {
                self.timers.cancel(id);
            }
        }
    }

    /// Cancel-then-reschedules both timers against "now".
    fn reset_timers(&self, bot: &Arc<dyn Transport>, user: &User) {
        if self.remind_every.is_none() && self.expire_after.is_none() {
            return;
        }

        let mut map = self
            .session_timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let entry = map.entry(user.id.clone()).or_default();
        entry.epoch += 1;
        let epoch = entry.epoch;

        if let Some(every) = self.remind_every {
            if let Some(old) = entry.remind.take() {
                self.timers.cancel(old);
            }
            let plugin = self.weak.clone();
            let bot = Arc::clone(bot);
            let user = user.clone();
            entry.remind = Some(self.timers.schedule_remind(
                every,
                Box::new(move || {
                    let plugin = plugin.clone();
                    let bot = Arc::clone(&bot);
                    let user = user.clone();
                    let task: colloquy_timer::OneShotTask = Box::pin(async move {
                        if let Some(plugin) = plugin.upgrade() {
                            plugin.fire_remind(bot, user, epoch).await;
                        }
                    });
                    task
                }),
            ));
        }

        if let Some(after) = self.expire_after {
            if let Some(old) = entry.expire.take() {
                self.timers.cancel(old);
            }
            let plugin = self.weak.clone();
            let bot = Arc::clone(bot);
            let user = user.clone();
            entry.expire = Some(self.timers.schedule_expire(
                after,
                Box::pin(async move {
                    if let Some(plugin) = plugin.upgrade() {
                        plugin.fire_expire(bot, user, epoch).await;
                    }
                }),
            ));
        }
    }

    /// Whether a timer firing scheduled at `epoch` is still the live one.
    ///
    /// False when a reset superseded it while the firing waited on the
    /// user lock, or when the session (and its entry) is already gone.
    fn timer_epoch_is_current(&self, user: &UserId, epoch: u64) -> bool {
        self.session_timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user)
            .is_some_and(|t| t.epoch == epoch)
    }

    /// Reminder tick. Never mutates the current state key.
    async fn fire_remind(self: Arc<Self>, bot: Arc<dyn Transport>, user: User, epoch: u64) {
        let lock = self.locks.for_user(&user.id);
        let _guard = lock.lock().await;

        if !self.timer_epoch_is_current(&user.id, epoch) {
            return;
        }

        let session = match self.store.get(&user.id).await {
            Ok(Some(session)) => session,
            // The session ended between scheduling and firing.
            Ok(None) => return,
            Err(e) => {
                warn!(plugin = %self.name, error = %e, "remind: session lookup failed");
                return;
            }
        };

        debug!(plugin = %self.name, session = %session.id, "reminder fired");
        let ctx = self.event_ctx(&bot, Some(user), None, Some(session));
        self.events.on_session_remind(&ctx).await;
    }

    /// Expiry. Deletes the session before the plugin's callback can
    /// observe it, and stops the reminder first.
    async fn fire_expire(self: Arc<Self>, bot: Arc<dyn Transport>, user: User, epoch: u64) {
        let lock = self.locks.for_user(&user.id);
        let _guard = lock.lock().await;

        // An expiry that fired while a message held the lock may have
        // been superseded by that message's reset; a stale firing must
        // not take down the refreshed session.
        if !self.timer_epoch_is_current(&user.id, epoch) {
            return;
        }

        let session = match self.store.get(&user.id).await {
            Ok(Some(session)) => session,
            Ok(None) => return,
            Err(e) => {
                warn!(plugin = %self.name, error = %e, "expire: session lookup failed");
                return;
            }
        };

        self.cancel_timers(&user.id);

        if let Err(e) = self.store.delete(&user.id).await {
            warn!(plugin = %self.name, error = %e, "expire: session delete failed");
            return;
        }
        debug!(plugin = %self.name, session = %session.id, "session expired");

        let ctx = self.event_ctx(&bot, Some(user), None, Some(session));
        self.events.on_session_expired(&ctx).await;
    }

    fn state_for(&self, key: &StateKey) -> Result<State, EngineError> {
        self.states
            .get(key)
            .cloned()
            .ok_or_else(|| EngineError::UnknownStateKey { key: key.clone() })
    }

    fn event_ctx(
        &self,
        bot: &Arc<dyn Transport>,
        user: Option<User>,
        message: Option<Message>,
        session: Option<Session>,
    ) -> EventContext {
        EventContext {
            plugin: self.name.clone(),
            bot: Arc::clone(bot),
            user,
            message,
            session,
        }
    }

    fn state_ctx(
        &self,
        bot: &Arc<dyn Transport>,
        user: &User,
        message: &Message,
        session: Session,
    ) -> StateContext {
        StateContext {
            plugin: self.name.clone(),
            bot: Arc::clone(bot),
            user: user.clone(),
            message: message.clone(),
            session,
        }
    }
}

impl Drop for ConversationalPlugin {
    fn drop(&mut self) {
        let entries = self
            .session_timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect::<Vec<_>>();

        for (_, timers) in entries {
            if let Some(id) = timers.remind {
                self.timers.cancel(id);
            }
            if let Some(id) = timers.expire {
                self.timers.cancel(id);
            }
        }
    }
}
