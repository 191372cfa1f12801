use crate::activity::{ActivityHook, ActivityKind};
use crate::lifecycle::{AppState, LifecycleSignals};
use crate::listeners::{ListenerId, ListenerRegistry, LockListener, notify_all};
use crate::storage::{APP_CURRENTLY_LOCKED_KEY, APP_LOCK_ENABLED_KEY, BestEffortStore, FALSE_VALUE, TRUE_VALUE};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, trace, warn};

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest accepted inactivity timeout; larger values are clamped.
pub const MAX_LOCK_TIMEOUT: Duration = Duration::from_secs(7 * 24 * 60 * 60);

static GLOBAL_SERVICE: OnceLock<Arc<AutoLockService>> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockTrigger {
    Manual,
    Timer(u64),
    Lifecycle(AppState),
    Restore,
}

/// The single countdown owned by the service.
#[derive(Debug)]
struct ScheduledLock {
    generation: u64,
    deadline: Instant,
    handle: JoinHandle<()>,
}

#[derive(Debug)]
struct ServiceState {
    is_locked: bool,
    lock_enabled: bool,
    timeout: Duration,
    timer: Option<ScheduledLock>,
    timer_generation: u64,
    listeners: ListenerRegistry,
    lifecycle_task: Option<JoinHandle<()>>,
    last_activity: Option<DateTime<Utc>>,
    locked_at: Option<DateTime<Utc>>,
}

impl ServiceState {
    fn clear_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.handle.abort();
        }
    }

    fn detach_lifecycle(&mut self) {
        if let Some(task) = self.lifecycle_task.take() {
            task.abort();
        }
    }
}

/// Point-in-time view of the service, for status output.
#[derive(Debug, Clone, Serialize)]
pub struct LockStatus {
    pub is_locked: bool,
    pub lock_enabled: bool,
    pub timeout_seconds: f64,
    pub seconds_until_lock: Option<f64>,
    pub listener_count: usize,
    pub lifecycle_attached: bool,
    pub last_activity: Option<DateTime<Utc>>,
    pub locked_at: Option<DateTime<Utc>>,
}

/// Inactivity auto-lock.
///
/// Tracks user activity, lifecycle transitions and a single countdown, and
/// decides when the app must show its lock screen. State changes are pushed to
/// registered listeners in registration order. The internal mutex is never
/// held while listeners run, so a listener may call back into `lock`,
/// `unlock` or any other method.
///
/// Timers are tokio tasks; scheduling outside a tokio runtime is skipped with
/// a warning.
#[derive(Debug)]
pub struct AutoLockService {
    state: Mutex<ServiceState>,
    store: BestEffortStore,
    lifecycle: LifecycleSignals,
    weak_self: Weak<AutoLockService>,
}

impl AutoLockService {
    /// Creates a service reading the persisted "lock enabled" flag from
    /// `store`. No timer is started and no lifecycle subscription is made
    /// until `initialize` is called.
    pub fn new(store: BestEffortStore, lifecycle: LifecycleSignals) -> Arc<Self> {
        Self::with_timeout(store, lifecycle, DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_timeout(store: BestEffortStore, lifecycle: LifecycleSignals, timeout: Duration) -> Arc<Self> {
        let lock_enabled = store.flag(APP_LOCK_ENABLED_KEY);
        let timeout = clamp_timeout(timeout);
        Arc::new_cyclic(|weak_self| Self {
            state: Mutex::new(ServiceState {
                is_locked: false,
                lock_enabled,
                timeout,
                timer: None,
                timer_generation: 0,
                listeners: ListenerRegistry::new(),
                lifecycle_task: None,
                last_activity: None,
                locked_at: None,
            }),
            store,
            lifecycle,
            weak_self: weak_self.clone(),
        })
    }

    /// Process-wide instance, created on first access with the default
    /// file-backed storage.
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL_SERVICE.get_or_init(|| Self::new(BestEffortStore::open_default(), LifecycleSignals::new())))
    }

    /// Installs `service` as the process-wide instance. Fails, handing the
    /// service back, if one was already created or installed.
    ///
    /// # Errors
    /// Returns the rejected service when the global slot is already taken.
    pub fn install_global(service: Arc<Self>) -> Result<(), Arc<Self>> {
        GLOBAL_SERVICE.set(service)
    }

    fn state(&self) -> MutexGuard<'_, ServiceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub const fn lifecycle(&self) -> &LifecycleSignals {
        &self.lifecycle
    }

    #[must_use]
    pub const fn store(&self) -> &BestEffortStore {
        &self.store
    }

    /// Hook for UI event handlers to report that the user is present.
    #[must_use]
    pub fn activity_hook(&self) -> Option<ActivityHook> {
        self.weak_self.upgrade().map(ActivityHook::new)
    }

    /// Restarts the countdown from zero. Does nothing while locked or while
    /// auto-lock is disabled.
    pub fn reset_lock_timer(&self) {
        let mut state = self.state();
        if state.is_locked {
            return;
        }
        self.start_timer(&mut state);
    }

    fn start_timer(&self, state: &mut ServiceState) {
        state.clear_timer();
        if !state.lock_enabled {
            return;
        }

        let Ok(runtime) = Handle::try_current() else {
            warn!("No async runtime available, auto-lock timer not scheduled");
            return;
        };

        let Some(deadline) = Instant::now().checked_add(state.timeout) else {
            warn!("Auto-lock timeout {:?} is out of range, timer not scheduled", state.timeout);
            return;
        };
        state.timer_generation += 1;
        let generation = state.timer_generation;
        let service = self.weak_self.clone();

        let handle = runtime.spawn(async move {
            sleep_until(deadline).await;
            if let Some(service) = service.upgrade() {
                service.apply_lock(LockTrigger::Timer(generation));
            }
        });

        trace!("Auto-lock timer #{} scheduled in {:?}", generation, state.timeout);
        state.timer = Some(ScheduledLock {
            generation,
            deadline,
            handle,
        });
    }

    /// Locks now, whether or not auto-lock is enabled.
    pub fn lock(&self) {
        self.apply_lock(LockTrigger::Manual);
    }

    fn apply_lock(&self, trigger: LockTrigger) {
        let listeners = {
            let mut state = self.state();
            if state.is_locked {
                return;
            }

            if let LockTrigger::Timer(generation) = trigger {
                // A countdown that was replaced after it had already woken up.
                if state.timer.as_ref().map(|timer| timer.generation) != Some(generation) {
                    debug!("Ignoring stale auto-lock timer #{}", generation);
                    return;
                }
                // This is the running task itself, so drop the handle rather than abort it.
                state.timer = None;
            } else {
                state.clear_timer();
            }

            state.is_locked = true;
            state.locked_at = Some(Utc::now());
            // Written under the state lock so the stored flag follows the
            // order of transitions across threads.
            self.store.set(APP_CURRENTLY_LOCKED_KEY, TRUE_VALUE);
            state.listeners.snapshot()
        };

        match trigger {
            LockTrigger::Manual => info!("App locked"),
            LockTrigger::Timer(_) => info!("Auto-lock triggered due to inactivity"),
            LockTrigger::Lifecycle(app_state) => info!("App locked on transition to {}", app_state),
            LockTrigger::Restore => info!("App locked on startup (restored lock state)"),
        }

        notify_all(&listeners, true);
    }

    /// Leaves the locked state and, if auto-lock is still enabled, starts a
    /// fresh countdown right away.
    pub fn unlock(&self) {
        let listeners = {
            let mut state = self.state();
            if !state.is_locked {
                return;
            }
            state.is_locked = false;
            state.locked_at = None;
            self.store.remove(APP_CURRENTLY_LOCKED_KEY);
            state.listeners.snapshot()
        };

        info!("App unlocked");
        notify_all(&listeners, false);
        self.reset_lock_timer();
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.state().is_locked
    }

    #[must_use]
    pub fn is_lock_enabled(&self) -> bool {
        self.state().lock_enabled
    }

    pub fn enable_lock(&self) {
        {
            let mut state = self.state();
            self.store.set(APP_LOCK_ENABLED_KEY, TRUE_VALUE);
            state.lock_enabled = true;
        }
        info!("Auto-lock enabled");
        self.reset_lock_timer();
    }

    /// Turns auto-lock off, cancelling any countdown and releasing a current
    /// lock so the app can never stay stuck behind the lock screen.
    pub fn disable_lock(&self) {
        {
            let mut state = self.state();
            self.store.set(APP_LOCK_ENABLED_KEY, FALSE_VALUE);
            state.lock_enabled = false;
            state.clear_timer();
        }
        info!("Auto-lock disabled");
        self.unlock();
    }

    /// Changes the inactivity timeout, clamped to [`MAX_LOCK_TIMEOUT`]. A
    /// running countdown restarts with the new value.
    pub fn set_lock_timeout(&self, timeout: Duration) {
        let timeout = clamp_timeout(timeout);
        let mut state = self.state();
        state.timeout = timeout;
        debug!("Auto-lock timeout set to {:?}", timeout);
        if !state.is_locked && state.lock_enabled {
            self.start_timer(&mut state);
        }
    }

    #[must_use]
    pub fn lock_timeout(&self) -> Duration {
        self.state().timeout
    }

    pub fn add_listener(&self, listener: LockListener) -> ListenerId {
        self.state().listeners.add(listener)
    }

    /// Returns `true` if the listener was registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.state().listeners.remove(id)
    }

    /// Removes every registration of this callback. Returns how many were removed.
    pub fn remove_listener_callback(&self, listener: &LockListener) -> usize {
        self.state().listeners.remove_callback(listener)
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.state().listeners.len()
    }

    /// Reacts to a lifecycle transition: leaving the foreground locks at once
    /// when auto-lock is enabled, coming back restarts the countdown.
    ///
    /// Only automatic locking is gated on the enabled flag. [`Self::lock`]
    /// is an explicit request and locks whether or not auto-lock is on.
    pub fn handle_app_state_change(&self, app_state: AppState) {
        if app_state.is_hidden() {
            if !self.is_lock_enabled() {
                debug!("Ignoring transition to {}, auto-lock is disabled", app_state);
                return;
            }
            self.apply_lock(LockTrigger::Lifecycle(app_state));
        } else {
            self.reset_lock_timer();
        }
    }

    /// Activity from any UI source; equivalent to `reset_lock_timer`.
    pub fn record_activity(&self, kind: ActivityKind) {
        trace!("User activity: {}", kind);
        self.state().last_activity = Some(Utc::now());
        self.reset_lock_timer();
    }

    /// Prepares the service for a session: attaches to lifecycle signals and
    /// re-derives the lock state from storage. A persisted "was locked" flag or
    /// an enabled lock means the session starts locked, so killing the process
    /// while locked cannot be used to get past the lock screen.
    pub fn initialize(&self) {
        self.attach_lifecycle();

        let was_locked = self.store.flag(APP_CURRENTLY_LOCKED_KEY);
        let lock_enabled = self.store.flag(APP_LOCK_ENABLED_KEY);
        self.state().lock_enabled = lock_enabled;
        debug!(
            "Initializing auto-lock (was_locked={}, lock_enabled={})",
            was_locked, lock_enabled
        );

        if was_locked || lock_enabled {
            self.apply_lock(LockTrigger::Restore);
        } else {
            self.reset_lock_timer();
        }
    }

    /// Cancels the countdown, detaches from lifecycle signals and drops every
    /// listener. Persisted flags and the current lock state are kept so a
    /// later `initialize` resumes correctly.
    pub fn cleanup(&self) {
        let mut state = self.state();
        state.clear_timer();
        state.detach_lifecycle();
        state.listeners.clear();
        debug!("Auto-lock service cleaned up");
    }

    fn attach_lifecycle(&self) {
        let mut state = self.state();
        if state.lifecycle_task.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        let Ok(runtime) = Handle::try_current() else {
            warn!("No async runtime available, lifecycle signals not attached");
            return;
        };

        // Subscribe before spawning so a transition published right after
        // `initialize` returns is not missed.
        let mut receiver = self.lifecycle.subscribe();
        let service = self.weak_self.clone();
        state.lifecycle_task = Some(runtime.spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(app_state) => {
                        let Some(service) = service.upgrade() else {
                            break;
                        };
                        service.handle_app_state_change(app_state);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Missed {} lifecycle signals", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }));
    }

    #[must_use]
    pub fn is_lifecycle_attached(&self) -> bool {
        self.state()
            .lifecycle_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    #[must_use]
    pub fn has_pending_timer(&self) -> bool {
        self.state().timer.is_some()
    }

    /// Remaining time on the countdown, `None` when no countdown is running.
    #[must_use]
    pub fn time_until_lock(&self) -> Option<Duration> {
        self.state()
            .timer
            .as_ref()
            .map(|timer| timer.deadline.saturating_duration_since(Instant::now()))
    }

    #[must_use]
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.state().last_activity
    }

    #[must_use]
    pub fn status(&self) -> LockStatus {
        let state = self.state();
        LockStatus {
            is_locked: state.is_locked,
            lock_enabled: state.lock_enabled,
            timeout_seconds: state.timeout.as_secs_f64(),
            seconds_until_lock: state
                .timer
                .as_ref()
                .map(|timer| timer.deadline.saturating_duration_since(Instant::now()).as_secs_f64()),
            listener_count: state.listeners.len(),
            lifecycle_attached: state.lifecycle_task.as_ref().is_some_and(|task| !task.is_finished()),
            last_activity: state.last_activity,
            locked_at: state.locked_at,
        }
    }
}

fn clamp_timeout(timeout: Duration) -> Duration {
    if timeout > MAX_LOCK_TIMEOUT {
        warn!("Auto-lock timeout {:?} exceeds the maximum, using {:?}", timeout, MAX_LOCK_TIMEOUT);
        MAX_LOCK_TIMEOUT
    } else {
        timeout
    }
}

impl Drop for AutoLockService {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        state.clear_timer();
        state.detach_lifecycle();
    }
}
