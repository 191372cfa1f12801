use crate::storage::{APP_LOCK_ENABLED_KEY, BestEffortStore, TRUE_VALUE};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

/// What the screens observe about the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LockState {
    pub is_locked: bool,
    pub lock_enabled: bool,
    pub is_biometric_available: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockAction {
    LockApp,
    UnlockApp,
    EnableLock,
    DisableLock,
    SetBiometricAvailable(bool),
}

impl LockState {
    /// Pure state transition; persistence is handled by `LockStore::dispatch`.
    #[must_use]
    pub const fn reduce(self, action: LockAction) -> Self {
        match action {
            LockAction::LockApp => Self {
                is_locked: true,
                ..self
            },
            LockAction::UnlockApp => Self {
                is_locked: false,
                ..self
            },
            LockAction::EnableLock => Self {
                lock_enabled: true,
                ..self
            },
            LockAction::DisableLock => Self {
                lock_enabled: false,
                is_locked: false,
                ..self
            },
            LockAction::SetBiometricAvailable(available) => Self {
                is_biometric_available: available,
                ..self
            },
        }
    }
}

/// Application-state container for the lock. The auto-lock service pushes
/// transitions in through a listener; screens read or watch it.
#[derive(Debug)]
pub struct LockStore {
    sender: watch::Sender<LockState>,
    storage: BestEffortStore,
}

impl LockStore {
    #[must_use]
    pub fn new(storage: BestEffortStore) -> Self {
        let initial = LockState {
            lock_enabled: storage.flag(APP_LOCK_ENABLED_KEY),
            ..LockState::default()
        };
        let (sender, _) = watch::channel(initial);
        Self { sender, storage }
    }

    pub fn dispatch(&self, action: LockAction) {
        match action {
            LockAction::EnableLock => self.storage.set(APP_LOCK_ENABLED_KEY, TRUE_VALUE),
            LockAction::DisableLock => self.storage.remove(APP_LOCK_ENABLED_KEY),
            _ => {}
        }

        self.sender.send_if_modified(|state| {
            let next = state.reduce(action);
            let changed = next != *state;
            *state = next;
            changed
        });
        debug!("Lock store handled {:?}", action);
    }

    #[must_use]
    pub fn state(&self) -> LockState {
        *self.sender.borrow()
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.sender.borrow().is_locked
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LockState> {
        self.sender.subscribe()
    }
}
