//! Inactivity auto-lock for the shopping app.
//!
//! [`AutoLockService`] owns the countdown and the locked/unlocked state,
//! [`LockStore`] is what screens observe, [`Session`] wires the two together
//! for a signed-in user and [`LockOverlay`] decides how a locked app is left.

pub mod activity;
pub mod autolock_service;
pub mod biometric;
pub mod config;
pub mod lifecycle;
pub mod listeners;
pub mod lock_state;
pub mod overlay;
pub mod session;
pub mod storage;

pub use activity::{ActivityHook, ActivityKind};
pub use autolock_service::{AutoLockService, DEFAULT_LOCK_TIMEOUT, LockStatus, MAX_LOCK_TIMEOUT};
pub use biometric::{
    BiometricAuthResult, BiometricAuthService, BiometricAuthenticator, BiometricAvailability, BiometricError,
    SimulatedBiometrics,
};
pub use config::AutoLockConfig;
pub use lifecycle::{AppState, LifecycleSignals};
pub use listeners::{ListenerId, LockListener};
pub use lock_state::{LockAction, LockState, LockStore};
pub use overlay::{LockOverlay, OverlayView, UnlockOutcome};
pub use session::Session;
pub use storage::{BestEffortStore, JsonFileStore, KeyValueStore, MemoryStore, StorageError};

use std::sync::Arc;

/// Builds the storage the configuration asks for: the configured file, or the
/// default location when none is set.
#[must_use]
pub fn open_storage(config: &AutoLockConfig) -> BestEffortStore {
    match &config.storage_path {
        Some(path) => BestEffortStore::new(Arc::new(JsonFileStore::new(path))),
        None => BestEffortStore::open_default(),
    }
}
