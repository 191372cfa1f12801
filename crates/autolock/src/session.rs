use crate::autolock_service::AutoLockService;
use crate::listeners::ListenerId;
use crate::lock_state::{LockAction, LockStore};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::info;

#[derive(Debug, Default)]
struct SessionState {
    user: Option<String>,
    listener: Option<ListenerId>,
}

/// Ties the auto-lock service to the signed-in user. Logging in starts a fresh
/// lock session that mirrors every transition into the lock store; logging out
/// tears it down and makes sure nothing stays locked.
#[derive(Debug)]
pub struct Session {
    service: Arc<AutoLockService>,
    store: Arc<LockStore>,
    enable_on_login: bool,
    state: Mutex<SessionState>,
}

impl Session {
    pub fn new(service: Arc<AutoLockService>, store: Arc<LockStore>) -> Self {
        Self {
            service,
            store,
            enable_on_login: true,
            state: Mutex::new(SessionState::default()),
        }
    }

    #[must_use]
    pub fn with_enable_on_login(mut self, enable: bool) -> Self {
        self.enable_on_login = enable;
        self
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn login(&self, user: impl Into<String>) {
        let user = user.into();
        info!("User '{}' logged in, initializing auto-lock", user);

        if let Some(previous) = self.state().listener.take() {
            self.service.remove_listener(previous);
        }

        self.service.cleanup();
        self.service.initialize();
        if self.enable_on_login {
            self.service.enable_lock();
            self.store.dispatch(LockAction::EnableLock);
        }

        let store = Arc::clone(&self.store);
        let listener = self.service.add_listener(Arc::new(move |locked: bool| {
            store.dispatch(if locked {
                LockAction::LockApp
            } else {
                LockAction::UnlockApp
            });
        }));

        // `initialize` may already have locked before the listener existed.
        self.store.dispatch(if self.service.is_locked() {
            LockAction::LockApp
        } else {
            LockAction::UnlockApp
        });

        let mut state = self.state();
        state.user = Some(user);
        state.listener = Some(listener);
    }

    pub fn logout(&self) {
        let (user, listener) = {
            let mut state = self.state();
            (state.user.take(), state.listener.take())
        };
        if let Some(user) = user {
            info!("User '{}' logged out, cleaning up auto-lock", user);
        }

        if let Some(listener) = listener {
            self.service.remove_listener(listener);
        }
        self.service.cleanup();
        self.service.disable_lock();
        self.store.dispatch(LockAction::DisableLock);
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state().user.is_some()
    }

    #[must_use]
    pub fn user(&self) -> Option<String> {
        self.state().user.clone()
    }

    #[must_use]
    pub const fn service(&self) -> &Arc<AutoLockService> {
        &self.service
    }

    #[must_use]
    pub const fn store(&self) -> &Arc<LockStore> {
        &self.store
    }
}
