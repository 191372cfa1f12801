use crate::biometric::{BiometricAuthService, UNLOCK_PROMPT};
use crate::lock_state::LockAction;
use crate::session::Session;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

pub const OVERLAY_TITLE: &str = "Session Expired";
pub const OVERLAY_SUBTITLE: &str = "Your session has expired for security reasons. Please sign in again to continue.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverlayView {
    pub title: &'static str,
    pub subtitle: &'static str,
    pub show_biometric_button: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOutcome {
    Unlocked,
    SessionEnded,
}

/// Blocking lock screen. Visible whenever the lock store says the app is
/// locked; leaves either through a successful biometric check or by ending
/// the session.
#[derive(Debug)]
pub struct LockOverlay {
    session: Arc<Session>,
    biometrics: BiometricAuthService,
}

impl LockOverlay {
    pub const fn new(session: Arc<Session>, biometrics: BiometricAuthService) -> Self {
        Self { session, biometrics }
    }

    /// Re-checks the sensor and records the answer in the lock store.
    pub async fn refresh_biometrics(&self) -> bool {
        let available = self.biometrics.is_available().await;
        self.session
            .store()
            .dispatch(LockAction::SetBiometricAvailable(available));
        available
    }

    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.session.store().is_locked()
    }

    #[must_use]
    pub fn view(&self) -> Option<OverlayView> {
        let state = self.session.store().state();
        state.is_locked.then_some(OverlayView {
            title: OVERLAY_TITLE,
            subtitle: OVERLAY_SUBTITLE,
            show_biometric_button: state.is_biometric_available,
        })
    }

    pub async fn handle_unlock(&self) -> UnlockOutcome {
        if self.refresh_biometrics().await {
            let result = self.biometrics.authenticate(UNLOCK_PROMPT).await;
            if result.success {
                self.session.service().unlock();
                return UnlockOutcome::Unlocked;
            }
            info!(
                "Biometric unlock failed ({}), ending session",
                result.error.as_deref().unwrap_or("rejected")
            );
        }
        self.handle_session_end();
        UnlockOutcome::SessionEnded
    }

    /// Forces a sign-out. Unlocks first so the overlay cannot reappear on top
    /// of the login screen.
    pub fn handle_session_end(&self) {
        self.session.service().unlock();
        self.session.logout();
    }
}
