use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::sync::broadcast;
use tracing::debug;

const CHANNEL_CAPACITY: usize = 16;

/// Coarse foreground/background state reported by the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppState {
    Active,
    Background,
    Inactive,
}

impl AppState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            AppState::Active => "active",
            AppState::Background => "background",
            AppState::Inactive => "inactive",
        }
    }

    /// Whether the app is leaving the foreground, which forces an immediate lock.
    #[must_use]
    pub const fn is_hidden(self) -> bool {
        matches!(self, AppState::Background | AppState::Inactive)
    }
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" | "foreground" | "fg" => Ok(AppState::Active),
            "background" | "bg" => Ok(AppState::Background),
            "inactive" => Ok(AppState::Inactive),
            other => Err(format!("unknown app state: {other}")),
        }
    }
}

/// Broadcast source of lifecycle transitions. The host publishes, the lock
/// service subscribes while a session is initialized.
#[derive(Debug, Clone)]
pub struct LifecycleSignals {
    sender: broadcast::Sender<AppState>,
}

impl LifecycleSignals {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publishes a transition. Returns how many subscribers received it.
    pub fn publish(&self, state: AppState) -> usize {
        let delivered = self.sender.send(state).unwrap_or(0);
        debug!("App state changed to {} ({} subscribers)", state, delivered);
        delivered
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AppState> {
        self.sender.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for LifecycleSignals {
    fn default() -> Self {
        Self::new()
    }
}
