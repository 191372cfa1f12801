use crate::autolock_service::AutoLockService;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Source of a user-activity signal. Every kind resets the inactivity timer
/// the same way; the kind only shows up in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Touch,
    KeyboardShown,
    KeyboardHidden,
    Navigation,
    Foreground,
    Other,
}

impl ActivityKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ActivityKind::Touch => "touch",
            ActivityKind::KeyboardShown => "keyboard_shown",
            ActivityKind::KeyboardHidden => "keyboard_hidden",
            ActivityKind::Navigation => "navigation",
            ActivityKind::Foreground => "foreground",
            ActivityKind::Other => "other",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "touch" | "tap" | "press" | "scroll" => Ok(ActivityKind::Touch),
            "key" | "keyboard" | "keyboard_shown" | "keyboard-show" => Ok(ActivityKind::KeyboardShown),
            "keyboard_hidden" | "keyboard-hide" => Ok(ActivityKind::KeyboardHidden),
            "nav" | "navigation" | "navigate" => Ok(ActivityKind::Navigation),
            "foreground" => Ok(ActivityKind::Foreground),
            "other" | "activity" => Ok(ActivityKind::Other),
            other => Err(format!("unknown activity: {other}")),
        }
    }
}

/// Cheap, cloneable entry point handed to UI event handlers. Calling it only
/// restarts the inactivity countdown; it never consumes or delays the event
/// that triggered it.
#[derive(Clone)]
pub struct ActivityHook {
    service: Arc<AutoLockService>,
}

impl ActivityHook {
    pub const fn new(service: Arc<AutoLockService>) -> Self {
        Self { service }
    }

    pub fn notify(&self) {
        self.service.record_activity(ActivityKind::Other);
    }

    pub fn record(&self, kind: ActivityKind) {
        self.service.record_activity(kind);
    }
}

impl fmt::Debug for ActivityHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityHook").finish_non_exhaustive()
    }
}
