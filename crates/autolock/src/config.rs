use color_eyre::Result;
use color_eyre::eyre::eyre;
use crate::autolock_service::MAX_LOCK_TIMEOUT;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoLockConfig {
    /// Inactivity threshold before the app locks (in seconds)
    pub timeout_seconds: u64,

    /// Turn auto-lock on whenever a user logs in
    pub enable_on_login: bool,

    /// Where the lock flags are persisted; `None` uses the platform config dir
    pub storage_path: Option<PathBuf>,
}

impl Default for AutoLockConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            enable_on_login: true,
            storage_path: None,
        }
    }
}

impl AutoLockConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Loads the configuration from `<config_dir>/shoplock/autolock.json`,
    /// falling back to defaults when the file does not exist yet.
    ///
    /// # Errors
    /// Returns an error if the config directory cannot be determined, or the
    /// file exists but cannot be read or parsed.
    pub fn load_default() -> Result<Self> {
        Self::load(&Self::default_path()?)
    }

    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if it sets a zero timeout.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// Returns an error if the config directory cannot be determined or written.
    pub fn save_default(&self) -> Result<()> {
        self.save(&Self::default_path()?)
    }

    /// # Errors
    /// Returns an error if the configuration is invalid or cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// # Errors
    /// Returns an error if the platform has no configuration directory.
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::config_dir().ok_or_else(|| eyre!("No config directory found"))?;
        Ok(base.join("shoplock").join("autolock.json"))
    }

    /// # Errors
    /// Returns an error for a zero timeout, which would lock on every event,
    /// or one longer than [`MAX_LOCK_TIMEOUT`].
    pub fn validate(&self) -> Result<()> {
        if self.timeout_seconds == 0 {
            return Err(eyre!("Auto-lock timeout must be at least one second"));
        }
        if self.timeout() > MAX_LOCK_TIMEOUT {
            return Err(eyre!(
                "Auto-lock timeout must not exceed {} seconds",
                MAX_LOCK_TIMEOUT.as_secs()
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AutoLockConfig::default();
        assert_eq!(config.timeout_seconds, 10);
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert!(config.enable_on_login);
        assert!(config.storage_path.is_none());
    }

    #[test]
    fn test_load_missing_file_returns_default() {
        let temp_dir = TempDir::new().unwrap();
        let config = AutoLockConfig::load(&temp_dir.path().join("autolock.json")).unwrap();
        assert_eq!(config, AutoLockConfig::default());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("conf").join("autolock.json");
        let config = AutoLockConfig {
            timeout_seconds: 45,
            enable_on_login: false,
            storage_path: Some(temp_dir.path().join("storage.json")),
        };

        config.save(&path).unwrap();
        let loaded = AutoLockConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults_for_missing_fields() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("autolock.json");
        fs::write(&path, r#"{ "timeout_seconds": 30 }"#).unwrap();

        let config = AutoLockConfig::load(&path).unwrap();
        assert_eq!(config.timeout_seconds, 30);
        assert!(config.enable_on_login);
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("autolock.json");
        fs::write(&path, r#"{ "timeout_seconds": 0 }"#).unwrap();

        assert!(AutoLockConfig::load(&path).is_err());
        let config = AutoLockConfig {
            timeout_seconds: 0,
            ..AutoLockConfig::default()
        };
        assert!(config.save(&path).is_err());
    }

    #[test]
    fn test_oversized_timeout_is_rejected() {
        let config = AutoLockConfig {
            timeout_seconds: u64::MAX,
            ..AutoLockConfig::default()
        };
        assert!(config.validate().is_err());

        let config = AutoLockConfig {
            timeout_seconds: MAX_LOCK_TIMEOUT.as_secs(),
            ..AutoLockConfig::default()
        };
        assert!(config.validate().is_ok());
    }
}
