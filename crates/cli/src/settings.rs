use crate::utils::{format_duration, yes_no};
use color_eyre::Result;
use shoplock_autolock::storage::{APP_CURRENTLY_LOCKED_KEY, APP_LOCK_ENABLED_KEY};
use shoplock_autolock::{AutoLockConfig, AutoLockService, LifecycleSignals, open_storage};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub fn handle_status_command(config: &AutoLockConfig, config_path: &Path) -> Result<()> {
    let storage = open_storage(config);

    println!("Configuration:   {}", config_path.display());
    println!("Timeout:         {}", format_duration(config.timeout()));
    println!("Enable on login: {}", yes_no(config.enable_on_login));
    println!(
        "Storage:         {}",
        if storage.is_durable() { "persistent" } else { "in-memory only" }
    );
    if let Some(path) = &config.storage_path {
        println!("Storage file:    {}", path.display());
    }
    println!("Auto-lock:       {}", if storage.flag(APP_LOCK_ENABLED_KEY) { "enabled" } else { "disabled" });
    println!("Locked:          {}", yes_no(storage.flag(APP_CURRENTLY_LOCKED_KEY)));
    Ok(())
}

pub fn handle_enable_command(config: &AutoLockConfig) {
    let service = AutoLockService::with_timeout(open_storage(config), LifecycleSignals::new(), config.timeout());
    service.enable_lock();
    service.cleanup();
    println!("Auto-lock enabled ({} of inactivity).", format_duration(config.timeout()));
}

/// Disabling also drops a leftover "locked" flag so the next launch starts
/// unlocked.
pub fn handle_disable_command(config: &AutoLockConfig) {
    let storage = open_storage(config);
    let service = AutoLockService::with_timeout(storage.clone(), LifecycleSignals::new(), config.timeout());
    service.disable_lock();
    storage.remove(APP_CURRENTLY_LOCKED_KEY);
    println!("Auto-lock disabled.");
}

pub fn handle_reset_command(config: &AutoLockConfig) {
    open_storage(config).clear();
    println!("Stored lock state cleared.");
}

pub fn handle_config_command(
    mut config: AutoLockConfig,
    config_path: &Path,
    timeout: Option<Duration>,
    enable_on_login: Option<bool>,
    storage_path: Option<PathBuf>,
) -> Result<()> {
    let changed = timeout.is_some() || enable_on_login.is_some() || storage_path.is_some();

    if let Some(timeout) = timeout {
        config.timeout_seconds = timeout.as_secs();
    }
    if let Some(enable) = enable_on_login {
        config.enable_on_login = enable;
    }
    if let Some(path) = storage_path {
        config.storage_path = Some(path);
    }

    if changed {
        config.save(config_path)?;
        println!("Saved configuration to {}", config_path.display());
    }
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
