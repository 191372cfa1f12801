mod run;
mod settings;
mod utils;

use crate::run::handle_run_command;
use crate::settings::{
    handle_config_command, handle_disable_command, handle_enable_command, handle_reset_command, handle_status_command,
};
use crate::utils::parse_duration;
pub use crate::utils::init_tracing;
use clap::{Parser, Subcommand};
use color_eyre::Result;
use shoplock_autolock::{AutoLockConfig, SimulatedBiometrics};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "shoplock",
    about = "Inactivity auto-lock for the shopping app",
    long_about = "shoplock locks the app after a period of inactivity and whenever it leaves the \
                  foreground. The lock state survives restarts, so killing the app while locked \
                  does not get you past the lock screen.\n\n\
                  Quick start:\n\
                  1. shoplock config --timeout 30s   # Lock after 30 seconds of inactivity\n\
                  2. shoplock run --user emilys      # Interactive session\n\
                  3. shoplock status                 # Inspect the persisted lock state"
)]
pub struct Cli {
    /// Configuration file (defaults to <config dir>/shoplock/autolock.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Show debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the persisted lock flags and configuration
    Status,

    /// Turn auto-lock on
    Enable,

    /// Turn auto-lock off and clear any stored lock
    Disable,

    /// Forget every stored lock flag
    Reset,

    /// Show or change the configuration
    Config {
        /// Inactivity timeout, e.g. "10s", "2m"
        #[arg(short, long, value_parser = parse_duration)]
        timeout: Option<Duration>,
        /// Turn auto-lock on whenever a user signs in
        #[arg(long)]
        enable_on_login: Option<bool>,
        /// File where the lock flags are stored
        #[arg(long)]
        storage: Option<PathBuf>,
    },

    /// Start an interactive session driven by events typed on stdin
    Run {
        /// Signed-in user name
        #[arg(short, long, default_value = "guest")]
        user: String,
        /// Override the configured inactivity timeout, e.g. "5s"
        #[arg(short, long, value_parser = parse_duration)]
        timeout: Option<Duration>,
        /// Simulated biometric sensor: accept, deny, cancel, unavailable
        #[arg(short, long, default_value = "accept")]
        biometrics: SimulatedBiometrics,
    },
}

fn config_path(cli_path: Option<PathBuf>) -> Result<PathBuf> {
    match cli_path {
        Some(path) => Ok(path),
        None => AutoLockConfig::default_path(),
    }
}

/// Runs one CLI command.
///
/// # Errors
/// Returns an error if the configuration cannot be loaded or saved, or if
/// the interactive session fails to read its input.
pub async fn handle_command(cmd: Commands, config: Option<PathBuf>) -> Result<()> {
    let config_path = config_path(config)?;
    let config = AutoLockConfig::load(&config_path)?;

    match cmd {
        Commands::Status => handle_status_command(&config, &config_path)?,
        Commands::Enable => handle_enable_command(&config),
        Commands::Disable => handle_disable_command(&config),
        Commands::Reset => handle_reset_command(&config),
        Commands::Config {
            timeout,
            enable_on_login,
            storage,
        } => handle_config_command(config, &config_path, timeout, enable_on_login, storage)?,
        Commands::Run {
            user,
            timeout,
            biometrics,
        } => {
            let mut config = config;
            if let Some(timeout) = timeout {
                config.timeout_seconds = timeout.as_secs();
            }
            config.validate()?;
            handle_run_command(config, biometrics, user).await?;
        }
    }
    Ok(())
}
