use crate::utils::{format_duration, yes_no};
use color_eyre::Result;
use shoplock_autolock::{
    ActivityKind, AppState, AutoLockConfig, AutoLockService, BiometricAuthService, LifecycleSignals, LockOverlay,
    LockState, LockStore, Session, SimulatedBiometrics, UnlockOutcome, open_storage,
};
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

/// One line typed into an interactive session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Activity(ActivityKind),
    Lifecycle(AppState),
    Lock,
    Unlock,
    SignOut,
    SignIn,
    Status,
    Help,
    Quit,
}

impl FromStr for SessionEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let event = match s.trim().to_lowercase().as_str() {
            "lock" => SessionEvent::Lock,
            "unlock" => SessionEvent::Unlock,
            "logout" | "signout" | "sign-out" => SessionEvent::SignOut,
            "login" | "signin" | "sign-in" => SessionEvent::SignIn,
            "status" | "st" => SessionEvent::Status,
            "help" | "?" => SessionEvent::Help,
            "quit" | "exit" | "q" => SessionEvent::Quit,
            other => {
                if let Ok(app_state) = other.parse::<AppState>() {
                    SessionEvent::Lifecycle(app_state)
                } else {
                    SessionEvent::Activity(other.parse::<ActivityKind>()?)
                }
            }
        };
        Ok(event)
    }
}

fn print_help() {
    println!("Events:");
    println!("  touch | key | nav          user activity (restarts the countdown)");
    println!("  active | background | inactive   app lifecycle transitions");
    println!("  lock | unlock              lock now / unlock via biometrics");
    println!("  logout | login             end or start the session");
    println!("  status                     show the current lock state");
    println!("  quit                       leave");
}

fn print_lock_state(state: LockState) {
    if state.is_locked {
        println!("🔒 Session Expired");
        println!("   Your session has expired for security reasons. Please sign in again to continue.");
        if state.is_biometric_available {
            println!("   Type 'unlock' to unlock with biometrics, or 'logout' to sign in again.");
        } else {
            println!("   Type 'logout' to sign in again.");
        }
    } else {
        println!("🔓 Unlocked");
    }
}

fn print_status(service: &AutoLockService, session: &Session) {
    let status = service.status();
    println!("User:            {}", session.user().unwrap_or_else(|| "(signed out)".to_string()));
    println!("Locked:          {}", yes_no(status.is_locked));
    println!("Auto-lock:       {}", if status.lock_enabled { "enabled" } else { "disabled" });
    println!("Timeout:         {}", format_duration(service.lock_timeout()));
    match service.time_until_lock() {
        Some(remaining) => println!("Locks in:        {}", format_duration(remaining)),
        None => println!("Locks in:        -"),
    }
    println!("Listeners:       {}", status.listener_count);
    println!("Lifecycle feed:  {}", yes_no(status.lifecycle_attached));
}

/// Runs an interactive session: signs `user` in, then feeds events typed on
/// stdin into the lock subsystem until `quit` or end of input.
///
/// # Errors
/// Returns an error if reading from stdin fails.
pub async fn handle_run_command(config: AutoLockConfig, biometrics: SimulatedBiometrics, user: String) -> Result<()> {
    let storage = open_storage(&config);
    let service = AutoLockService::with_timeout(storage.clone(), LifecycleSignals::new(), config.timeout());
    if AutoLockService::install_global(Arc::clone(&service)).is_err() {
        warn!("A global auto-lock service already exists; this session uses its own instance");
    }

    let store = Arc::new(LockStore::new(storage));
    let session = Arc::new(
        Session::new(Arc::clone(&service), Arc::clone(&store)).with_enable_on_login(config.enable_on_login),
    );
    let overlay = LockOverlay::new(
        Arc::clone(&session),
        BiometricAuthService::new(Arc::new(biometrics)),
    );

    let mut watcher = store.subscribe();
    let printer = tokio::spawn(async move {
        let mut last_locked = watcher.borrow_and_update().is_locked;
        while watcher.changed().await.is_ok() {
            let state = *watcher.borrow_and_update();
            if state.is_locked != last_locked {
                last_locked = state.is_locked;
                print_lock_state(state);
            }
        }
    });

    overlay.refresh_biometrics().await;
    session.login(user.clone());
    println!(
        "Signed in as '{}'. Auto-lock after {} of inactivity.",
        user,
        format_duration(service.lock_timeout())
    );
    print_help();

    let Some(hook) = service.activity_hook() else {
        printer.abort();
        return Ok(());
    };
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let event = match line.parse::<SessionEvent>() {
            Ok(event) => event,
            Err(e) => {
                println!("{e} (type 'help' for the list of events)");
                continue;
            }
        };
        debug!("Session event: {:?}", event);

        match event {
            SessionEvent::Activity(kind) => hook.record(kind),
            SessionEvent::Lifecycle(app_state) => {
                service.lifecycle().publish(app_state);
            }
            SessionEvent::Lock => service.lock(),
            SessionEvent::Unlock => {
                if !overlay.is_visible() {
                    println!("Not locked.");
                    continue;
                }
                match overlay.handle_unlock().await {
                    UnlockOutcome::Unlocked => {}
                    UnlockOutcome::SessionEnded => println!("Signed out. Type 'login' to sign in again."),
                }
            }
            SessionEvent::SignOut => {
                if overlay.is_visible() {
                    overlay.handle_session_end();
                } else {
                    session.logout();
                }
                println!("Signed out. Type 'login' to sign in again.");
            }
            SessionEvent::SignIn => {
                if session.is_authenticated() {
                    println!("Already signed in.");
                } else {
                    session.login(user.clone());
                    println!("Signed in as '{user}'.");
                }
            }
            SessionEvent::Status => print_status(&service, &session),
            SessionEvent::Help => print_help(),
            SessionEvent::Quit => break,
        }
    }

    // Leaving without logging out keeps the persisted flags, like a killed app.
    service.cleanup();
    printer.abort();
    Ok(())
}
