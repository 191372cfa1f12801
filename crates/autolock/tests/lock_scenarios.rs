use shoplock_autolock::storage::{APP_CURRENTLY_LOCKED_KEY, APP_LOCK_ENABLED_KEY, TRUE_VALUE};
use shoplock_autolock::{
    ActivityKind, AppState, AutoLockService, BestEffortStore, BiometricAuthService, JsonFileStore, KeyValueStore,
    LifecycleSignals, LockOverlay, LockStore, Session, SimulatedBiometrics, StorageError, UnlockOutcome,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

fn create_service() -> Arc<AutoLockService> {
    AutoLockService::new(BestEffortStore::in_memory(), LifecycleSignals::new())
}

fn record_transitions(service: &AutoLockService) -> Arc<Mutex<Vec<(bool, Instant)>>> {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&calls);
    service.add_listener(Arc::new(move |locked: bool| {
        sink.lock().unwrap().push((locked, Instant::now()));
    }));
    calls
}

/// Device storage that rejects writes. With `readable` set, reads succeed
/// and find nothing, as with a read-only file; otherwise every call fails.
struct FailingStore {
    readable: bool,
}

impl KeyValueStore for FailingStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        if self.readable {
            Ok(None)
        } else {
            Err(StorageError::Unavailable("device store offline".to_string()))
        }
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("device store offline".to_string()))
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("device store offline".to_string()))
    }

    fn clear(&self) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("device store offline".to_string()))
    }
}

async fn advance(millis: u64) {
    tokio::time::sleep(Duration::from_millis(millis)).await;
    tokio::task::yield_now().await;
}

#[tokio::test(start_paused = true)]
async fn test_activity_at_0_4_7_locks_at_17_seconds() {
    let service = create_service();
    service.enable_lock();
    let calls = record_transitions(&service);
    let start = Instant::now();

    service.record_activity(ActivityKind::Touch);
    advance(4_000).await;
    service.record_activity(ActivityKind::KeyboardShown);
    advance(3_000).await;
    service.record_activity(ActivityKind::Navigation);

    advance(9_990).await;
    assert!(!service.is_locked());

    advance(20).await;
    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let (locked, at) = calls[0];
    assert!(locked);
    assert_eq!(at - start, Duration::from_secs(17));
}

#[tokio::test(start_paused = true)]
async fn test_unlock_after_auto_lock_schedules_new_countdown() {
    let service = create_service();
    service.enable_lock();
    let calls = record_transitions(&service);

    advance(10_500).await;
    assert!(service.is_locked());
    assert!(!service.has_pending_timer());

    let unlocked_at = Instant::now();
    service.unlock();
    {
        let calls = calls.lock().unwrap();
        assert_eq!(calls.iter().filter(|(locked, _)| !locked).count(), 1);
    }
    assert_eq!(service.time_until_lock(), Some(service.lock_timeout()));

    advance(10_500).await;
    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[2].1 - unlocked_at, Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_background_signal_locks_without_waiting() {
    let service = create_service();
    service.initialize();
    service.enable_lock();
    service.reset_lock_timer();

    service.lifecycle().publish(AppState::Background);
    advance(1).await;
    assert!(service.is_locked());

    service.lifecycle().publish(AppState::Active);
    advance(1).await;
    assert!(service.is_locked());
    assert!(!service.has_pending_timer());
}

#[tokio::test(start_paused = true)]
async fn test_failing_storage_never_blocks_transitions() {
    for readable in [false, true] {
        let storage = BestEffortStore::new(Arc::new(FailingStore { readable }));
        let service = AutoLockService::new(storage.clone(), LifecycleSignals::new());
        let calls = record_transitions(&service);

        service.enable_lock();
        assert!(storage.flag(APP_LOCK_ENABLED_KEY));

        advance(10_500).await;
        assert!(service.is_locked());
        assert!(storage.flag(APP_CURRENTLY_LOCKED_KEY));

        service.unlock();
        assert!(!service.is_locked());
        assert_eq!(storage.get(APP_CURRENTLY_LOCKED_KEY), None);
        assert!(service.has_pending_timer());
        {
            let calls = calls.lock().unwrap();
            let states: Vec<bool> = calls.iter().map(|(locked, _)| *locked).collect();
            assert_eq!(states, vec![true, false]);
        }

        service.lock();
        service.cleanup();
        service.initialize();
        assert!(service.is_locked());
        assert!(service.is_lock_enabled());
        assert!(storage.flag(APP_CURRENTLY_LOCKED_KEY));

        service.unlock();
        assert!(service.has_pending_timer());
        service.cleanup();
    }
}

#[tokio::test(start_paused = true)]
async fn test_relaunch_after_kill_while_locked() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("storage.json");

    {
        let storage = BestEffortStore::new(Arc::new(JsonFileStore::new(&path)));
        let service = AutoLockService::new(storage, LifecycleSignals::new());
        service.lock();
    }

    let storage = BestEffortStore::new(Arc::new(JsonFileStore::new(&path)));
    assert!(storage.flag(APP_CURRENTLY_LOCKED_KEY));
    let service = AutoLockService::with_timeout(storage, LifecycleSignals::new(), Duration::from_secs(600));
    service.initialize();
    assert!(service.is_locked());
}

#[tokio::test(start_paused = true)]
async fn test_full_session_with_biometric_unlock() {
    let storage = BestEffortStore::in_memory();
    let service = AutoLockService::new(storage.clone(), LifecycleSignals::new());
    let store = Arc::new(LockStore::new(storage.clone()));
    let session = Arc::new(Session::new(Arc::clone(&service), Arc::clone(&store)));
    let overlay = LockOverlay::new(
        Arc::clone(&session),
        BiometricAuthService::new(Arc::new(SimulatedBiometrics::Accept)),
    );

    session.login("emilys");
    let hook = service.activity_hook().unwrap();
    advance(9_000).await;
    hook.notify();
    advance(9_000).await;
    assert!(!overlay.is_visible());

    advance(1_001).await;
    assert!(overlay.is_visible());
    assert!(storage.flag(APP_CURRENTLY_LOCKED_KEY));

    assert_eq!(overlay.handle_unlock().await, UnlockOutcome::Unlocked);
    assert!(!overlay.is_visible());
    assert!(!storage.flag(APP_CURRENTLY_LOCKED_KEY));

    session.logout();
    assert!(!service.is_lock_enabled());
    assert_eq!(storage.get(APP_CURRENTLY_LOCKED_KEY), None);
}

#[tokio::test]
async fn test_global_instance_is_shared() {
    let storage = BestEffortStore::in_memory();
    storage.set(APP_CURRENTLY_LOCKED_KEY, TRUE_VALUE);
    let installed = AutoLockService::new(storage, LifecycleSignals::new());

    AutoLockService::install_global(Arc::clone(&installed)).unwrap();
    let first = AutoLockService::global();
    let second = AutoLockService::global();
    assert!(Arc::ptr_eq(&first, &installed));
    assert!(Arc::ptr_eq(&first, &second));
    assert!(AutoLockService::install_global(create_service()).is_err());

    first.initialize();
    assert!(second.is_locked());
    first.cleanup();
}
