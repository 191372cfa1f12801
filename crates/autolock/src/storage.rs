use color_eyre::Result;
use color_eyre::eyre::eyre;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// Key under which the "auto-lock enabled" flag is persisted.
pub const APP_LOCK_ENABLED_KEY: &str = "app_lock_enabled";

/// Key under which the "app was locked" flag is persisted, so a relaunch after
/// the process died while locked comes back locked.
pub const APP_CURRENTLY_LOCKED_KEY: &str = "app_currently_locked";

pub const TRUE_VALUE: &str = "true";
pub const FALSE_VALUE: &str = "false";

#[derive(Debug)]
pub enum StorageError {
    Unavailable(String),
    Io(std::io::Error),
    Corrupted(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Unavailable(msg) => write!(f, "storage unavailable: {msg}"),
            StorageError::Io(err) => write!(f, "storage I/O error: {err}"),
            StorageError::Corrupted(msg) => write!(f, "storage file is corrupted: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err)
    }
}

/// String-keyed persistent store used for the lock flags.
pub trait KeyValueStore: Send + Sync {
    /// # Errors
    /// Returns an error when the backing storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// # Errors
    /// Returns an error when the backing storage cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// # Errors
    /// Returns an error when the backing storage cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// # Errors
    /// Returns an error when the backing storage cannot be written.
    fn clear(&self) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.values().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.values().clear();
        Ok(())
    }
}

/// A flat JSON object on disk. Every mutation rewrites the whole file; the
/// store only ever holds a handful of flags.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    /// Store located at `<config_dir>/shoplock/storage.json`.
    ///
    /// # Errors
    /// Returns an error if the platform has no configuration directory.
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(Self::default_path()?))
    }

    /// # Errors
    /// Returns an error if the platform has no configuration directory.
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::config_dir().ok_or_else(|| eyre!("No config directory found"))?;
        Ok(base.join("shoplock").join("storage.json"))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<HashMap<String, String>, StorageError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }
        serde_json::from_str(&content).map_err(|e| StorageError::Corrupted(e.to_string()))
    }

    fn write_all(&self, values: &HashMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(values).map_err(|e| StorageError::Corrupted(e.to_string()))?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut HashMap<String, String>)) -> Result<(), StorageError> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let mut values = self.read_all()?;
        f(&mut values);
        self.write_all(&values)
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read_all()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.update(|values| {
            values.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.update(|values| {
            values.remove(key);
        })
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.update(HashMap::clear)
    }
}

/// Values the backend failed to take. `None` marks a key whose removal
/// failed; `backend_cleared` hides everything the backend still holds after a
/// failed `clear`.
#[derive(Debug, Default)]
struct Overrides {
    entries: HashMap<String, Option<String>>,
    backend_cleared: bool,
}

/// Wraps a store so that failures never escape. A failing write is logged and
/// kept in memory instead, and reads prefer those in-memory values over the
/// backend, which keeps the lock flags consistent for the rest of the process
/// even when durability is lost.
#[derive(Clone)]
pub struct BestEffortStore {
    inner: Option<Arc<dyn KeyValueStore>>,
    overrides: Arc<Mutex<Overrides>>,
}

impl BestEffortStore {
    pub fn new(inner: Arc<dyn KeyValueStore>) -> Self {
        Self {
            inner: Some(inner),
            overrides: Arc::default(),
        }
    }

    /// A store with no durable backend at all.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            inner: None,
            overrides: Arc::default(),
        }
    }

    /// File store at the default location, or memory only when the platform
    /// gives us nowhere to write.
    #[must_use]
    pub fn open_default() -> Self {
        match JsonFileStore::open_default() {
            Ok(store) => {
                debug!("Using lock flag storage at {}", store.path().display());
                Self::new(Arc::new(store))
            }
            Err(e) => {
                warn!("Persistent storage unavailable, using in-memory fallback: {}", e);
                Self::in_memory()
            }
        }
    }

    #[must_use]
    pub const fn is_durable(&self) -> bool {
        self.inner.is_some()
    }

    fn overrides(&self) -> std::sync::MutexGuard<'_, Overrides> {
        self.overrides.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        {
            let overrides = self.overrides();
            if let Some(value) = overrides.entries.get(key) {
                return value.clone();
            }
            if overrides.backend_cleared {
                return None;
            }
        }
        let inner = self.inner.as_ref()?;
        match inner.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to read '{}' from storage: {}", key, e);
                None
            }
        }
    }

    pub fn set(&self, key: &str, value: &str) {
        if let Some(inner) = &self.inner {
            match inner.set(key, value) {
                Ok(()) => {
                    self.overrides().entries.remove(key);
                    return;
                }
                Err(e) => warn!("Failed to write '{}' to storage: {}", key, e),
            }
        }
        self.overrides()
            .entries
            .insert(key.to_string(), Some(value.to_string()));
    }

    pub fn remove(&self, key: &str) {
        if let Some(inner) = &self.inner {
            if let Err(e) = inner.remove(key) {
                warn!("Failed to remove '{}' from storage: {}", key, e);
                self.overrides().entries.insert(key.to_string(), None);
                return;
            }
        }
        self.overrides().entries.remove(key);
    }

    pub fn clear(&self) {
        let backend_cleared = match &self.inner {
            Some(inner) => match inner.clear() {
                Ok(()) => false,
                Err(e) => {
                    warn!("Failed to clear storage: {}", e);
                    true
                }
            },
            None => false,
        };
        let mut overrides = self.overrides();
        overrides.entries.clear();
        overrides.backend_cleared = backend_cleared;
    }

    /// Reads a boolean flag; only the exact string `"true"` counts as set.
    #[must_use]
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).as_deref() == Some(TRUE_VALUE)
    }
}

impl fmt::Debug for BestEffortStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BestEffortStore")
            .field("durable", &self.is_durable())
            .finish_non_exhaustive()
    }
}
