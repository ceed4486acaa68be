//! Key-value persistence for viewer state.
//!
//! The column picker only ever needs `load`/`save`/`clear` of a single string
//! entry, so the backends behave like a browser's local storage: one opaque
//! value per key, no versioning.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::{debug, trace};

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Unavailable(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "I/O error: {e}"),
            StoreError::Unavailable(msg) => write!(f, "storage unavailable: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(e) => Some(e),
            StoreError::Unavailable(_) => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Pluggable string store. Implementations must not panic on failure.
pub trait VisibilityStore: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Returns `None` if nothing was stored under `key` yet.
    fn load(&self, key: &str) -> StoreResult<Option<String>>;

    fn save(&self, key: &str, value: &str) -> StoreResult<()>;

    fn clear(&self, key: &str) -> StoreResult<()>;
}

/// Ephemeral store, lost when the process exits.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, value: &str) -> Self {
        let store = Self::default();
        if let Ok(mut guard) = store.entries.write() {
            guard.insert(key.to_string(), value.to_string());
        }
        store
    }
}

impl VisibilityStore for MemoryStore {
    fn name(&self) -> &str {
        "MemoryStore"
    }

    fn load(&self, key: &str) -> StoreResult<Option<String>> {
        let guard = self
            .entries
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;
        Ok(guard.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut guard = self
            .entries
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&self, key: &str) -> StoreResult<()> {
        let mut guard = self
            .entries
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;
        guard.remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per entry inside a state directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Build a store from a user supplied directory, expanding `~` and `$VARS`.
    pub fn from_user_path(dir: &str) -> StoreResult<Self> {
        let expanded = shellexpand::full(dir)
            .map_err(|e| StoreError::Unavailable(format!("cannot expand {dir}: {e}")))?;
        Ok(Self::new(expanded.into_owned()))
    }

    /// `$XDG_STATE_HOME/<app>`, then `~/.local/state/<app>`, then `./<app>`.
    pub fn default_for_app(app_name: &str) -> Self {
        let base = if let Ok(state_home) = std::env::var("XDG_STATE_HOME") {
            PathBuf::from(state_home)
        } else if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home).join(".local").join("state")
        } else {
            PathBuf::from(".")
        };
        Self::new(base.join(app_name))
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl VisibilityStore for FileStore {
    fn name(&self) -> &str {
        "FileStore"
    }

    fn load(&self, key: &str) -> StoreResult<Option<String>> {
        let path = self.entry_path(key);
        match fs::read_to_string(&path) {
            Ok(content) => {
                trace!("Loaded {} bytes from {}", content.len(), path.display());
                Ok(Some(content))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, key: &str, value: &str) -> StoreResult<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.entry_path(key);
        let mut tmp = path.clone();
        tmp.set_extension("json.tmp");

        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        debug!("Saved {key} to {}", path.display());
        Ok(())
    }

    fn clear(&self, key: &str) -> StoreResult<()> {
        match fs::remove_file(self.entry_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_load_save_clear() {
        let store = MemoryStore::new();
        assert!(store.load("k").unwrap().is_none());

        store.save("k", "{}").unwrap();
        assert_eq!(store.load("k").unwrap().as_deref(), Some("{}"));

        store.clear("k").unwrap();
        assert!(store.load("k").unwrap().is_none());
    }

    #[test]
    fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("state").join("assetview");

        FileStore::new(&nested)
            .save("columnsVisibility", r#"{"name":false}"#)
            .unwrap();

        let reopened = FileStore::new(&nested);
        assert_eq!(
            reopened.load("columnsVisibility").unwrap().as_deref(),
            Some(r#"{"name":false}"#)
        );
        assert!(!nested.join("columnsVisibility.json.tmp").exists());
    }

    #[test]
    fn file_store_missing_entry_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(store.load("columnsVisibility").unwrap().is_none());
        // Clearing something that was never written is fine
        store.clear("columnsVisibility").unwrap();
    }

    #[test]
    fn file_store_save_fails_when_dir_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "x").unwrap();

        let store = FileStore::new(&blocker);
        assert!(matches!(store.save("k", "{}"), Err(StoreError::Io(_))));
    }
}
