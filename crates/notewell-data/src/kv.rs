//! File-backed key/value store.
//!
//! Stand-in for browser-local storage: one JSON value per key, persisted as
//! a file under a base directory. Writes replace the whole value for a key
//! (write-to-temp then rename), serialized process-wide by a lock. Two
//! concurrent writers to the same key therefore resolve last-writer-wins at
//! whole-value granularity — a documented limitation of the fallback
//! dataset, not silent corruption.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use notewell_core::{Error, Result};

/// Well-known keys. The names match the original browser-storage layout.
pub mod keys {
    /// Fallback notes dataset.
    pub const DEMO_NOTES: &str = "demo-notes";
    /// Fallback folders dataset.
    pub const DEMO_FOLDERS: &str = "demo-folders";
    /// Fallback-mode flag ("true" when active).
    pub const DEMO_MODE: &str = "demo-mode";
    /// Persisted fallback identity record.
    pub const DEMO_USER: &str = "demo-user";
    /// RFC 3339 timestamp of when fallback mode was last (re)seeded.
    pub const DEMO_STARTED_AT: &str = "demo-started-at";
    /// Authenticated session identity record.
    pub const SESSION_USER: &str = "session-user";
    /// User preferences blob.
    pub const APP_PREFERENCES: &str = "app-preferences";
}

/// A process-wide key/value store rooted at a directory.
pub struct KvStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl KvStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are fixed constants; the replacement guards against path
        // separators ever sneaking into one.
        let safe: String = key
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.root.join(format!("{safe}.json"))
    }

    /// Raw string value for a key, if present.
    pub fn get_raw(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set a raw string value, replacing any prior value atomically.
    pub fn set_raw(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.write_lock.lock().expect("kv write lock poisoned");
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        debug!(key, len = value.len(), "kv set");
        Ok(())
    }

    /// Remove a key. Absent keys are a no-op.
    pub fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.write_lock.lock().expect("kv write lock poisoned");
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.path_for(key).exists()
    }

    /// Deserialize the value for a key.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_raw(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Serialize and store a value for a key.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.set_raw(key, &serde_json::to_string(value)?)
    }

    /// Directory this store persists into.
    pub fn root(&self) -> &Path {
        &self.root
    }
}
