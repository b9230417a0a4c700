//! Cross-platform key/value storage.
//!
//! - Web: `localStorage`
//! - Desktop: one JSON file per key in the platform config directory:
//!   - Linux: `~/.config/courtside/`
//!   - macOS: `~/Library/Application Support/courtside/`
//!   - Windows: `%APPDATA%\courtside\`

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

use serde::{de::DeserializeOwned, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage is not available")]
    Unavailable,
    #[error("storage write failed: {0}")]
    Write(String),
    #[error("failed to encode value: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Raw string storage.
pub trait KeyValueStorage {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str);
}

/// Serialize `value` as JSON under `key`.
pub fn save<S: KeyValueStorage + ?Sized, T: Serialize>(
    storage: &S,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let json = serde_json::to_string(value)?;
    storage.set(key, &json)
}

/// Load a JSON value. `None` if the key is missing or does not decode.
pub fn load<S: KeyValueStorage + ?Sized, T: DeserializeOwned>(storage: &S, key: &str) -> Option<T> {
    let json = storage.get(key)?;
    match serde_json::from_str(&json) {
        Ok(value) => Some(value),
        Err(e) => {
            crate::log_warn!("discarding unreadable stored value {}: {}", key, e);
            None
        }
    }
}

// =========================================
// In-memory
// =========================================

#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Rc<RefCell<HashMap<String, String>>>,
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.entries.borrow_mut().remove(key);
    }
}

// =========================================
// Files
// =========================================

/// One `<key>.json` file per entry under `dir`.
#[derive(Debug, Clone, PartialEq)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        // Keys contain ':' separators, which Windows rejects in file names.
        let safe_key = key.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_");
        self.dir.join(format!("{}.json", safe_key))
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        std::fs::read_to_string(self.path(key)).ok()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| StorageError::Write(e.to_string()))?;
        std::fs::write(self.path(key), value).map_err(|e| StorageError::Write(e.to_string()))
    }

    fn remove(&self, key: &str) {
        let _ = std::fs::remove_file(self.path(key));
    }
}

// =========================================
// Platform default
// =========================================

/// `localStorage` in the browser.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone, Default)]
pub struct PlatformStorage;

#[cfg(target_arch = "wasm32")]
impl PlatformStorage {
    fn local_storage() -> Option<web_sys::Storage> {
        web_sys::window()?.local_storage().ok()?
    }
}

#[cfg(target_arch = "wasm32")]
impl KeyValueStorage for PlatformStorage {
    fn get(&self, key: &str) -> Option<String> {
        Self::local_storage()?.get_item(key).ok()?
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        Self::local_storage()
            .ok_or(StorageError::Unavailable)?
            .set_item(key, value)
            .map_err(|e| StorageError::Write(format!("{:?}", e)))
    }

    fn remove(&self, key: &str) {
        if let Some(storage) = Self::local_storage() {
            let _ = storage.remove_item(key);
        }
    }
}

/// JSON files under the user's config directory on desktop.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone, Default)]
pub struct PlatformStorage;

#[cfg(not(target_arch = "wasm32"))]
impl PlatformStorage {
    fn files() -> Option<FileStorage> {
        Some(FileStorage::new(dirs::config_dir()?.join("courtside")))
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl KeyValueStorage for PlatformStorage {
    fn get(&self, key: &str) -> Option<String> {
        Self::files()?.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        Self::files().ok_or(StorageError::Unavailable)?.set(key, value)
    }

    fn remove(&self, key: &str) {
        if let Some(files) = Self::files() {
            files.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_storage_round_trips_json() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested"));

        save(&storage, "courtside:draft:chat:c1", &vec!["a", "b"]).unwrap();
        assert!(dir.path().join("nested/courtside_draft_chat_c1.json").exists());
        let loaded: Option<Vec<String>> = load(&storage, "courtside:draft:chat:c1");
        assert_eq!(loaded, Some(vec!["a".to_string(), "b".to_string()]));

        storage.remove("courtside:draft:chat:c1");
        assert_eq!(storage.get("courtside:draft:chat:c1"), None);
    }

    #[test]
    fn unreadable_values_load_as_none() {
        let storage = MemoryStorage::default();
        storage.set("k", "{not json").unwrap();
        assert_eq!(load::<_, u32>(&storage, "k"), None);
    }

    #[test]
    fn memory_storage_clones_share_entries() {
        let storage = MemoryStorage::default();
        let other = storage.clone();
        storage.set("k", "1").unwrap();
        assert_eq!(other.get("k").as_deref(), Some("1"));
    }
}
