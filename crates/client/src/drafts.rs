//! Autosaved drafts of long-form inputs (messages, comments, evaluation
//! notes) so they survive a reload.

use courtside_shared::{draft_key, DraftValue};
use dioxus::prelude::*;
use serde::{de::DeserializeOwned, Serialize};

use crate::config::ClientConfig;
use crate::storage::{self, KeyValueStorage, PlatformStorage, StorageError};

#[derive(Debug, Clone)]
pub struct DraftStore<S> {
    storage: S,
    prefix: String,
}

impl<S: KeyValueStorage> DraftStore<S> {
    pub fn new(storage: S, prefix: impl Into<String>) -> Self {
        Self {
            storage,
            prefix: prefix.into(),
        }
    }

    pub fn key<T: AsRef<str>>(&self, segments: &[T]) -> String {
        draft_key(&self.prefix, segments)
    }

    pub fn load<T: DeserializeOwned, K: AsRef<str>>(&self, segments: &[K]) -> Option<T> {
        storage::load(&self.storage, &self.key(segments))
    }

    /// Write the draft, or remove it once it is empty.
    pub fn save<T: Serialize + DraftValue, K: AsRef<str>>(
        &self,
        segments: &[K],
        value: &T,
    ) -> Result<(), StorageError> {
        let key = self.key(segments);
        if value.is_empty_draft() {
            self.storage.remove(&key);
            return Ok(());
        }
        storage::save(&self.storage, &key, value)
    }

    /// Drop the draft after a successful submit.
    pub fn clear<K: AsRef<str>>(&self, segments: &[K]) {
        self.storage.remove(&self.key(segments));
    }
}

/// A signal holding a draft that is restored on mount and written back on
/// every change.
pub fn use_draft<T>(segments: Vec<String>) -> Signal<T>
where
    T: Serialize + DeserializeOwned + DraftValue + Default + Clone + 'static,
{
    let config = use_context::<ClientConfig>();
    let drafts = use_hook(|| DraftStore::new(PlatformStorage, config.storage_prefix.clone()));

    let restore = drafts.clone();
    let restore_key = segments.clone();
    let value = use_signal(move || restore.load::<T, _>(&restore_key).unwrap_or_default());

    use_effect(move || {
        let current = value.read();
        if let Err(e) = drafts.save(&segments, &*current) {
            crate::log_warn!("failed to save draft {}: {}", drafts.key(&segments), e);
        }
    });

    value
}
