use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;

use super::{Entry, StorageProvider};
use crate::error::{GrantError, Result};

/// In-process, TTL-aware storage.
///
/// Values never leave the server, so the store counts as confidential.
///
/// # Example
/// ```
/// use grantline::storage::{MemoryStorage, StorageProvider};
///
/// let store = MemoryStorage::new();
/// store.set("oauth_state_abc", "nonce", None)?;
/// assert!(store.compare("oauth_state_abc", "nonce")?);
/// # Ok::<(), grantline::error::GrantError>(())
/// ```
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> Result<usize> {
        Ok(self.entries()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.entries()?.is_empty())
    }

    /// Drop every expired entry.
    pub fn purge_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut entries = self.entries()?;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        Ok(before - entries.len())
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .lock()
            .map_err(|_| GrantError::Storage("memory storage lock poisoned".to_string()))
    }
}

impl StorageProvider for MemoryStorage {
    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        self.entries()?
            .insert(key.to_string(), Entry::new(value, ttl));
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Utc::now();
        let mut entries = self.entries()?;
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries()?.remove(key);
        Ok(())
    }

    fn is_confidential(&self) -> bool {
        true
    }
}
