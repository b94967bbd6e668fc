//! Key/value storage for nonces, device codes, and tokens.
//!
//! Two slots consume this trait: plain storage (CSRF nonces, may live in a
//! client-visible cookie) and secure storage (tokens and device codes, must
//! report [`StorageProvider::is_confidential`]).

pub mod cookie;
pub mod file;
pub mod memory;

pub use cookie::{CookieStorage, SecureCookieStorage, SetCookie};
pub use file::{FileStorage, FileStorageConfig};
pub use memory::MemoryStorage;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::constant_time_eq;
use crate::error::Result;

/// Storage abstraction shared by the plain and the secure slot.
pub trait StorageProvider: Send + Sync {
    /// Write `value` under `key`, replacing any prior value. `ttl = None` never expires.
    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// Read a live value. Expired entries read as absent.
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn remove(&self, key: &str) -> Result<()>;

    /// Constant-time check that the stored value equals `value`.
    ///
    /// Absent keys compare unequal.
    fn compare(&self, key: &str, value: &str) -> Result<bool> {
        Ok(match self.get(key)? {
            Some(stored) => constant_time_eq(stored.as_bytes(), value.as_bytes()),
            None => false,
        })
    }

    /// Whether values are confidential at rest (unreadable by the end user).
    fn is_confidential(&self) -> bool;
}

/// A stored value with its optional expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Entry {
    pub value: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    pub fn new(value: &str, ttl: Option<Duration>) -> Self {
        Self {
            value: value.to_string(),
            expires_at: ttl.and_then(expiry_from_ttl),
        }
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at > now).unwrap_or(true)
    }
}

/// `None` when the deadline does not fit in a timestamp; such values never expire.
pub(crate) fn expiry_from_ttl(ttl: Duration) -> Option<DateTime<Utc>> {
    let ttl = chrono::Duration::from_std(ttl).ok()?;
    Utc::now().checked_add_signed(ttl)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_without_ttl_never_expires() {
        let entry = Entry::new("v", None);
        assert!(entry.is_live(Utc::now() + chrono::Duration::days(3650)));
    }

    #[test]
    fn entry_expires_after_ttl() {
        let entry = Entry::new("v", Some(Duration::from_secs(60)));
        assert!(entry.is_live(Utc::now()));
        assert!(!entry.is_live(Utc::now() + chrono::Duration::seconds(61)));
    }

    #[test]
    fn absurd_ttl_saturates_to_no_expiry() {
        assert!(expiry_from_ttl(Duration::from_secs(u64::MAX)).is_none());
    }
}
