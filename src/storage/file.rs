use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Entry, StorageProvider};
use crate::error::{GrantError, Result};

const STORAGE_FILE_VERSION: u32 = 1;

/// Configuration for file-backed storage.
#[derive(Debug, Clone)]
pub struct FileStorageConfig {
    pub base_dir: PathBuf,
}

impl FileStorageConfig {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn default_dir() -> PathBuf {
        default_grantline_dir()
    }
}

/// File-backed storage using one TOML file per key.
///
/// Files are written with `0600` permissions on unix, so the store counts as
/// confidential. Used as secure storage by the CLI.
///
/// # Example
/// ```no_run
/// use grantline::storage::{FileStorage, StorageProvider};
///
/// let store = FileStorage::new_default();
/// store.set("access_token", "T", Some(std::time::Duration::from_secs(3600)))?;
/// # Ok::<(), grantline::error::GrantError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileStorage {
    base_dir: PathBuf,
}

impl FileStorage {
    pub fn new(config: FileStorageConfig) -> Self {
        Self {
            base_dir: config.base_dir,
        }
    }

    pub fn new_default() -> Self {
        Self {
            base_dir: default_grantline_dir(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn value_path(&self, key: &str) -> PathBuf {
        self.base_dir.join(format!("{}.toml", file_stem(key)))
    }

    fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn read(&self, path: &Path) -> Result<Option<ValueFile>> {
        let raw = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(GrantError::Storage(err.to_string())),
        };
        let file: ValueFile = toml::from_str(&raw)?;
        if file.version != STORAGE_FILE_VERSION {
            return Err(GrantError::Storage(format!(
                "Unsupported storage file version {} at {}",
                file.version,
                path.display()
            )));
        }
        Ok(Some(file))
    }
}

impl StorageProvider for FileStorage {
    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let path = self.value_path(key);
        Self::ensure_parent(&path)?;
        let file = ValueFile {
            version: STORAGE_FILE_VERSION,
            key: key.to_string(),
            entry: Entry::new(value, ttl),
            saved_at: Utc::now(),
        };
        let serialized = toml::to_string(&file)?;
        write_private(&path, &serialized)
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.value_path(key);
        let Some(file) = self.read(&path)? else {
            return Ok(None);
        };
        // A file renamed in from another key must not answer for this one.
        if file.key != key {
            return Ok(None);
        }
        if !file.entry.is_live(Utc::now()) {
            self.remove(key)?;
            return Ok(None);
        }
        Ok(Some(file.entry.value))
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.value_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(GrantError::Storage(err.to_string())),
        }
    }

    fn is_confidential(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ValueFile {
    version: u32,
    key: String,
    entry: Entry,
    saved_at: DateTime<Utc>,
}

fn default_grantline_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".grantline"))
        .unwrap_or_else(|| PathBuf::from(".grantline"))
}

/// Lowercase hex of the key bytes: distinct keys never share a file, even on
/// case-insensitive filesystems.
fn file_stem(key: &str) -> String {
    key.bytes().map(|byte| format!("{byte:02x}")).collect()
}

/// Write `contents` to `path` through a sibling temp file created `0600`.
fn write_private(path: &Path, contents: &str) -> Result<()> {
    let tmp = path.with_extension("toml.tmp");
    match fs::remove_file(&tmp) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(GrantError::Storage(err.to_string())),
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(&tmp)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp, path)?;
    Ok(())
}
