//! Key-value blob stores.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Error type for store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// IO error (permission denied, disk full, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A flat string-to-string store. Writes replace the previous value.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

// ============================================================================
// MemoryStore
// ============================================================================

/// In-process store. Contents are lost when it is dropped.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ============================================================================
// FileStore
// ============================================================================

/// Bytes kept as-is in file names: `[A-Za-z0-9._-]`.
const FILE_NAME_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'.').remove(b'_').remove(b'-');

/// Longest escaped key used verbatim. Leaves room for `.json.tmp` under the
/// usual 255-byte file name limit.
const MAX_ESCAPED_LEN: usize = 200;

/// Escape a key into a file-name-safe string.
///
/// Bytes outside `[A-Za-z0-9._-]` become `%XX`. Escaped keys longer than
/// [`MAX_ESCAPED_LEN`] are cut and suffixed with `~` plus the hex SHA-256 of
/// the key; `~` never appears in an escaped key, so the two forms never
/// collide.
pub fn escape_key(key: &str) -> String {
    let escaped = utf8_percent_encode(key, FILE_NAME_SET).to_string();
    if escaped.len() <= MAX_ESCAPED_LEN {
        return escaped;
    }

    let digest = hex::encode(Sha256::digest(key.as_bytes()));
    // Escaped output is ASCII, so any byte index is a char boundary
    let keep = MAX_ESCAPED_LEN - digest.len() - 1;
    format!("{}~{digest}", &escaped[..keep])
}

/// Directory-backed store: one `<escaped key>.json` file per key.
///
/// # Atomic Write Strategy
///
/// 1. Write to `<name>.json.tmp`
/// 2. Rename to `<name>.json`
///
/// An interrupted write never leaves a half-written value behind.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", escape_key(key)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;

        let file_path = self.path_for(key);
        let temp_path = self.dir.join(format!("{}.json.tmp", escape_key(key)));

        fs::write(&temp_path, value)?;
        fs::rename(&temp_path, &file_path)?;

        Ok(())
    }
}
