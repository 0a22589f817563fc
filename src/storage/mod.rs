// src/storage/mod.rs
use crate::utils::error::StorageError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

// Hex characters of the SHA-256 kept in the key; plenty for one filing.
const FINGERPRINT_LEN: usize = 16;

/// Identifies one summary: the filing plus the exact text that was summarized.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub doc_id: String,
    pub fingerprint: String,
}

impl CacheKey {
    pub fn for_text(doc_id: &str, text: &str) -> Self {
        let digest = Sha256::digest(text.as_bytes());
        let mut fingerprint = hex::encode(digest);
        fingerprint.truncate(FINGERPRINT_LEN);
        Self { doc_id: doc_id.to_string(), fingerprint }
    }

    /// File name of the entry, safe for any doc ID.
    fn file_name(&self) -> String {
        let doc_id: String = self
            .doc_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        format!("{}_{}.json", doc_id, self.fingerprint)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSummary {
    pub doc_id: String,
    pub fingerprint: String,
    pub summary: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
}

/// Key/value persistence for summaries. No expiry: entries live until
/// [`SummaryStore::clear`].
pub trait SummaryStore: Send + Sync {
    fn contains(&self, key: &CacheKey) -> bool;
    fn get(&self, key: &CacheKey) -> Result<Option<CachedSummary>, StorageError>;
    fn put(&self, entry: &CachedSummary) -> Result<PathBuf, StorageError>;
    /// Removes every entry, returning how many were deleted.
    fn clear(&self) -> Result<usize, StorageError>;
}

/// One JSON file per entry under `base_dir`.
pub struct FileSummaryCache {
    base_dir: PathBuf,
}

impl FileSummaryCache {
    /// Creates a new cache rooted at the specified directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        let base_path = base_dir.as_ref().to_path_buf();

        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(StorageError::IoError)?;
        }

        Ok(Self { base_dir: base_path })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.base_dir.join(key.file_name())
    }
}

impl SummaryStore for FileSummaryCache {
    fn contains(&self, key: &CacheKey) -> bool {
        self.entry_path(key).is_file()
    }

    fn get(&self, key: &CacheKey) -> Result<Option<CachedSummary>, StorageError> {
        let path = self.entry_path(key);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::IoError(e)),
        };
        let entry: CachedSummary = serde_json::from_str(&raw)
            .map_err(|e| StorageError::SerializationError(format!("{}: {}", path.display(), e)))?;
        tracing::debug!("Cache hit {}", path.display());
        Ok(Some(entry))
    }

    /// Writes to a temp file in the cache directory, then renames it into
    /// place so a reader never sees a partial entry.
    fn put(&self, entry: &CachedSummary) -> Result<PathBuf, StorageError> {
        let key = CacheKey { doc_id: entry.doc_id.clone(), fingerprint: entry.fingerprint.clone() };
        let path = self.entry_path(&key);

        fs::create_dir_all(&self.base_dir).map_err(StorageError::IoError)?;
        let json = serde_json::to_string_pretty(entry)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        let mut tmp = NamedTempFile::new_in(&self.base_dir).map_err(StorageError::IoError)?;
        tmp.write_all(json.as_bytes()).map_err(StorageError::IoError)?;
        tmp.flush().map_err(StorageError::IoError)?;
        tmp.persist(&path).map_err(|e| StorageError::IoError(e.error))?;

        tracing::info!("Saved summary to {}", path.display());
        Ok(path)
    }

    fn clear(&self) -> Result<usize, StorageError> {
        if !self.base_dir.exists() {
            return Ok(0);
        }
        let mut removed = 0;
        for entry in fs::read_dir(&self.base_dir).map_err(StorageError::IoError)? {
            let path = entry.map_err(StorageError::IoError)?.path();
            if path.is_file() && path.extension().is_some_and(|e| e == "json") {
                fs::remove_file(&path).map_err(StorageError::IoError)?;
                removed += 1;
            }
        }
        tracing::info!("Cleared {} cached summaries from {}", removed, self.base_dir.display());
        Ok(removed)
    }
}
