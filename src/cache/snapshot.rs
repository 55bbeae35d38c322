//! Cache snapshots: persist cached lookups across restarts.
//!
//! A snapshot is a versioned JSON document:
//!
//! ```json
//! { "version": 1, "entries": [ { "key": "inception", "entry": { ... } } ] }
//! ```
//!
//! Entries keep their original `fetched_at`, so a restored entry expires on
//! the same schedule it would have without the restart.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::CacheEntry;
use crate::types::QueryKey;
use crate::{CinescrapeError, Result};

/// Maximum supported snapshot format version.
const MAX_SUPPORTED_VERSION: u32 = 1;

/// One cached query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub key: QueryKey,
    pub entry: CacheEntry,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    version: u32,
    entries: Vec<SnapshotEntry>,
}

/// Storage backend for cache snapshots.
pub trait SnapshotStore: Send + Sync {
    /// Replace the stored snapshot with `entries`.
    fn save(&self, entries: &[SnapshotEntry]) -> Result<()>;

    /// Load the stored snapshot. A missing snapshot is empty, not an error.
    fn load(&self) -> Result<Vec<SnapshotEntry>>;
}

/// Snapshot stored as a JSON file, written atomically via tmp + rename.
///
/// ```rust
/// # use cinescrape::cache::{JsonFileStore, SnapshotStore};
/// let dir = std::env::temp_dir().join("cinescrape-doc");
/// let store = JsonFileStore::new(dir.join("cache.json"));
/// assert!(store.path().ends_with("cache.json"));
/// ```
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for JsonFileStore {
    fn save(&self, entries: &[SnapshotEntry]) -> Result<()> {
        let path = &self.path;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CinescrapeError::Snapshot(format!(
                    "failed to create snapshot dir {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let file = SnapshotFile {
            version: MAX_SUPPORTED_VERSION,
            entries: entries.to_vec(),
        };
        let json = serde_json::to_string(&file)
            .map_err(|e| CinescrapeError::Snapshot(format!("failed to serialize snapshot: {e}")))?;

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &json).map_err(|e| {
            CinescrapeError::Snapshot(format!(
                "failed to write snapshot file {}: {e}",
                tmp_path.display()
            ))
        })?;
        std::fs::rename(&tmp_path, path).map_err(|e| {
            CinescrapeError::Snapshot(format!(
                "failed to rename snapshot file {} to {}: {e}",
                tmp_path.display(),
                path.display()
            ))
        })?;
        Ok(())
    }

    fn load(&self) -> Result<Vec<SnapshotEntry>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(CinescrapeError::Snapshot(format!(
                    "failed to read snapshot {}: {e}",
                    self.path.display()
                )));
            }
        };
        let file: SnapshotFile = serde_json::from_str(&content).map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "corrupt cache snapshot");
            CinescrapeError::Snapshot(format!("failed to parse snapshot: {e}"))
        })?;
        if file.version > MAX_SUPPORTED_VERSION {
            return Err(CinescrapeError::Snapshot(format!(
                "unsupported snapshot version {} (max supported: {MAX_SUPPORTED_VERSION})",
                file.version
            )));
        }
        Ok(file.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("absent.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn future_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, r#"{"version": 99, "entries": []}"#).unwrap();
        let err = JsonFileStore::new(&path).load().unwrap_err();
        assert!(err.to_string().contains("unsupported snapshot version"));
    }

    #[test]
    fn corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            JsonFileStore::new(&path).load(),
            Err(CinescrapeError::Snapshot(_))
        ));
    }
}
