//! Parameter-keyed store for derived datasets.
//!
//! Each data file has a JSON sidecar recording the [`CacheKey`] it was built
//! with. A file without a sidecar, or whose sidecar disagrees with the key a
//! caller expects, is treated as missing and rebuilt.
//!
//! Concurrent regenerations of the same entry are not coordinated: both write
//! complete files and the last rename wins.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::Result;
use crate::output::write_atomic;

/// Bump whenever the layout of a cached file changes.
pub const CACHE_SCHEMA_VERSION: u32 = 1;

/// Everything a cached file depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheKey {
    pub schema_version: u32,
    pub airport: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot_minutes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub months: Option<Vec<u32>>,
    /// Fingerprint of the weather merged into the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<String>,
}

impl CacheKey {
    pub fn for_airport(airport: &str) -> Self {
        Self {
            schema_version: CACHE_SCHEMA_VERSION,
            airport: airport.to_string(),
            slot_minutes: None,
            window: None,
            months: None,
            weather: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheStore {
    folder: PathBuf,
}

impl CacheStore {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    pub fn path(&self, file_name: &str) -> PathBuf {
        self.folder.join(file_name)
    }

    fn sidecar_path(&self, file_name: &str) -> PathBuf {
        self.folder.join(format!("{file_name}.meta.json"))
    }

    /// Path of the cached file if it exists and was built for `key`.
    pub fn lookup(&self, file_name: &str, key: &CacheKey) -> Option<PathBuf> {
        let path = self.path(file_name);
        if !path.exists() {
            debug!(path = %path.display(), "Cache miss: no data file");
            return None;
        }

        let stored: Option<CacheKey> = fs::read_to_string(self.sidecar_path(file_name))
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok());

        match stored {
            Some(stored) if &stored == key => Some(path),
            stored => {
                debug!(
                    path = %path.display(),
                    ?stored,
                    expected = ?key,
                    "Cache miss: key mismatch"
                );
                None
            }
        }
    }

    /// Rebuilds a cache entry.
    ///
    /// The sidecar is removed first and written last, so an interrupted
    /// rebuild always reads as a miss.
    pub fn store<F>(&self, file_name: &str, key: &CacheKey, write: F) -> Result<PathBuf>
    where
        F: FnOnce(&Path) -> Result<()>,
    {
        fs::create_dir_all(&self.folder)?;
        let sidecar = self.sidecar_path(file_name);
        if sidecar.exists() {
            fs::remove_file(&sidecar)?;
        }

        let path = self.path(file_name);
        write(&path)?;

        write_atomic(&sidecar, |file| {
            serde_json::to_writer_pretty(file, key)?;
            Ok(())
        })?;
        info!(path = %path.display(), "Cache entry written");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_text(text: &'static str) -> impl FnOnce(&Path) -> Result<()> {
        move |path| Ok(fs::write(path, text)?)
    }

    #[test]
    fn test_lookup_misses_without_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        assert!(store.lookup("generalEGLL.csv", &CacheKey::for_airport("EGLL")).is_none());
    }

    #[test]
    fn test_store_then_lookup_hits() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("cache"));
        let key = CacheKey::for_airport("EGLL");

        let path = store.store("generalEGLL.csv", &key, write_text("x\n")).unwrap();
        assert_eq!(store.lookup("generalEGLL.csv", &key), Some(path));
    }

    #[test]
    fn test_key_mismatch_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let key = CacheKey {
            slot_minutes: Some(15),
            ..CacheKey::for_airport("EGLL")
        };
        store.store("EGLL_15m.csv", &key, write_text("x\n")).unwrap();

        let other = CacheKey {
            slot_minutes: Some(15),
            schema_version: CACHE_SCHEMA_VERSION + 1,
            ..CacheKey::for_airport("EGLL")
        };
        assert!(store.lookup("EGLL_15m.csv", &other).is_none());

        let other_weather = CacheKey {
            weather: Some("csv:10:1".to_string()),
            ..key
        };
        assert!(store.lookup("EGLL_15m.csv", &other_weather).is_none());
    }

    #[test]
    fn test_data_without_sidecar_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        fs::write(store.path("generalEGLL.csv"), "x\n").unwrap();
        assert!(store.lookup("generalEGLL.csv", &CacheKey::for_airport("EGLL")).is_none());
    }

    #[test]
    fn test_failed_rebuild_leaves_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let key = CacheKey::for_airport("EGLL");
        store.store("generalEGLL.csv", &key, write_text("x\n")).unwrap();

        let result = store.store("generalEGLL.csv", &key, |_| {
            Err(crate::error::PipelineError::DataIntegrity("boom".to_string()))
        });
        assert!(result.is_err());
        assert!(store.lookup("generalEGLL.csv", &key).is_none());
    }
}
