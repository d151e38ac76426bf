//! JSON persistence for finished scans.
//!
//! Each scan is written to its own file, `scan_<started_at_ms>.json`, inside
//! the configured results directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ScanError;
use crate::scan::{DetectionEvent, ScanSummary};

const FILE_PREFIX: &str = "scan_";
const FILE_EXTENSION: &str = "json";

/// Everything saved for one scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    /// Wall-clock start of the scan (UNIX ms), also used in the file name
    pub started_at_ms: u64,
    pub duration_secs: u64,
    pub summary: ScanSummary,
    /// Accepted events in acceptance order
    pub events: Vec<DetectionEvent>,
}

impl ScanRecord {
    pub fn file_name(&self) -> String {
        format!("{}{}.{}", FILE_PREFIX, self.started_at_ms, FILE_EXTENSION)
    }
}

/// Directory of saved scan records
#[derive(Debug, Clone)]
pub struct JsonResultStore {
    dir: PathBuf,
}

impl JsonResultStore {
    /// Open the store, creating `dir` if needed
    ///
    /// # Errors
    /// `ScanError::StorageFailed` if the directory cannot be created
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, ScanError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        log::debug!("[JsonResultStore] Using results directory {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a record, replacing any file with the same start time
    ///
    /// # Returns
    /// Path of the written file
    pub fn save(&self, record: &ScanRecord) -> Result<PathBuf, ScanError> {
        let path = self.dir.join(record.file_name());
        let json = serde_json::to_string_pretty(record)?;
        fs::write(&path, json)?;
        log::info!(
            "[JsonResultStore] Saved {} events to {}",
            record.events.len(),
            path.display()
        );
        Ok(path)
    }

    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<ScanRecord, ScanError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Saved record files, sorted by name
    ///
    /// Files that do not look like `scan_*.json` are ignored.
    pub fn list(&self) -> Result<Vec<PathBuf>, ScanError> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if is_record_file(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

fn is_record_file(path: &Path) -> bool {
    let name_matches = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(FILE_PREFIX));
    let extension_matches = path.extension().is_some_and(|ext| ext == FILE_EXTENSION);
    path.is_file() && name_matches && extension_matches
}
