// crates/flagdeck-datasource/src/filedata.rs
// ============================================================================
// Module: Flagdeck File Data Source
// Description: Loads flags and segments from local JSON files.
// Purpose: Support local development and tests without a remote service.
// Dependencies: flagdeck-core, serde_json, tokio
// ============================================================================

//! ## Overview
//! The file source reads one or more JSON files of the full-payload shape
//! (`{"flags": {...}, "segments": {...}}`) and initializes the store from
//! their merged contents. Duplicate keys across files keep the first
//! occurrence and log a warning. Loading happens once at start and again on
//! `refresh`; the files are not watched.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use flagdeck_core::AllData;
use flagdeck_core::DataSourceState;
use flagdeck_core::ErrorInfo;
use flagdeck_core::ErrorKind;
use flagdeck_core::interfaces::DataSourceUpdates;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::oneshot;
use tracing::warn;

use crate::source::DataSource;
use crate::source::StartSignal;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors from loading file data.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum FileDataError {
    /// A file could not be read.
    #[error("cannot read {path}: {message}")]
    Io {
        /// Offending file path.
        path: PathBuf,
        /// Underlying error description.
        message: String,
    },
    /// A file did not contain a valid full payload.
    #[error("cannot parse {path}: {message}")]
    Parse {
        /// Offending file path.
        path: PathBuf,
        /// Underlying error description.
        message: String,
    },
}

// ============================================================================
// SECTION: File Source
// ============================================================================

/// The file-backed [`DataSource`].
///
/// # Invariants
/// - Files are merged in argument order; the first occurrence of a key wins.
pub struct FileDataSource {
    /// Files to load, in order.
    paths: Vec<PathBuf>,
    /// Update sink receiving the merged payload and status transitions.
    updates: Arc<dyn DataSourceUpdates>,
    /// Start outcome cell.
    start: StartSignal,
}

impl FileDataSource {
    /// Creates a file source over `paths`, feeding `updates`.
    #[must_use]
    pub fn new(paths: Vec<PathBuf>, updates: Arc<dyn DataSourceUpdates>) -> Self {
        Self {
            paths,
            updates,
            start: StartSignal::new(),
        }
    }

    /// Loads the files and applies the merged payload.
    fn load(&self) -> bool {
        let merged = match load_and_merge(&self.paths) {
            Ok(merged) => merged,
            Err(err) => {
                warn!(error = %err, "file data load failed");
                self.updates.update_status(
                    DataSourceState::Interrupted,
                    Some(ErrorInfo::new(
                        ErrorKind::InvalidData,
                        Some(err.to_string()),
                        OffsetDateTime::now_utc(),
                    )),
                );
                return false;
            }
        };
        match self.updates.init(merged) {
            Ok(()) => {
                self.updates.update_status(DataSourceState::Valid, None);
                true
            }
            Err(err) => {
                self.updates.update_status(
                    DataSourceState::Interrupted,
                    Some(ErrorInfo::new(
                        ErrorKind::StoreError,
                        Some(err.to_string()),
                        OffsetDateTime::now_utc(),
                    )),
                );
                false
            }
        }
    }
}

impl DataSource for FileDataSource {
    fn start(&self) -> oneshot::Receiver<bool> {
        if self.start.result().is_none() {
            let loaded = self.load();
            self.start.complete(loaded);
        }
        self.start.subscribe()
    }

    fn refresh(&self) {
        let _ = self.load();
    }

    fn close(&self) {}
}

// ============================================================================
// SECTION: Loading
// ============================================================================

/// Reads and merges the payload files, first occurrence winning.
fn load_and_merge(paths: &[PathBuf]) -> Result<AllData, FileDataError> {
    let mut merged = AllData::default();
    for path in paths {
        let data = load_one(path)?;
        for (key, flag) in data.flags {
            if merged.flags.contains_key(&key) {
                warn!(key = %key, path = %path.display(), "duplicate flag key in file data");
                continue;
            }
            merged.flags.insert(key, flag);
        }
        for (key, segment) in data.segments {
            if merged.segments.contains_key(&key) {
                warn!(key = %key, path = %path.display(), "duplicate segment key in file data");
                continue;
            }
            merged.segments.insert(key, segment);
        }
    }
    Ok(merged)
}

/// Reads one payload file.
fn load_one(path: &Path) -> Result<AllData, FileDataError> {
    let bytes = std::fs::read(path).map_err(|err| FileDataError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    serde_json::from_slice(&bytes).map_err(|err| FileDataError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}
