//! Durable processing markers.
//!
//! A marker proves a file was fully processed. Markers are created once
//! and never rewritten.

use std::ffi::OsString;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::{marker_repo, Database, PersistenceError};
use crate::sanitize::redact_path;

/// File name suffix of sidecar markers.
pub const SIDECAR_SUFFIX: &str = ".meta.json";

#[derive(Error, Debug)]
pub enum MarkerError {
    #[error("Failed to read marker '{}': {source}", redact_path(.path))]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write marker '{}': {source}", redact_path(.path))]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize marker: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Marker database error: {0}")]
    Database(#[from] PersistenceError),
}

/// Contents of a sidecar marker file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingMarker {
    pub processed: bool,
    pub timestamp: String,
}

impl ProcessingMarker {
    pub fn now() -> Self {
        Self {
            processed: true,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Storage for processing markers, keyed by file path.
pub trait MarkerStore: Send + Sync {
    fn is_marked(&self, file: &Path) -> Result<bool, MarkerError>;

    /// Records the marker. An existing marker is left untouched.
    fn mark(&self, file: &Path) -> Result<(), MarkerError>;
}

/// Returns `<file>.meta.json`.
pub fn sidecar_path(file: &Path) -> PathBuf {
    let mut name: OsString = file.as_os_str().to_owned();
    name.push(SIDECAR_SUFFIX);
    PathBuf::from(name)
}

/// Writes markers as `<file>.meta.json` next to the payload.
#[derive(Debug, Default, Clone)]
pub struct SidecarMarkerStore;

impl SidecarMarkerStore {
    pub fn new() -> Self {
        Self
    }
}

impl MarkerStore for SidecarMarkerStore {
    fn is_marked(&self, file: &Path) -> Result<bool, MarkerError> {
        let path = sidecar_path(file);
        path.try_exists()
            .map_err(|e| MarkerError::Read { path, source: e })
    }

    fn mark(&self, file: &Path) -> Result<(), MarkerError> {
        let path = sidecar_path(file);
        let body = serde_json::to_vec_pretty(&ProcessingMarker::now())?;

        let mut handle = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(handle) => handle,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                log::debug!("Marker already present: {}", redact_path(&path));
                return Ok(());
            }
            Err(e) => return Err(MarkerError::Write { path, source: e }),
        };

        fill_or_remove(path, || {
            handle.write_all(&body)?;
            handle.sync_all()
        })
    }
}

/// Runs `write` against a freshly created sidecar. Any sidecar counts as a
/// marker, so a half-written one is removed again.
fn fill_or_remove(
    path: PathBuf,
    write: impl FnOnce() -> std::io::Result<()>,
) -> Result<(), MarkerError> {
    write().map_err(|e| {
        if let Err(remove) = std::fs::remove_file(&path) {
            log::warn!("Failed to remove partial marker {}: {}", redact_path(&path), remove);
        }
        MarkerError::Write { path, source: e }
    })
}

/// Keeps markers in the `processing_markers` table.
#[derive(Clone)]
pub struct DatabaseMarkerStore {
    db: Database,
}

impl DatabaseMarkerStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn file_id(file: &Path) -> String {
    file.to_string_lossy().into_owned()
}

impl MarkerStore for DatabaseMarkerStore {
    fn is_marked(&self, file: &Path) -> Result<bool, MarkerError> {
        Ok(marker_repo::exists(&self.db, &file_id(file))?)
    }

    fn mark(&self, file: &Path) -> Result<(), MarkerError> {
        let marker = ProcessingMarker::now();
        marker_repo::insert(&self.db, &file_id(file), &marker.timestamp)?;
        Ok(())
    }
}
