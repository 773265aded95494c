use std::path::PathBuf;
use thiserror::Error;

use crate::sanitize::redact_path;

#[derive(Error, Debug)]
pub enum ReportflowError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] crate::analysis::AnalysisError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Watcher error: {0}")]
    Watcher(#[from] WatcherError),

    #[error("Marker error: {0}")]
    Marker(#[from] crate::guard::MarkerError),

    #[error("Report write error: {0}")]
    Write(#[from] crate::records::WriteError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::PersistenceError),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Invalid glob pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{}': {source}", redact_path(.path))]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "Failed to move file from '{}' to '{}': {source}",
        redact_path(.from),
        redact_path(.to)
    )]
    MoveFile {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File already exists: {}", redact_path(.0))]
    FileExists(PathBuf),

    #[error("Invalid file name: {0:?}")]
    InvalidFileName(String),
}

#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("Watcher is already running")]
    AlreadyRunning,

    #[error("Failed to create incoming directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Watch error: {0}")]
    Watch(String),

    #[error("Job channel closed")]
    ChannelClosed,

    #[error("Directory scan failed for '{path}': {source}")]
    ScanFailed {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

pub type Result<T> = std::result::Result<T, ReportflowError>;
