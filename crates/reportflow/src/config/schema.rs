use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::records::ReportStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    pub incoming_directory: String,
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default)]
    pub watcher: WatcherConfig,
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub markers: MarkersConfig,
    #[serde(default)]
    pub reports: ReportsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

impl Config {
    /// Resolved database location, falling back to `~/.reportflow/data/reportflow.db`.
    pub fn database_path(&self) -> Option<PathBuf> {
        match &self.database_path {
            Some(path) => Some(PathBuf::from(path)),
            None => crate::db::default_database_path(),
        }
    }
}

/// Incoming-directory observation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Quiet period a file must show no size/mtime change before it is processed.
    #[serde(default = "default_stability_window_ms")]
    pub stability_window_ms: u64,
    #[serde(default = "default_stability_poll_ms")]
    pub stability_poll_ms: u64,
    /// Poll interval of the filesystem watcher (PollWatcher works on Docker/NFS mounts).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub recursive: bool,
    /// Glob patterns on the file name. Empty means every file.
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_stability_window_ms() -> u64 {
    2000
}

fn default_stability_poll_ms() -> u64 {
    100
}

fn default_poll_interval_ms() -> u64 {
    500
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            stability_window_ms: default_stability_window_ms(),
            stability_poll_ms: default_stability_poll_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            recursive: false,
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

/// External analysis engine invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_analysis_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub working_directory: Option<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

fn default_analysis_timeout() -> u64 {
    300
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerStoreKind {
    /// `<file>.meta.json` next to the payload.
    #[default]
    Sidecar,
    /// `processing_markers` table in the database.
    Database,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarkersConfig {
    #[serde(default)]
    pub store: MarkerStoreKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsConfig {
    #[serde(default = "default_file_location_prefix")]
    pub file_location_prefix: String,
    #[serde(default = "default_initial_status")]
    pub initial_status: ReportStatus,
}

fn default_file_location_prefix() -> String {
    "/uploads".to_string()
}

fn default_initial_status() -> ReportStatus {
    ReportStatus::Completed
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            file_location_prefix: default_file_location_prefix(),
            initial_status: default_initial_status(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Text,
        }
    }
}
