use std::path::PathBuf;
use std::time::Duration;

use crate::config::{Config, MarkerStoreKind};
use crate::records::ReportStatus;

pub struct PipelineConfig {
    pub incoming_directory: PathBuf,
    pub stability_window: Duration,
    pub stability_poll: Duration,
    pub file_location_prefix: String,
    pub initial_status: ReportStatus,
    pub marker_store: MarkerStoreKind,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            incoming_directory: PathBuf::from(&config.incoming_directory),
            stability_window: Duration::from_millis(config.watcher.stability_window_ms),
            stability_poll: Duration::from_millis(config.watcher.stability_poll_ms),
            file_location_prefix: config.reports.file_location_prefix.clone(),
            initial_status: config.reports.initial_status,
            marker_store: config.markers.store,
        }
    }
}
