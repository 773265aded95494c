//! Builders for test configuration.

#![allow(dead_code)]

use std::path::Path;

use reportflow::config::{load_config_from_str, Config};
use serde_json::{json, Value};

/// Builds a configuration document and loads it through the real loader,
/// so every test config also passes schema and semantic validation.
pub struct ConfigBuilder {
    value: Value,
}

impl ConfigBuilder {
    pub fn new(incoming_directory: &Path) -> Self {
        Self {
            value: json!({
                "version": "1.0",
                "incoming_directory": incoming_directory.to_string_lossy(),
                "worker_count": 1,
                "watcher": {
                    "stability_window_ms": 50,
                    "stability_poll_ms": 10,
                    "poll_interval_ms": 50
                },
                "analysis": {
                    "program": "sh",
                    "args": [],
                    "timeout_secs": 10
                }
            }),
        }
    }

    /// Runs `sh <script> <file>` as the analysis engine.
    pub fn engine_script(mut self, script: &Path) -> Self {
        self.value["analysis"]["args"] = json!([script.to_string_lossy()]);
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.value["analysis"]["timeout_secs"] = json!(secs);
        self
    }

    pub fn marker_store(mut self, store: &str) -> Self {
        self.value["markers"] = json!({ "store": store });
        self
    }

    pub fn initial_status(mut self, status: &str) -> Self {
        self.value["reports"] = json!({ "initial_status": status });
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.value).unwrap()
    }

    pub fn build(&self) -> Config {
        load_config_from_str(&self.to_json()).unwrap()
    }
}
