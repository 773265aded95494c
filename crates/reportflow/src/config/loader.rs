use std::path::{Path, PathBuf};

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

/// Resolves the config file location: explicit argument, then
/// `REPORTFLOW_CONFIG`, then `~/.reportflow/config.json`.
pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(PathBuf::from(path));
    }
    if let Ok(path) = std::env::var("REPORTFLOW_CONFIG") {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    dirs::home_dir().map(|h| h.join(".reportflow").join("config.json"))
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.incoming_directory.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "incoming_directory must not be empty".to_string(),
        });
    }

    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be at least 1".to_string(),
        });
    }

    if config.analysis.program.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "analysis.program must not be empty".to_string(),
        });
    }

    if config.analysis.timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "analysis.timeout_secs must be positive".to_string(),
        });
    }

    let watcher = &config.watcher;
    if watcher.stability_window_ms == 0
        || watcher.stability_poll_ms == 0
        || watcher.poll_interval_ms == 0
    {
        return Err(ConfigError::Validation {
            message: "watcher intervals must be positive".to_string(),
        });
    }

    for pattern in watcher.include.iter().chain(watcher.exclude.iter()) {
        if let Err(e) = glob::Pattern::new(pattern) {
            return Err(ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            });
        }
    }

    Ok(())
}
