//! Decides which paths in the incoming directory are report payloads.

use std::path::Path;

use glob::Pattern;

use crate::config::WatcherConfig;
use crate::error::ConfigError;
use crate::guard::SIDECAR_SUFFIX;

/// Suffixes written by browsers, editors and upload tools while a file is
/// still being produced.
const TEMP_SUFFIXES: &[&str] = &[".tmp", ".part", ".partial", ".crdownload", ".swp"];

#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl FileFilter {
    pub fn from_config(config: &WatcherConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            include: compile(&config.include)?,
            exclude: compile(&config.exclude)?,
        })
    }

    /// True when `path` names a payload file worth handing to the pipeline.
    ///
    /// Marker sidecars, hidden files and in-progress temp files are never
    /// candidates, whatever the include patterns say.
    pub fn is_candidate(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };

        if is_ignored_name(name) {
            return false;
        }

        if !self.include.is_empty() && !self.include.iter().any(|p| p.matches(name)) {
            return false;
        }

        !self.exclude.iter().any(|p| p.matches(name))
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Pattern>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|e| ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })
        })
        .collect()
}

fn is_ignored_name(name: &str) -> bool {
    if name.starts_with('.') || name.ends_with('~') || name.ends_with(SIDECAR_SUFFIX) {
        return true;
    }

    let lower = name.to_ascii_lowercase();
    TEMP_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix))
}
