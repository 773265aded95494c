//! Analysis invocation error types.

use thiserror::Error;

/// Errors that can occur while running the external analysis engine.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// The engine process could not be started.
    #[error("Failed to start analysis engine '{program}': {source}")]
    Invocation {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The engine ran but exited unsuccessfully.
    #[error("Analysis engine failed ({}): {stderr}", exit_label(.exit_code))]
    EngineFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    /// The engine's stdout was not the expected JSON shape.
    #[error("Malformed analysis result: {reason}")]
    MalformedResult { reason: String },

    /// The engine exceeded its time budget and was killed.
    #[error("Analysis engine timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The async runtime supervising the engine could not be created.
    #[error("Failed to build analysis runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

impl AnalysisError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedResult {
            reason: reason.into(),
        }
    }
}
