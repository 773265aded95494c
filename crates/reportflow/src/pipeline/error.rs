use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analysis::AnalysisError;
use crate::db::PersistenceError;
use crate::guard::MarkerError;
use crate::records::WriteError;
use crate::sanitize::redact_path;

/// Pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Admit,
    AwaitStable,
    Analyze,
    Resolve,
    Write,
    Mark,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Admit => write!(f, "admit"),
            Stage::AwaitStable => write!(f, "await_stable"),
            Stage::Analyze => write!(f, "analyze"),
            Stage::Resolve => write!(f, "resolve"),
            Stage::Write => write!(f, "write"),
            Stage::Mark => write!(f, "mark"),
        }
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Admission check failed: {0}")]
    Admission(#[source] MarkerError),

    #[error(
        "Failed to inspect '{}' while waiting for it to settle: {source}",
        redact_path(.path)
    )]
    Stability {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Patient resolution failed: {0}")]
    Resolve(#[from] PersistenceError),

    #[error("Report write failed: {0}")]
    Write(#[from] WriteError),

    /// The report is stored but the file stays unmarked and will be
    /// processed again on the next run.
    #[error("Report {report_id} written but marker failed: {source}")]
    Mark {
        report_id: String,
        #[source]
        source: MarkerError,
    },

    #[error("Invalid incoming path: {0}")]
    InvalidPath(String),
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Admission(_) => Stage::Admit,
            PipelineError::Stability { .. } => Stage::AwaitStable,
            PipelineError::Analysis(_) => Stage::Analyze,
            PipelineError::Resolve(_) => Stage::Resolve,
            PipelineError::Write(_) | PipelineError::InvalidPath(_) => Stage::Write,
            PipelineError::Mark { .. } => Stage::Mark,
        }
    }
}
