use std::path::{Path, PathBuf};

use crate::analysis::RiskLevel;
use crate::pipeline::error::Stage;

/// One incoming file queued for processing.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    /// Absolute path of the file; also its identity for the idempotency guard.
    pub source_path: PathBuf,
    /// MIME type guessed from the extension (e.g. "application/pdf").
    pub mime_type: Option<String>,
}

impl Job {
    pub fn new(source_path: PathBuf) -> Self {
        let mime_type = Self::detect_mime_type(&source_path);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source_path,
            mime_type,
        }
    }

    /// Detects MIME type from file path using the mime_guess crate.
    /// Returns `None` for unknown extensions.
    fn detect_mime_type(path: &Path) -> Option<String> {
        mime_guess::from_path(path).first().map(|m| m.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedSummary {
    pub report_id: String,
    pub patient_id: String,
    pub is_new_patient: bool,
    pub risk_level: RiskLevel,
    pub score: u8,
}

/// Why an admitted-or-not file ended without a report and without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A durable marker already exists.
    AlreadyProcessed,
    /// Another handler in this process holds the file.
    InFlight,
    /// The file disappeared before it settled.
    Vanished,
    /// Shutdown arrived while waiting for the file to settle.
    Interrupted,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::AlreadyProcessed => write!(f, "already processed"),
            SkipReason::InFlight => write!(f, "already in flight"),
            SkipReason::Vanished => write!(f, "file vanished before it settled"),
            SkipReason::Interrupted => write!(f, "interrupted by shutdown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Processed(ProcessedSummary),
    Skipped(SkipReason),
    Failed { stage: Stage, error: String },
}

#[derive(Debug, Clone)]
pub struct JobResult {
    pub job_id: String,
    pub source_path: PathBuf,
    pub outcome: JobOutcome,
}

impl JobResult {
    pub fn processed(job: &Job, summary: ProcessedSummary) -> Self {
        Self::with_outcome(job, JobOutcome::Processed(summary))
    }

    pub fn skipped(job: &Job, reason: SkipReason) -> Self {
        Self::with_outcome(job, JobOutcome::Skipped(reason))
    }

    pub fn failure(job: &Job, stage: Stage, error: String) -> Self {
        Self::with_outcome(job, JobOutcome::Failed { stage, error })
    }

    fn with_outcome(job: &Job, outcome: JobOutcome) -> Self {
        Self {
            job_id: job.id.clone(),
            source_path: job.source_path.clone(),
            outcome,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, JobOutcome::Processed(_))
    }
}
