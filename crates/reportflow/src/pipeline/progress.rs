//! Per-job progress events, broadcast to any number of subscribers.
//!
//! Events carry ids and file names only. Patient names and analysis text
//! never leave the pipeline through this channel.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::error::Stage;

/// Phase of job processing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Queued,
    Admitting,
    AwaitingStability,
    Analyzing,
    Resolving,
    Writing,
    Marking,
    Completed,
    Skipped,
    Failed,
}

impl std::fmt::Display for JobPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobPhase::Queued => write!(f, "Queued"),
            JobPhase::Admitting => write!(f, "Admitting"),
            JobPhase::AwaitingStability => write!(f, "Awaiting stability"),
            JobPhase::Analyzing => write!(f, "Analyzing"),
            JobPhase::Resolving => write!(f, "Resolving patient"),
            JobPhase::Writing => write!(f, "Writing report"),
            JobPhase::Marking => write!(f, "Marking processed"),
            JobPhase::Completed => write!(f, "Completed"),
            JobPhase::Skipped => write!(f, "Skipped"),
            JobPhase::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Processing,
    Completed,
    Skipped,
    Failed,
}

/// Broadcast payload describing one step of one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgressEvent {
    pub job_id: String,
    pub filename: String,
    pub phase: JobPhase,
    pub status: JobStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobProgressEvent {
    pub fn new(job_id: &str, filename: &str, phase: JobPhase, message: &str) -> Self {
        let status = match phase {
            JobPhase::Completed => JobStatus::Completed,
            JobPhase::Skipped => JobStatus::Skipped,
            JobPhase::Failed => JobStatus::Failed,
            _ => JobStatus::Processing,
        };

        Self {
            job_id: job_id.to_string(),
            filename: filename.to_string(),
            phase,
            status,
            message: message.to_string(),
            timestamp: Utc::now(),
            mime_type: None,
            report_id: None,
            patient_id: None,
            stage: None,
            error: None,
        }
    }
}

/// Events emitted by the pipeline during processing.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Phase {
        phase: JobPhase,
        message: String,
    },
    Completed {
        report_id: String,
        patient_id: String,
        is_new_patient: bool,
    },
    Skipped {
        reason: String,
    },
    Failed {
        stage: Stage,
        error: String,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Bridges pipeline events for one job onto a broadcast channel.
pub struct BroadcastProgress {
    job_id: String,
    filename: String,
    mime_type: Option<String>,
    sender: Arc<broadcast::Sender<JobProgressEvent>>,
}

impl BroadcastProgress {
    pub fn new(
        job_id: &str,
        filename: &str,
        mime_type: Option<&str>,
        sender: Arc<broadcast::Sender<JobProgressEvent>>,
    ) -> Self {
        Self {
            job_id: job_id.to_string(),
            filename: filename.to_string(),
            mime_type: mime_type.map(str::to_string),
            sender,
        }
    }

    fn event(&self, phase: JobPhase, message: &str) -> JobProgressEvent {
        let mut event = JobProgressEvent::new(&self.job_id, &self.filename, phase, message);
        event.mime_type = self.mime_type.clone();
        event
    }

    fn send(&self, event: JobProgressEvent) {
        // No subscribers is not an error.
        let _ = self.sender.send(event);
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, event: ProgressEvent) {
        let event = match event {
            ProgressEvent::Phase { phase, message } => self.event(phase, &message),
            ProgressEvent::Completed {
                report_id,
                patient_id,
                is_new_patient,
            } => {
                let message = if is_new_patient {
                    "Report filed under new patient"
                } else {
                    "Report filed under existing patient"
                };
                let mut event = self.event(JobPhase::Completed, message);
                event.report_id = Some(report_id);
                event.patient_id = Some(patient_id);
                event
            }
            ProgressEvent::Skipped { reason } => self.event(JobPhase::Skipped, &reason),
            ProgressEvent::Failed { stage, error } => {
                let mut event = self.event(JobPhase::Failed, "Processing failed");
                event.stage = Some(stage);
                event.error = Some(error);
                event
            }
        };
        self.send(event);
    }
}
