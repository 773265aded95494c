//! Persists reports and links them to their patient.

use chrono::Utc;
use thiserror::Error;
use tracing::{error, info};

use super::patient::Patient;
use super::report::{clamp_score, DoctorVerification, FileInfo, Report, ReportStatus};
use crate::analysis::RiskAssessment;
use crate::db::{patient_repo, report_repo, Database, PersistenceError};

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("Failed to insert report: {0}")]
    Insert(#[source] PersistenceError),

    /// The report row exists but is missing from the patient's list.
    #[error("Report {report_id} was saved but could not be linked to patient {patient_id}: {source}")]
    Link {
        report_id: String,
        patient_id: String,
        #[source]
        source: PersistenceError,
    },
}

/// Insert-then-append report persistence.
///
/// The report row is written first and then appended to the patient's
/// ordered list. A failed append leaves an orphan report, which
/// [`super::ConsistencyScanner`] can find and repair.
#[derive(Clone)]
pub struct ReportWriter {
    db: Database,
    status: ReportStatus,
}

impl ReportWriter {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            status: ReportStatus::Completed,
        }
    }

    /// Status given to newly written reports.
    pub fn with_status(mut self, status: ReportStatus) -> Self {
        self.status = status;
        self
    }

    pub fn write(
        &self,
        patient: &Patient,
        file: &FileInfo,
        assessment: &RiskAssessment,
    ) -> Result<Report, WriteError> {
        let now = Utc::now();
        let score = clamp_score(assessment.cancer_positive_score);

        let report = Report {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id: patient.patient_id.clone(),
            file: file.clone(),
            upload_date: now,
            ocr_text: String::new(),
            risk_level: assessment.risk_level,
            cancer_positive_score: score,
            normalized_score: f64::from(score) / 100.0,
            diagnosis_analysis: assessment.diagnosis_analysis.clone(),
            llm_generated_report: assessment.diagnosis_analysis.clone(),
            doctor_verification: DoctorVerification::default(),
            status: self.status,
            created_at: now,
            updated_at: now,
        };

        report_repo::insert(&self.db, &report.to_row()).map_err(WriteError::Insert)?;

        if let Err(e) = patient_repo::append_report(&self.db, &patient.patient_id, &report.id) {
            error!(
                report_id = %report.id,
                patient_id = %patient.patient_id,
                error = %e,
                "Report saved but not linked to patient; left orphaned"
            );
            return Err(WriteError::Link {
                report_id: report.id,
                patient_id: patient.patient_id.clone(),
                source: e,
            });
        }

        info!(
            report_id = %report.id,
            patient_id = %patient.patient_id,
            risk_level = %report.risk_level,
            score = report.cancer_positive_score,
            "Report written"
        );

        Ok(report)
    }

    /// Loads a report by id.
    pub fn find(&self, report_id: &str) -> Result<Option<Report>, PersistenceError> {
        report_repo::find_by_id(&self.db, report_id)?
            .map(Report::from_row)
            .transpose()
    }
}
