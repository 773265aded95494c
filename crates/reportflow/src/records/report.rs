//! Report domain types.

use std::path::{Component, Path};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::patient::parse_timestamp;
use crate::analysis::RiskLevel;
use crate::db::report_repo::ReportRow;
use crate::db::PersistenceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportStatus {
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
        }
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "In Progress" => Ok(Self::InProgress),
            "Completed" => Ok(Self::Completed),
            other => Err(format!("unknown report status {:?}", other)),
        }
    }
}

/// Clinician review state. New reports are always unverified.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorVerification {
    pub is_verified: bool,
    pub verified_by: Option<String>,
    pub comments: Option<String>,
    pub score: Option<i64>,
    pub verification_date: Option<DateTime<Utc>>,
}

/// Where a report's source file lives and what it was called.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub original_file_name: String,
    /// Public reference, `<prefix>/<file name>`.
    pub file_location: String,
    pub mime_type: Option<String>,
    pub uploaded_by: Option<String>,
}

impl FileInfo {
    /// Describes an incoming file. The location keeps the path below
    /// `incoming_dir`, so same-named files in different subfolders stay
    /// distinct. Returns `None` for paths without a file name.
    pub fn for_incoming(
        path: &Path,
        incoming_dir: &Path,
        location_prefix: &str,
        mime_type: Option<String>,
    ) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().into_owned();
        let relative = relative_location(path, incoming_dir).unwrap_or_else(|| name.clone());
        Some(Self {
            file_location: format!("{}/{}", location_prefix.trim_end_matches('/'), relative),
            original_file_name: name,
            mime_type,
            uploaded_by: None,
        })
    }
}

/// `path` below `incoming_dir`, joined with `/`. Job paths come from a
/// canonicalized directory, so the canonical form is tried too.
fn relative_location(path: &Path, incoming_dir: &Path) -> Option<String> {
    let relative = path.strip_prefix(incoming_dir).ok().or_else(|| {
        let canonical = incoming_dir.canonicalize().ok()?;
        path.strip_prefix(canonical).ok()
    })?;

    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub patient_id: String,
    pub file: FileInfo,
    pub upload_date: DateTime<Utc>,
    pub ocr_text: String,
    pub risk_level: RiskLevel,
    pub cancer_positive_score: u8,
    /// Legacy `cancer_positive_score / 100`.
    pub normalized_score: f64,
    pub diagnosis_analysis: String,
    /// Legacy copy of `diagnosis_analysis`.
    pub llm_generated_report: String,
    pub doctor_verification: DoctorVerification,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Report {
    pub(crate) fn to_row(&self) -> ReportRow {
        let verification = &self.doctor_verification;
        ReportRow {
            id: self.id.clone(),
            patient_id: self.patient_id.clone(),
            original_file_name: self.file.original_file_name.clone(),
            file_location: self.file.file_location.clone(),
            mime_type: self.file.mime_type.clone(),
            uploaded_by: self.file.uploaded_by.clone(),
            upload_date: self.upload_date.to_rfc3339(),
            ocr_text: Some(self.ocr_text.clone()),
            risk_level: self.risk_level.as_str().to_string(),
            cancer_positive_score: self.cancer_positive_score,
            normalized_score: self.normalized_score,
            diagnosis_analysis: self.diagnosis_analysis.clone(),
            llm_generated_report: Some(self.llm_generated_report.clone()),
            is_verified: verification.is_verified,
            verified_by: verification.verified_by.clone(),
            doctor_comments: verification.comments.clone(),
            doctor_score: verification.score,
            verification_date: verification.verification_date.map(|d| d.to_rfc3339()),
            status: self.status.as_str().to_string(),
            created_at: self.created_at.to_rfc3339(),
            updated_at: self.updated_at.to_rfc3339(),
        }
    }

    pub(crate) fn from_row(row: ReportRow) -> Result<Self, PersistenceError> {
        let corrupt = |reason: String| PersistenceError::CorruptRow {
            entity: "report",
            id: row.id.clone(),
            reason,
        };
        let status = ReportStatus::from_str(&row.status).map_err(corrupt)?;
        let verification_date = row
            .verification_date
            .as_deref()
            .map(|d| parse_timestamp("report", &row.id, d))
            .transpose()?;

        Ok(Self {
            upload_date: parse_timestamp("report", &row.id, &row.upload_date)?,
            created_at: parse_timestamp("report", &row.id, &row.created_at)?,
            updated_at: parse_timestamp("report", &row.id, &row.updated_at)?,
            risk_level: RiskLevel::parse_lenient(&row.risk_level),
            llm_generated_report: row
                .llm_generated_report
                .unwrap_or_else(|| row.diagnosis_analysis.clone()),
            doctor_verification: DoctorVerification {
                is_verified: row.is_verified,
                verified_by: row.verified_by,
                comments: row.doctor_comments,
                score: row.doctor_score,
                verification_date,
            },
            file: FileInfo {
                original_file_name: row.original_file_name,
                file_location: row.file_location,
                mime_type: row.mime_type,
                uploaded_by: row.uploaded_by,
            },
            id: row.id,
            patient_id: row.patient_id,
            ocr_text: row.ocr_text.unwrap_or_default(),
            cancer_positive_score: row.cancer_positive_score,
            normalized_score: row.normalized_score,
            diagnosis_analysis: row.diagnosis_analysis,
            status,
        })
    }
}

/// Clamps a raw engine score into `0..=100` and rounds it. NaN maps to 0.
pub fn clamp_score(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.clamp(0.0, 100.0).round() as u8
}
