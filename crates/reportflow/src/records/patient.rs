//! Patient domain type and identity helpers.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db::patient_repo::PatientRow;
use crate::db::PersistenceError;

/// Placeholder used for a missing name or gender.
pub const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub patient_id: String,
    pub name: String,
    /// Normalized to `YYYY-MM-DD`.
    pub date_of_birth: Option<String>,
    pub gender: String,
    pub phone_number: Option<String>,
    /// Report ids in the order they were attached.
    pub report_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    pub(crate) fn from_row(row: PatientRow, report_ids: Vec<String>) -> Result<Self, PersistenceError> {
        let created_at = parse_timestamp("patient", &row.patient_id, &row.created_at)?;
        let updated_at = parse_timestamp("patient", &row.patient_id, &row.updated_at)?;
        Ok(Self {
            patient_id: row.patient_id,
            name: row.name,
            date_of_birth: row.date_of_birth,
            gender: row.gender.unwrap_or_else(|| UNKNOWN.to_string()),
            phone_number: row.phone_number.filter(|p| !p.trim().is_empty()),
            report_ids,
            created_at,
            updated_at,
        })
    }
}

pub(crate) fn parse_timestamp(
    entity: &'static str,
    id: &str,
    value: &str,
) -> Result<DateTime<Utc>, PersistenceError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PersistenceError::CorruptRow {
            entity,
            id: id.to_string(),
            reason: format!("bad timestamp {:?}: {}", value, e),
        })
}

/// Generates `PAT_<epoch millis>_<9 base-36 chars>`.
pub fn generate_patient_id() -> String {
    const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    let mut entropy = uuid::Uuid::new_v4().as_u128();
    let mut suffix = String::with_capacity(9);
    for _ in 0..9 {
        suffix.push(ALPHABET[(entropy % 36) as usize] as char);
        entropy /= 36;
    }

    format!("PAT_{}_{}", Utc::now().timestamp_millis(), suffix)
}

const DOB_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Normalizes a date of birth to `YYYY-MM-DD`. Returns `None` when the
/// value matches no supported format.
pub fn normalize_date_of_birth(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let date = DOB_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.date_naive())
        })?;

    Some(date.format("%Y-%m-%d").to_string())
}
