//! Finds or creates the patient that owns an analyzed report.

use chrono::Utc;
use tracing::{debug, info, warn};

use super::patient::{generate_patient_id, normalize_date_of_birth, Patient, UNKNOWN};
use crate::analysis::PatientMetadata;
use crate::db::patient_repo::{self, PatientRow};
use crate::db::{Database, PersistenceError};

/// Result of [`PatientResolver::resolve`].
#[derive(Debug, Clone)]
pub struct Resolution {
    pub patient: Patient,
    pub is_new: bool,
}

/// Exact-match identity resolution on `(name, date_of_birth)`.
///
/// There is no fuzzy matching: a misspelled name yields a second patient.
/// Metadata without a usable name or date of birth always creates a new
/// patient. Two first-time reports for the same identity processed at
/// the same moment can both create a patient.
#[derive(Clone)]
pub struct PatientResolver {
    db: Database,
}

impl PatientResolver {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn resolve(&self, metadata: &PatientMetadata) -> Result<Resolution, PersistenceError> {
        let date_of_birth = metadata.date_of_birth.as_deref().and_then(|raw| {
            let normalized = normalize_date_of_birth(raw);
            if normalized.is_none() {
                warn!("Unparseable date of birth from analysis; treating as absent");
            }
            normalized
        });

        let name = metadata
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty() && *n != UNKNOWN);

        if let (Some(name), Some(dob)) = (name, date_of_birth.as_deref()) {
            if let Some(existing) = patient_repo::find_by_identity(&self.db, name, dob)? {
                let patient_id = existing.patient_id.clone();
                self.backfill_phone(&existing, metadata)?;
                debug!(patient_id = %patient_id, "Matched existing patient");
                return Ok(Resolution {
                    patient: self.load(&patient_id)?,
                    is_new: false,
                });
            }
        }

        self.create(metadata, name, date_of_birth)
    }

    fn backfill_phone(
        &self,
        existing: &PatientRow,
        metadata: &PatientMetadata,
    ) -> Result<(), PersistenceError> {
        let has_phone = existing
            .phone_number
            .as_deref()
            .is_some_and(|p| !p.trim().is_empty());
        if has_phone {
            return Ok(());
        }
        if let Some(phone) = metadata.phone_number.as_deref() {
            let now = Utc::now().to_rfc3339();
            if patient_repo::backfill_phone(&self.db, &existing.patient_id, phone, &now)? {
                info!(patient_id = %existing.patient_id, "Backfilled phone number");
            }
        }
        Ok(())
    }

    fn create(
        &self,
        metadata: &PatientMetadata,
        name: Option<&str>,
        date_of_birth: Option<String>,
    ) -> Result<Resolution, PersistenceError> {
        let now = Utc::now().to_rfc3339();
        let row = PatientRow {
            patient_id: generate_patient_id(),
            name: name.unwrap_or(UNKNOWN).to_string(),
            date_of_birth,
            gender: Some(
                metadata
                    .sex
                    .clone()
                    .unwrap_or_else(|| UNKNOWN.to_string()),
            ),
            phone_number: metadata.phone_number.clone(),
            created_at: now.clone(),
            updated_at: now,
        };
        patient_repo::insert(&self.db, &row)?;

        info!(patient_id = %row.patient_id, "Created patient");

        Ok(Resolution {
            patient: Patient::from_row(row, Vec::new())?,
            is_new: true,
        })
    }

    /// Loads a patient with its ordered report ids.
    pub fn load(&self, patient_id: &str) -> Result<Patient, PersistenceError> {
        let row = patient_repo::find_by_id(&self.db, patient_id)?.ok_or_else(|| {
            PersistenceError::CorruptRow {
                entity: "patient",
                id: patient_id.to_string(),
                reason: "patient disappeared during resolution".to_string(),
            }
        })?;
        let report_ids = patient_repo::report_ids(&self.db, patient_id)?;
        Patient::from_row(row, report_ids)
    }
}
