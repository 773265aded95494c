//! Patient repository: the `patients` table and the ordered
//! `patient_reports` link table.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, PersistenceError};

/// A raw patient row from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientRow {
    pub patient_id: String,
    pub name: String,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub phone_number: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl PatientRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            patient_id: row.get("patient_id")?,
            name: row.get("name")?,
            date_of_birth: row.get("date_of_birth")?,
            gender: row.get("gender")?,
            phone_number: row.get("phone_number")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Inserts a new patient row. Fails if the patient id already exists.
pub fn insert(db: &Database, patient: &PatientRow) -> Result<(), PersistenceError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO patients (patient_id, name, date_of_birth, gender, phone_number,
             created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                patient.patient_id,
                patient.name,
                patient.date_of_birth,
                patient.gender,
                patient.phone_number,
                patient.created_at,
                patient.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a patient by its id.
pub fn find_by_id(db: &Database, patient_id: &str) -> Result<Option<PatientRow>, PersistenceError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM patients WHERE patient_id = ?1",
                params![patient_id],
                PatientRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Finds a patient by exact `(name, date_of_birth)` equality.
///
/// When duplicates exist the oldest record wins, so repeated lookups are stable.
pub fn find_by_identity(
    db: &Database,
    name: &str,
    date_of_birth: &str,
) -> Result<Option<PatientRow>, PersistenceError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM patients WHERE name = ?1 AND date_of_birth = ?2
                 ORDER BY created_at ASC, rowid ASC LIMIT 1",
                params![name, date_of_birth],
                PatientRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Sets the phone number only if the stored one is missing or blank.
/// Returns true if the row was updated.
pub fn backfill_phone(
    db: &Database,
    patient_id: &str,
    phone_number: &str,
    updated_at: &str,
) -> Result<bool, PersistenceError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE patients SET phone_number = ?2, updated_at = ?3
             WHERE patient_id = ?1 AND (phone_number IS NULL OR phone_number = '')",
            params![patient_id, phone_number, updated_at],
        )?;
        Ok(changed > 0)
    })
}

/// Appends a report id to the end of the patient's ordered report list.
pub fn append_report(
    db: &Database,
    patient_id: &str,
    report_id: &str,
) -> Result<(), PersistenceError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO patient_reports (patient_id, report_id, position)
             SELECT ?1, ?2, COALESCE(MAX(position) + 1, 0)
             FROM patient_reports WHERE patient_id = ?1",
            params![patient_id, report_id],
        )?;
        Ok(())
    })
}

/// Returns the patient's report ids in append order.
pub fn report_ids(db: &Database, patient_id: &str) -> Result<Vec<String>, PersistenceError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT report_id FROM patient_reports WHERE patient_id = ?1 ORDER BY position ASC",
        )?;
        let ids = stmt
            .query_map(params![patient_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    })
}

/// Counts all patients.
pub fn count(db: &Database) -> Result<u64, PersistenceError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM patients", [], |r| r.get(0))?;
        Ok(count)
    })
}
