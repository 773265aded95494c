//! Report repository: the `reports` table.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, PersistenceError};

/// A raw report row from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub id: String,
    pub patient_id: String,
    pub original_file_name: String,
    pub file_location: String,
    pub mime_type: Option<String>,
    pub uploaded_by: Option<String>,
    pub upload_date: String,
    pub ocr_text: Option<String>,
    pub risk_level: String,
    pub cancer_positive_score: u8,
    pub normalized_score: f64,
    pub diagnosis_analysis: String,
    pub llm_generated_report: Option<String>,
    pub is_verified: bool,
    pub verified_by: Option<String>,
    pub doctor_comments: Option<String>,
    pub doctor_score: Option<i64>,
    pub verification_date: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl ReportRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            patient_id: row.get("patient_id")?,
            original_file_name: row.get("original_file_name")?,
            file_location: row.get("file_location")?,
            mime_type: row.get("mime_type")?,
            uploaded_by: row.get("uploaded_by")?,
            upload_date: row.get("upload_date")?,
            ocr_text: row.get("ocr_text")?,
            risk_level: row.get("risk_level")?,
            cancer_positive_score: row.get("cancer_positive_score")?,
            normalized_score: row.get("normalized_score")?,
            diagnosis_analysis: row.get("diagnosis_analysis")?,
            llm_generated_report: row.get("llm_generated_report")?,
            is_verified: row.get::<_, i64>("is_verified")? != 0,
            verified_by: row.get("verified_by")?,
            doctor_comments: row.get("doctor_comments")?,
            doctor_score: row.get("doctor_score")?,
            verification_date: row.get("verification_date")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// A report that is not referenced from its patient's report list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanRow {
    pub report_id: String,
    pub patient_id: String,
    pub file_location: String,
}

/// Inserts a new report row.
pub fn insert(db: &Database, report: &ReportRow) -> Result<(), PersistenceError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO reports (id, patient_id, original_file_name, file_location, mime_type,
             uploaded_by, upload_date, ocr_text, risk_level, cancer_positive_score,
             normalized_score, diagnosis_analysis, llm_generated_report, is_verified,
             verified_by, doctor_comments, doctor_score, verification_date, status,
             created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
             ?17, ?18, ?19, ?20, ?21)",
            params![
                report.id,
                report.patient_id,
                report.original_file_name,
                report.file_location,
                report.mime_type,
                report.uploaded_by,
                report.upload_date,
                report.ocr_text,
                report.risk_level,
                report.cancer_positive_score,
                report.normalized_score,
                report.diagnosis_analysis,
                report.llm_generated_report,
                report.is_verified as i64,
                report.verified_by,
                report.doctor_comments,
                report.doctor_score,
                report.verification_date,
                report.status,
                report.created_at,
                report.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a report by its id.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<ReportRow>, PersistenceError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM reports WHERE id = ?1",
                params![id],
                ReportRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Returns all reports created from the given file location, oldest first.
pub fn find_by_file_location(
    db: &Database,
    file_location: &str,
) -> Result<Vec<ReportRow>, PersistenceError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM reports WHERE file_location = ?1 ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt
            .query_map(params![file_location], ReportRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Returns all reports owned by a patient, oldest first.
pub fn find_by_patient(db: &Database, patient_id: &str) -> Result<Vec<ReportRow>, PersistenceError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM reports WHERE patient_id = ?1 ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt
            .query_map(params![patient_id], ReportRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Reports whose id is missing from their patient's ordered list.
pub fn find_orphans(db: &Database) -> Result<Vec<OrphanRow>, PersistenceError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT r.id, r.patient_id, r.file_location FROM reports r
             LEFT JOIN patient_reports pr
               ON pr.report_id = r.id AND pr.patient_id = r.patient_id
             WHERE pr.report_id IS NULL
             ORDER BY r.created_at ASC, r.rowid ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(OrphanRow {
                    report_id: row.get(0)?,
                    patient_id: row.get(1)?,
                    file_location: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// File locations that produced more than one report, with their counts.
pub fn duplicate_file_locations(db: &Database) -> Result<Vec<(String, u64)>, PersistenceError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT file_location, COUNT(*) AS n FROM reports
             GROUP BY file_location HAVING n > 1 ORDER BY file_location",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Counts all reports.
pub fn count(db: &Database) -> Result<u64, PersistenceError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM reports", [], |r| r.get(0))?;
        Ok(count)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::patient_repo::{self, PatientRow};

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        patient_repo::insert(
            &db,
            &PatientRow {
                patient_id: "PAT_1".to_string(),
                name: "Jane Doe".to_string(),
                date_of_birth: Some("1980-01-01".to_string()),
                gender: None,
                phone_number: None,
                created_at: "2026-01-01T00:00:00Z".to_string(),
                updated_at: "2026-01-01T00:00:00Z".to_string(),
            },
        )
        .unwrap();
        db
    }

    fn sample_report(id: &str, file_location: &str) -> ReportRow {
        ReportRow {
            id: id.to_string(),
            patient_id: "PAT_1".to_string(),
            original_file_name: "report1.pdf".to_string(),
            file_location: file_location.to_string(),
            mime_type: Some("application/pdf".to_string()),
            uploaded_by: None,
            upload_date: "2026-01-01T00:00:00Z".to_string(),
            ocr_text: Some(String::new()),
            risk_level: "high".to_string(),
            cancer_positive_score: 82,
            normalized_score: 0.82,
            diagnosis_analysis: "Malignant neoplasm".to_string(),
            llm_generated_report: Some("Malignant neoplasm".to_string()),
            is_verified: false,
            verified_by: None,
            doctor_comments: None,
            doctor_score: None,
            verification_date: None,
            status: "Completed".to_string(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        let report = sample_report("r1", "/uploads/report1.pdf");
        insert(&db, &report).unwrap();

        assert_eq!(find_by_id(&db, "r1").unwrap(), Some(report));
        assert_eq!(find_by_id(&db, "missing").unwrap(), None);
        assert_eq!(count(&db).unwrap(), 1);
    }

    #[test]
    fn test_insert_requires_existing_patient() {
        let db = test_db();
        let mut report = sample_report("r1", "/uploads/report1.pdf");
        report.patient_id = "PAT_NOPE".to_string();
        assert!(insert(&db, &report).is_err());
    }

    #[test]
    fn test_orphans_and_duplicates() {
        let db = test_db();
        insert(&db, &sample_report("r1", "/uploads/a.pdf")).unwrap();
        insert(&db, &sample_report("r2", "/uploads/a.pdf")).unwrap();
        insert(&db, &sample_report("r3", "/uploads/b.pdf")).unwrap();
        patient_repo::append_report(&db, "PAT_1", "r1").unwrap();
        patient_repo::append_report(&db, "PAT_1", "r3").unwrap();

        let orphans = find_orphans(&db).unwrap();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].report_id, "r2");

        let dupes = duplicate_file_locations(&db).unwrap();
        assert_eq!(dupes, vec![("/uploads/a.pdf".to_string(), 2)]);

        assert_eq!(find_by_file_location(&db, "/uploads/a.pdf").unwrap().len(), 2);
        assert_eq!(find_by_patient(&db, "PAT_1").unwrap().len(), 3);
    }
}
