//! Processing marker repository: the `processing_markers` table.
//!
//! Rows are append-only: once a file id is recorded it is never updated.

use rusqlite::{params, OptionalExtension};

use super::{Database, PersistenceError};

/// A raw marker row from the database.
#[derive(Debug, Clone)]
pub struct MarkerRow {
    pub file_id: String,
    pub processed: bool,
    pub timestamp: String,
}

/// Inserts a marker. An existing marker for the same file id is left untouched.
pub fn insert(db: &Database, file_id: &str, timestamp: &str) -> Result<(), PersistenceError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT OR IGNORE INTO processing_markers (file_id, processed, timestamp)
             VALUES (?1, 1, ?2)",
            params![file_id, timestamp],
        )?;
        Ok(())
    })
}

/// Returns true if a processed marker exists for the file id.
pub fn exists(db: &Database, file_id: &str) -> Result<bool, PersistenceError> {
    Ok(find(db, file_id)?.map(|row| row.processed).unwrap_or(false))
}

/// Finds the marker for a file id.
pub fn find(db: &Database, file_id: &str) -> Result<Option<MarkerRow>, PersistenceError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT file_id, processed, timestamp FROM processing_markers WHERE file_id = ?1",
                params![file_id],
                |row| {
                    Ok(MarkerRow {
                        file_id: row.get(0)?,
                        processed: row.get::<_, i64>(1)? != 0,
                        timestamp: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    })
}

/// Counts all markers.
pub fn count(db: &Database) -> Result<u64, PersistenceError> {
    db.with_conn(|conn| {
        let count: u64 =
            conn.query_row("SELECT COUNT(*) FROM processing_markers", [], |r| r.get(0))?;
        Ok(count)
    })
}
