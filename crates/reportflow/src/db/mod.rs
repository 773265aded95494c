//! SQLite persistence for patients, reports and processing markers.
//!
//! Repositories are free functions over a shared [`Database`] handle;
//! every statement runs under the handle's connection lock.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::Connection;

pub mod error;
pub mod marker_repo;
pub mod migrations;
pub mod patient_repo;
pub mod report_repo;

pub use error::PersistenceError;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared handle to the reportflow database.
///
/// Clones share one connection. Workers writing patients and reports
/// concurrently take turns on its lock.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens the database file, creating it and its parent directory when
    /// missing, and brings the schema up to date.
    pub fn open(path: &Path) -> Result<Self, PersistenceError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PersistenceError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        // The daemon and an operator's sqlite3 shell may hold the file at once.
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        let db = Self::prepare(conn)?;
        log::info!("Database ready at {}", path.display());
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        Self::prepare(Connection::open_in_memory()?)
    }

    fn prepare(conn: Connection) -> Result<Self, PersistenceError> {
        // patient_reports rows must point at real patients and reports.
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        migrations::run_all(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` with the connection locked.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, PersistenceError>
    where
        F: FnOnce(&Connection) -> Result<T, PersistenceError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|_| PersistenceError::LockPoisoned)?;
        f(&conn)
    }
}

/// `~/.reportflow/data/reportflow.db`, or `None` without a home directory.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".reportflow").join("data").join("reportflow.db"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory_enforces_links() {
        let db = Database::open_in_memory().unwrap();
        let dangling = db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO patient_reports (patient_id, report_id, position)
                 VALUES ('PAT_missing', 'r-missing', 0)",
                [],
            )?;
            Ok(())
        });
        assert!(dangling.is_err());
    }

    #[test]
    fn test_open_file_db() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("test.db");
        let db = Database::open(&path).unwrap();
        db.with_conn(|conn| {
            let count: u32 =
                conn.query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))?;
            assert!(count > 0);
            Ok(())
        })
        .unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        {
            let db = Database::open(&path).unwrap();
            marker_repo::insert(&db, "/in/a.pdf", "2026-01-01T00:00:00Z").unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert!(marker_repo::exists(&db, "/in/a.pdf").unwrap());
    }

    #[test]
    fn test_default_database_path() {
        let path = default_database_path();
        assert!(path.is_some());
        let path = path.unwrap();
        assert!(path.ends_with("reportflow.db"));
        assert!(path.to_string_lossy().contains(".reportflow"));
    }

    #[test]
    fn test_clones_share_connection() {
        let db = Database::open_in_memory().unwrap();
        let other = db.clone();

        marker_repo::insert(&db, "/srv/uploads/a.pdf", "2026-01-01T00:00:00Z").unwrap();

        assert!(marker_repo::exists(&other, "/srv/uploads/a.pdf").unwrap());
        assert_eq!(marker_repo::count(&other).unwrap(), 1);
    }
}
