//! Versioned schema migrations, recorded in `_migrations`.
//!
//! Each pending migration runs in its own transaction together with its
//! bookkeeping row, so a crash never leaves a half-applied version.

use rusqlite::Connection;

use super::error::PersistenceError;

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

/// All migrations in order. Each is applied at most once.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_patients_table",
        sql: include_str!("sql/001_create_patients.sql"),
    },
    Migration {
        version: 2,
        description: "create_reports_table",
        sql: include_str!("sql/002_create_reports.sql"),
    },
    Migration {
        version: 3,
        description: "create_patient_reports_table",
        sql: include_str!("sql/003_create_patient_reports.sql"),
    },
    Migration {
        version: 4,
        description: "create_processing_markers_table",
        sql: include_str!("sql/004_create_processing_markers.sql"),
    },
];

pub fn run_all(conn: &Connection) -> Result<(), PersistenceError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let applied: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > applied) {
        apply(conn, migration).map_err(|e| match e {
            PersistenceError::Migration { .. } => e,
            other => PersistenceError::Migration {
                version: migration.version,
                reason: other.to_string(),
            },
        })?;
    }

    Ok(())
}

fn apply(conn: &Connection, migration: &Migration) -> Result<(), PersistenceError> {
    log::info!(
        "Applying schema v{} ({})",
        migration.version,
        migration.description
    );

    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(migration.sql)?;
    tx.execute(
        "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
        rusqlite::params![migration.version, migration.description],
    )?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        conn
    }

    #[test]
    fn test_migrations_run_on_fresh_db() {
        let conn = fresh();
        run_all(&conn).unwrap();

        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = fresh();
        run_all(&conn).unwrap();
        run_all(&conn).unwrap();

        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as u32);
    }

    fn columns(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({})", table))
            .unwrap();
        stmt.query_map([], |row| row.get::<_, String>(1))
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
    }

    #[test]
    fn test_reports_table_has_mime_type() {
        let conn = fresh();
        run_all(&conn).unwrap();

        assert!(columns(&conn, "reports").iter().any(|c| c == "mime_type"));
    }

    #[test]
    fn test_versions_are_sequential() {
        for (i, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(migration.version as usize, i + 1, "{}", migration.description);
        }
    }

    #[test]
    fn test_partial_history_resumes_at_next_version() {
        let conn = fresh();
        conn.execute_batch(
            "CREATE TABLE _migrations (
                version INTEGER PRIMARY KEY,
                description TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )
        .unwrap();
        for migration in &MIGRATIONS[..2] {
            conn.execute_batch(migration.sql).unwrap();
            conn.execute(
                "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
                rusqlite::params![migration.version, migration.description],
            )
            .unwrap();
        }

        run_all(&conn).unwrap();

        assert!(!columns(&conn, "patient_reports").is_empty());
        assert!(!columns(&conn, "processing_markers").is_empty());
    }

    #[test]
    fn test_score_check_constraint() {
        let conn = fresh();
        run_all(&conn).unwrap();
        conn.execute(
            "INSERT INTO patients (patient_id, name, created_at, updated_at)
             VALUES ('PAT_1', 'Jane', '2026-01-01', '2026-01-01')",
            [],
        )
        .unwrap();

        let result = conn.execute(
            "INSERT INTO reports (id, patient_id, original_file_name, file_location, upload_date,
             cancer_positive_score, diagnosis_analysis, created_at, updated_at)
             VALUES ('r1', 'PAT_1', 'a.pdf', '/uploads/a.pdf', '2026-01-01', 150, 'x',
             '2026-01-01', '2026-01-01')",
            [],
        );
        assert!(result.is_err());
    }
}
