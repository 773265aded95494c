//! Errors raised by the SQLite layer and the repositories.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Cannot prepare database location '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Migration failed at version {version}: {reason}")]
    Migration { version: u32, reason: String },

    /// A stored value could not be mapped back into a domain type.
    #[error("Corrupt {entity} row '{id}': {reason}")]
    CorruptRow {
        entity: &'static str,
        id: String,
        reason: String,
    },

    #[error("Database lock poisoned")]
    LockPoisoned,
}
