//! Errors from the pipeline state store (extraction outcomes, progress,
//! run ledger and check results).

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The directory holding the state database could not be created.
    #[error("Cannot create state directory '{path}': {source}")]
    StateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Schema migration v{version} ({description}) failed: {reason}")]
    Migration {
        version: u32,
        description: &'static str,
        reason: String,
    },

    /// A thread panicked while holding the shared connection.
    #[error("State database connection poisoned")]
    LockPoisoned,
}
