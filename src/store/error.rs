//! Errors raised by the photo cache and the preferences database.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Cannot open cache database {path}: {source}")]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },

    /// Creating the tables or setting `user_version` failed.
    #[error("Cannot prepare cache schema: {0}")]
    Migration(#[from] rusqlite::Error),

    #[error("Cache query failed: {0}")]
    Query(#[source] rusqlite::Error),

    /// A thread panicked while holding the connection.
    #[error("Cache connection is unusable after a panic")]
    Poisoned,

    /// The blocking task running the statement panicked or was cancelled.
    #[error("Cache worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    /// Written by a newer trackr.
    #[error("Cache schema version {found} is newer than supported version {expected}")]
    UnsupportedSchemaVersion { found: i32, expected: i32 },
}

impl StoreError {
    pub fn query(source: rusqlite::Error) -> Self {
        Self::Query(source)
    }
}
