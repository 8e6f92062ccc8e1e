//! Error types shared across the crate.

use thiserror::Error;

/// Failures of the record store and the session log.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("stored date is malformed: {0}")]
    BadDate(String),
}

/// Failures loading embedded word lists and lessons.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LanguageError {
    #[error("language file not found: {0}")]
    NotFound(String),
    #[error("language file is not valid UTF-8: {0}")]
    NotUtf8(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("no lesson named {0}")]
    UnknownLesson(String),
}
