//! Error types for banyan.

use thiserror::Error;

/// Result type alias using banyan's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for banyan operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Note file not found
    #[error("Note file not found: {0}")]
    FileNotFound(i32),

    /// Note header not found
    #[error("Note not found: {0}")]
    NoteNotFound(i64),

    /// Caller's access token lacks the required capability
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Ordinal allocation lost a race twice in a row
    #[error("Ordinal conflict in file {file_id}: {detail}")]
    OrdinalConflict { file_id: i32, detail: String },

    /// Replication delivery or import failed
    #[error("Replication error: {0}")]
    Replication(String),

    /// Referential integrity violated (e.g. response without a base note)
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True when the underlying cause is a unique-constraint violation.
    ///
    /// Create paths use this to distinguish an ordinal race (retryable
    /// with a recomputed ordinal) from other database failures.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::Database(db)) => {
                db.code().as_deref() == Some("23505")
            }
            _ => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
