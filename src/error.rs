//! Error types for the quote store and the sync layer.

use thiserror::Error;

/// Result type alias for quote store operations.
pub type Result<T> = std::result::Result<T, QuoteError>;

/// Failures of the durable or session storage.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The backend refused the write: the database is read-only or full.
    #[error("write rejected: {0}")]
    Rejected(String),
}

/// Failures talking to the remote quote source.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server responded {0}")]
    Status(u16),

    #[error("malformed response body: {0}")]
    Body(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum QuoteError {
    /// A single record was rejected; the rest of the operation is unaffected.
    #[error("invalid quote: {0}")]
    Validation(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The whole import document was unreadable.
    #[error("could not parse import: {0}")]
    Parse(String),
}

impl QuoteError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }
}
