//! Error types for the usersettings-store crate.
//!
//! All store operations return [`StoreError`] via [`StoreResult`].
//! Absence of a setting is never an error: `get` returns `None` and
//! `delete` returns `false`.

use thiserror::Error;

/// Alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the settings store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The caller supplied an invalid argument (e.g. an empty key).
    #[error("validation error: {0}")]
    Validation(String),

    /// A value could not be encoded to, or decoded from, its JSON form.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// SQLite operation failed.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// A persisted value could not be decoded; the row is corrupt.
    #[error("stored value for key {key:?} is corrupt: {message}")]
    Corrupt { key: String, message: String },

    /// Filesystem failure while preparing the database location.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A schema migration failed.
    #[error("migration v{version} failed: {message}")]
    Migration { version: u32, message: String },

    /// A blocking task was cancelled or panicked.
    #[error("background task failed: {0}")]
    TaskJoin(String),
}

impl StoreError {
    /// Whether the failure was caused by the caller's input rather than the
    /// backend. Client errors must not be retried.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Serialization(_))
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoin(err.to_string())
    }
}
