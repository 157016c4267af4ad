//! Error taxonomy shared by the persistence layer and the catalog service.
//!
//! Every variant is a distinct condition the front end can match on. Storage
//! failures keep the underlying `rusqlite` error as their source so the full
//! chain is still available for logging.

use std::io;

/// Result alias used throughout the library half of the crate.
pub type Result<T, E = CatalogError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// A required field is missing or out of range on a write.
    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },
    /// The referenced book or issue record does not exist.
    #[error("{0} not found")]
    NotFound(String),
    /// The book already has a live issue record.
    #[error("\"{0}\" is already issued")]
    AlreadyIssued(String),
    /// A return was requested for a book nobody holds.
    #[error("\"{0}\" is not currently issued")]
    NotIssued(String),
    /// The store could not be reached or a statement failed.
    #[error("{action}")]
    Storage {
        action: &'static str,
        #[source]
        source: rusqlite::Error,
    },
    /// Filesystem access outside the database (covers, exports).
    #[error("{action}")]
    Io {
        action: String,
        #[source]
        source: io::Error,
    },
    /// The tabular import payload could not be read.
    #[error("import row {row}: {message}")]
    ImportFormat { row: usize, message: String },
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}

impl CatalogError {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// True for failures that need operator attention rather than a corrected
    /// input (disk full, permissions, a corrupt database file).
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage { .. } | Self::Io { .. })
    }
}

/// Attach a short "failed to ..." description to a `rusqlite` result, the
/// same way the rest of the persistence layer phrases its failures.
pub(crate) trait StorageContext<T> {
    fn context(self, action: &'static str) -> Result<T>;
}

impl<T> StorageContext<T> for rusqlite::Result<T> {
    fn context(self, action: &'static str) -> Result<T> {
        self.map_err(|source| CatalogError::Storage { action, source })
    }
}
