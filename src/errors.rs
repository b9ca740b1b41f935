//! # Store Errors
//!
//! Error taxonomy shared by the compiler, the storage seam and the store.
//!
//! Everything except index-creation failure propagates to the immediate
//! caller unchanged. Nothing here is retried.

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Store errors
///
/// `Clone` because the outcome of the one-time connection bring-up is
/// handed to every waiter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    // ==================
    // Bring-up
    // ==================
    /// The one-time connection bring-up failed
    #[error("Connection failed: {0}")]
    ConnectionFailure(String),

    /// Configuration could not be loaded or is invalid
    #[error("Invalid configuration: {0}")]
    Config(String),

    // ==================
    // Caller input
    // ==================
    /// A predicate in the sequence is structurally invalid
    #[error("Malformed predicate at position {index}: {reason}")]
    MalformedPredicate { index: usize, reason: String },

    /// A string could not be converted to a native identifier
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    // ==================
    // Results
    // ==================
    /// A raw document lacks an identifier
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    // ==================
    // Engine
    // ==================
    /// Failure reported by the storage engine during execution
    #[error("Storage operation failed: {0}")]
    StorageOperation(String),

    /// Index creation failed. Never surfaced by the store.
    #[error("Index creation failed: {0}")]
    IndexCreation(String),
}

impl StoreError {
    /// Create a malformed predicate error
    pub fn malformed_predicate(index: usize, reason: impl Into<String>) -> Self {
        Self::MalformedPredicate {
            index,
            reason: reason.into(),
        }
    }

    /// Create a storage operation error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::StorageOperation(msg.into())
    }

    /// Get a stable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConnectionFailure(_) => "DOCQ_CONNECTION_FAILED",
            Self::Config(_) => "DOCQ_CONFIG_INVALID",
            Self::MalformedPredicate { .. } => "DOCQ_MALFORMED_PREDICATE",
            Self::InvalidIdentifier(_) => "DOCQ_INVALID_IDENTIFIER",
            Self::MalformedDocument(_) => "DOCQ_MALFORMED_DOCUMENT",
            Self::StorageOperation(_) => "DOCQ_STORAGE_FAILED",
            Self::IndexCreation(_) => "DOCQ_INDEX_CREATION_FAILED",
        }
    }

    /// A failed bring-up cannot be recovered without restarting the store
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConnectionFailure(_))
    }
}
