//! Typed errors for the invoice store
//!
//! # Error Categories
//!
//! - [`StoreError`]: failures surfaced by a document store backend
//! - [`PersistenceError`]: the repository-level error, wrapping a [`StoreError`]
//!   with the operation and target document that failed
//! - [`ConfigError`]: configuration loading and validation
//!
//! # Example
//!
//! ```rust,ignore
//! match repository.update(&id, patch).await {
//!     Ok(updated) => println!("saved {}", updated.id),
//!     Err(e) if matches!(e.source, StoreError::NotFound { .. }) => {
//!         println!("invoice {} is gone", id);
//!     }
//!     Err(e) => eprintln!("{}", e),
//! }
//! ```

use crate::core::stored::DocumentId;
use std::fmt;
use thiserror::Error;

// =============================================================================
// Store Errors
// =============================================================================

/// Errors raised by a document store
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// The target document does not exist
    #[error("document '{id}' not found in collection '{collection}'")]
    NotFound { collection: String, id: DocumentId },

    /// The caller is not allowed to perform the operation
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The backend cannot be reached
    #[error("storage backend '{backend}' is unavailable: {message}")]
    Unavailable { backend: String, message: String },

    /// The request was malformed (bad query, unsupported value)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Any other backend failure
    #[error("{backend} error: {message}")]
    Backend { backend: String, message: String },
}

impl StoreError {
    pub fn unavailable(backend: &str, message: impl Into<String>) -> Self {
        StoreError::Unavailable {
            backend: backend.to_string(),
            message: message.into(),
        }
    }

    pub fn backend(backend: &str, message: impl Into<String>) -> Self {
        StoreError::Backend {
            backend: backend.to_string(),
            message: message.into(),
        }
    }

    /// Stable error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            StoreError::NotFound { .. } => "NOT_FOUND",
            StoreError::PermissionDenied(_) => "PERMISSION_DENIED",
            StoreError::Unavailable { .. } => "UNAVAILABLE",
            StoreError::InvalidArgument(_) => "INVALID_ARGUMENT",
            StoreError::Backend { .. } => "BACKEND_ERROR",
        }
    }
}

// =============================================================================
// Persistence Errors
// =============================================================================

/// Repository operation names, used for error context and log fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
    ListAll,
    Subscribe,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::ListAll => "list_all",
            Operation::Subscribe => "subscribe",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single error kind of the invoice repository
///
/// Carries the failing operation, the target invoice where there is one, and
/// the store's error unchanged as its source.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invoice {} failed{}: {}", .operation, target_suffix(.id), .source)]
pub struct PersistenceError {
    pub operation: Operation,
    pub id: Option<DocumentId>,
    #[source]
    pub source: StoreError,
}

impl PersistenceError {
    pub fn new(operation: Operation, id: Option<DocumentId>, source: StoreError) -> Self {
        Self {
            operation,
            id,
            source,
        }
    }

    pub fn error_code(&self) -> &'static str {
        self.source.error_code()
    }
}

fn target_suffix(id: &Option<DocumentId>) -> String {
    id.as_ref()
        .map(|id| format!(" for '{}'", id))
        .unwrap_or_default()
}

// =============================================================================
// Config Errors
// =============================================================================

/// Errors related to configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The configuration could not be parsed
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A configuration value is out of range
    #[error("invalid config value for '{field}': {message}")]
    Invalid { field: String, message: String },
}
