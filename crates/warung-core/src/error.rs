//! Error types for warung.

use crate::cart::TransactionStatus;
use crate::ids::IdError;

/// Result type for warung domain operations.
pub type Result<T> = std::result::Result<T, CartError>;

/// Errors raised by catalog and cart operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    /// A product, transaction or line item reference did not resolve.
    ///
    /// `id` is the identifier exactly as the caller supplied it, so an operator can tell a
    /// mistyped scan code from a system fault.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record that was looked up.
        entity: &'static str,
        /// The identifier that failed to resolve.
        id: String,
    },

    /// The transaction is in the wrong lifecycle state for the operation.
    #[error("invalid state: transaction {id} is {status}")]
    InvalidState {
        /// The transaction ID.
        id: String,
        /// Its current status.
        status: TransactionStatus,
    },

    /// Input failed validation (non-positive quantity, missing field, ...).
    #[error("validation error: {0}")]
    Validation(String),

    /// An external collaborator failed or is not configured.
    #[error("{service} unavailable: {message}")]
    ExternalUnavailable {
        /// The collaborator that failed.
        service: String,
        /// Error message.
        message: String,
    },

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}

impl CartError {
    /// Shorthand for a `NotFound` error.
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
