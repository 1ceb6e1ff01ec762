//! Domain error types.

use store::StoreError;
use thiserror::Error;

use crate::access::AccessError;
use crate::order::OrderError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An order or catalog rule was violated.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// The caller may not perform the operation.
    #[error("Access error: {0}")]
    Access(#[from] AccessError),

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for DomainError {
    /// Store errors describing a rule violation become order errors; the
    /// rest stay infrastructure failures.
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { entity, id } => OrderError::NotFound { entity, id }.into(),
            StoreError::MissingReference { entity, id } => {
                OrderError::InvalidReference { entity, id }.into()
            }
            StoreError::AlreadyExists { entity, key } => {
                OrderError::AlreadyExists { entity, key }.into()
            }
            StoreError::ReferenceInUse { entity, id } => {
                OrderError::InUse { entity, id }.into()
            }
            StoreError::InvalidInput(message) => OrderError::InvalidInput(message).into(),
            other => DomainError::Store(other),
        }
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
