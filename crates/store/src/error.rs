use thiserror::Error;

use crate::{OrderId, ServiceId};

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A record addressed by id does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The order changed since it was read.
    #[error(
        "Concurrency conflict for order {order_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        order_id: OrderId,
        expected: i64,
        actual: i64,
    },

    /// The service is already attached to the order.
    #[error("Service {service_id} is already attached to order {order_id}")]
    DuplicateAssociation {
        order_id: OrderId,
        service_id: ServiceId,
    },

    /// A uniquely keyed record already exists.
    #[error("{entity} already exists: {key}")]
    AlreadyExists { entity: &'static str, key: String },

    /// A referenced record does not exist.
    #[error("Referenced {entity} does not exist: {id}")]
    MissingReference { entity: &'static str, id: String },

    /// The record is still referenced and cannot be removed.
    #[error("{entity} {id} is still referenced")]
    ReferenceInUse { entity: &'static str, id: String },

    /// The record violates a storage invariant.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn missing_reference(entity: &'static str, id: impl ToString) -> Self {
        StoreError::MissingReference {
            entity,
            id: id.to_string(),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
