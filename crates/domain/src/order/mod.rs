//! Order lifecycle and related types.

mod aggregator;
mod listing;
mod service;
mod value_objects;
mod view;

pub use aggregator::OrderAggregator;
pub use listing::{ListOrders, OrderPage, SortKey, SortOrder, sort_page};
pub use service::{CreateOrder, OrderService, SweepReport};
pub use value_objects::{Money, ServiceDuration};
pub use view::{
    CarView, CustomerView, CustomerVehicleView, DISPLAY_TIME_FORMAT, OrderView, PersonView,
    format_display_time,
};

use chrono::{DateTime, Utc};
use store::{OrderId, ServiceId, ServiceRecord};
use thiserror::Error;

/// Errors that can occur during order and catalog operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    /// A record addressed by id does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A request refers to a record that does not exist.
    #[error("Unknown {entity}: {id}")]
    InvalidReference { entity: &'static str, id: String },

    /// The order is not in a state that permits the operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The service is already attached to the order, or repeated in the request.
    #[error("Service '{name}' ({service_id}) is already in the order")]
    DuplicateService { service_id: ServiceId, name: String },

    /// The order kept changing while the operation was retried.
    #[error("Order {order_id} was modified concurrently")]
    Conflict { order_id: OrderId },

    /// A uniquely keyed record already exists.
    #[error("{entity} already exists: {key}")]
    AlreadyExists { entity: &'static str, key: String },

    /// The record is still referenced and cannot be removed.
    #[error("{entity} {id} is still in use")]
    InUse { entity: &'static str, id: String },

    /// The request carries invalid values.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl OrderError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        OrderError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn order_not_found(order_id: OrderId) -> Self {
        OrderError::NotFound {
            entity: "order",
            id: order_id.to_string(),
        }
    }
}

/// Sums the durations of services.
pub(crate) fn total_duration(services: &[ServiceRecord]) -> Result<ServiceDuration, OrderError> {
    ServiceDuration::checked_sum(
        services
            .iter()
            .map(|s| ServiceDuration::from_seconds(s.duration_seconds)),
    )
    .ok_or_else(|| OrderError::InvalidInput("total service time is out of range".to_string()))
}

/// Sums the prices of services.
pub(crate) fn total_price(services: &[ServiceRecord]) -> Result<Money, OrderError> {
    Money::checked_sum(
        services
            .iter()
            .map(|s| Money::from_minor_units(s.price_minor_units)),
    )
    .ok_or_else(|| OrderError::InvalidInput("total service price is out of range".to_string()))
}

/// The instant `duration` after `start`.
pub(crate) fn end_time_after(
    start: DateTime<Utc>,
    duration: ServiceDuration,
) -> Result<DateTime<Utc>, OrderError> {
    duration.after(start).ok_or_else(|| {
        OrderError::InvalidInput(format!(
            "order end time {} seconds after {start} is out of range",
            duration.seconds()
        ))
    })
}
