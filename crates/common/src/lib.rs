//! Shared types for the car-wash order service.

pub mod status;
pub mod types;

pub use status::{OrderStatus, ParseEnumError, Role};
pub use types::{BrandId, CarModelId, CustomerVehicleId, OrderId, ServiceId, UserId};
