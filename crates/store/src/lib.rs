//! Persistence for the car-wash order service.
//!
//! This crate owns the storage side of the order lifecycle:
//! - [`OrderRepository`] for orders and their service associations
//! - [`CatalogStore`] for brands, car models, users, customer vehicles and services
//! - [`InMemoryOrderStore`] and [`PostgresOrderStore`] implementing both

pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod records;
pub mod store;

pub use common::{
    BrandId, CarModelId, CustomerVehicleId, OrderId, OrderStatus, ParseEnumError, Role, ServiceId,
    UserId,
};
pub use error::{Result, StoreError};
pub use memory::InMemoryOrderStore;
pub use postgres::PostgresOrderStore;
pub use query::OrderQuery;
pub use records::{
    BrandPatch, BrandRecord, CarModelPatch, CarModelRecord, CustomerVehiclePatch,
    CustomerVehicleRecord, NewBrand, NewCarModel, NewCustomerVehicle, NewOrder, NewService,
    NewUser, OrderRecord, ServiceAttachment, ServicePatch, ServiceRecord, StatusTransition,
    UserRecord,
};
pub use store::{CatalogStore, OrderRepository, OrderStore};
