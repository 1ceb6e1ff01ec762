//! Domain layer for the car-wash order service.
//!
//! This crate provides:
//! - [`OrderService`] driving the order lifecycle: create, attach services,
//!   sweep due orders to completed, list and delete
//! - [`OrderAggregator`] computing totals and display data for an order
//! - [`CatalogService`] managing services, brands, car models, vehicles and users
//! - [`Caller`] role checks and listing scopes
//! - [`NotificationDispatcher`] for completion messages
//! - [`Clock`] as the time source for every time-dependent rule

pub mod access;
pub mod catalog;
pub mod clock;
pub mod error;
pub mod notification;
pub mod order;

pub use access::{AccessError, Caller};
pub use catalog::{
    BrandDraft, BrandUpdate, BrandView, CarModelDraft, CarModelUpdate, CarModelView,
    CatalogService, CustomerVehicleDraft, CustomerVehicleSummary, CustomerVehicleUpdate,
    DurationView, Page, PriceView, ServiceDraft, ServicePage, ServiceUpdate, ServiceView,
    UserDraft, UserView,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{DomainError, Result};
pub use notification::{
    InMemoryDispatcher, LoggingDispatcher, NotificationDispatcher, NotificationError,
    SentNotification,
};
pub use order::{
    CreateOrder, ListOrders, Money, OrderAggregator, OrderError, OrderPage, OrderService,
    OrderView, ServiceDuration, SortKey, SortOrder, SweepReport,
};
