//! HTTP route handlers.

pub mod catalog;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod services;

use std::str::FromStr;
use std::sync::Arc;

use domain::catalog::DEFAULT_PAGE_LIMIT;
use domain::{CatalogService, OrderService};
use serde::Deserialize;
use store::OrderStore;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: OrderStore> {
    pub order_service: Arc<OrderService<S>>,
    pub catalog_service: CatalogService<S>,
}

/// `skip`/`limit` query of the catalog listings.
#[derive(Debug, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_PAGE_LIMIT
}

/// Parses a path segment into a typed id.
pub(crate) fn parse_id<T>(id: &str) -> Result<T, ApiError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))
}
