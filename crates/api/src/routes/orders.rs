//! Order lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use domain::{CreateOrder, ListOrders, OrderPage, OrderView, SortKey, SortOrder, SweepReport};
use serde::Deserialize;
use store::{CustomerVehicleId, OrderId, OrderStatus, OrderStore, ServiceId, UserId};

use super::{AppState, parse_id};
use crate::auth::Authenticated;
use crate::error::ApiError;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub customer_vehicle_id: CustomerVehicleId,
    pub employee_id: UserId,
    /// Defaults to the calling administrator.
    pub administrator_id: Option<UserId>,
    #[serde(default)]
    pub service_ids: Vec<ServiceId>,
}

#[derive(Debug, Deserialize)]
pub struct AddServicesRequest {
    pub service_ids: Vec<ServiceId>,
}

/// Query string of `GET /orders`.
///
/// `sort_by` is a comma-separated list of keys, most significant first.
#[derive(Debug, Default, Deserialize)]
pub struct ListOrdersParams {
    pub skip: Option<usize>,
    pub limit: Option<usize>,
    pub status: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl ListOrdersParams {
    fn into_listing(self) -> Result<ListOrders, ApiError> {
        let mut listing = ListOrders::new();
        if let Some(skip) = self.skip {
            listing = listing.skip(skip);
        }
        if let Some(limit) = self.limit {
            listing = listing.limit(limit);
        }
        if let Some(status) = self.status {
            listing = listing.status(parse_status(&status)?);
        }

        let order = match self.sort_order {
            Some(order) => order.parse::<SortOrder>().map_err(bad_request)?,
            None => SortOrder::default(),
        };
        let keys = self
            .sort_by
            .iter()
            .flat_map(|keys| keys.split(','))
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(|key| key.parse::<SortKey>().map_err(bad_request))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(listing.sort_by(keys, order))
    }
}

/// Accepts a status label or its numeric code.
fn parse_status(value: &str) -> Result<OrderStatus, ApiError> {
    value
        .parse::<OrderStatus>()
        .or_else(|err| {
            value
                .parse::<i32>()
                .ok()
                .and_then(OrderStatus::from_code)
                .ok_or(err)
        })
        .map_err(bad_request)
}

fn bad_request(err: impl std::fmt::Display) -> ApiError {
    ApiError::BadRequest(err.to_string())
}

// -- Handlers --

/// POST /orders: open an order for a customer vehicle.
#[tracing::instrument(skip(state, caller, req), fields(user_id = %caller.user_id))]
pub async fn create<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderView>), ApiError> {
    caller.require_administrator("create orders")?;

    let request = CreateOrder::new(
        req.customer_vehicle_id,
        req.employee_id,
        req.administrator_id.unwrap_or(caller.user_id),
    )
    .with_services(req.service_ids);
    let order = state.order_service.create(request).await?;
    let view = state.order_service.summarize(&order).await?;

    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /orders: list the orders visible to the caller.
#[tracing::instrument(skip(state, caller), fields(user_id = %caller.user_id))]
pub async fn list<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Query(params): Query<ListOrdersParams>,
) -> Result<Json<OrderPage>, ApiError> {
    let listing = params.into_listing()?;
    let page = state.order_service.list(&caller, listing).await?;
    Ok(Json(page))
}

/// GET /orders/today: orders started during the current UTC day.
#[tracing::instrument(skip(state, caller), fields(user_id = %caller.user_id))]
pub async fn today<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
) -> Result<Json<Vec<OrderView>>, ApiError> {
    caller.require_administrator("list today's orders")?;
    Ok(Json(state.order_service.list_today().await?))
}

/// PUT /orders/update-statuses: run a completion sweep now.
#[tracing::instrument(skip(state, caller), fields(user_id = %caller.user_id))]
pub async fn sweep<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
) -> Result<Json<SweepReport>, ApiError> {
    caller.require_administrator("update order statuses")?;
    Ok(Json(state.order_service.sweep().await?))
}

/// GET /orders/{id}: an order with totals and display data.
#[tracing::instrument(skip(state, caller), fields(user_id = %caller.user_id))]
pub async fn get<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<OrderView>, ApiError> {
    caller.require_administrator("view orders")?;
    let order_id: OrderId = parse_id(&id)?;
    Ok(Json(state.order_service.get(order_id).await?))
}

/// DELETE /orders/{id}: remove an order in any state.
#[tracing::instrument(skip(state, caller), fields(user_id = %caller.user_id))]
pub async fn delete<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    caller.require_administrator("delete orders")?;
    let order_id: OrderId = parse_id(&id)?;
    state.order_service.delete(order_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /orders/{id}/services: attach services to an order in progress.
#[tracing::instrument(skip(state, caller, req), fields(user_id = %caller.user_id))]
pub async fn add_services<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
    Json(req): Json<AddServicesRequest>,
) -> Result<Json<OrderView>, ApiError> {
    caller.require_administrator("modify orders")?;
    let order_id: OrderId = parse_id(&id)?;

    let order = state
        .order_service
        .add_services(order_id, req.service_ids)
        .await?;
    Ok(Json(state.order_service.summarize(&order).await?))
}
