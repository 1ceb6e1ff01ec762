//! Endpoints for brands, car models, customer vehicles and users.
//!
//! Reads are open to every authenticated caller except where noted; writes
//! need an administrator.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use domain::{
    BrandDraft, BrandUpdate, BrandView, CarModelDraft, CarModelUpdate, CarModelView,
    CustomerVehicleDraft, CustomerVehicleSummary, CustomerVehicleUpdate, Page, UserDraft,
    UserView,
};
use store::{BrandId, CarModelId, CustomerVehicleId, OrderStore, UserId};

use super::{AppState, PageParams, parse_id};
use crate::auth::Authenticated;
use crate::error::ApiError;

/// POST /brands
#[tracing::instrument(skip(state, caller))]
pub async fn create_brand<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Json(draft): Json<BrandDraft>,
) -> Result<(StatusCode, Json<BrandView>), ApiError> {
    caller.require_administrator("create brands")?;
    let brand = state.catalog_service.create_brand(draft).await?;
    Ok((StatusCode::CREATED, Json(brand)))
}

/// GET /brands
#[tracing::instrument(skip(state, _caller))]
pub async fn list_brands<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(_caller): Authenticated,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<BrandView>>, ApiError> {
    let page = state
        .catalog_service
        .list_brands(params.skip, params.limit)
        .await?;
    Ok(Json(page))
}

/// GET /brands/{id}
#[tracing::instrument(skip(state, _caller))]
pub async fn get_brand<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(_caller): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<BrandView>, ApiError> {
    let brand_id: BrandId = parse_id(&id)?;
    Ok(Json(state.catalog_service.get_brand(brand_id).await?))
}

/// PUT /brands/{id}
#[tracing::instrument(skip(state, caller))]
pub async fn update_brand<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
    Json(update): Json<BrandUpdate>,
) -> Result<Json<BrandView>, ApiError> {
    caller.require_administrator("update brands")?;
    let brand_id: BrandId = parse_id(&id)?;
    let brand = state.catalog_service.update_brand(brand_id, update).await?;
    Ok(Json(brand))
}

/// DELETE /brands/{id}
#[tracing::instrument(skip(state, caller))]
pub async fn delete_brand<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    caller.require_administrator("delete brands")?;
    let brand_id: BrandId = parse_id(&id)?;
    state.catalog_service.delete_brand(brand_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /brands/by-name/{name}
#[tracing::instrument(skip(state, caller))]
pub async fn delete_brand_by_name<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    caller.require_administrator("delete brands")?;
    state.catalog_service.delete_brand_by_name(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /cars
#[tracing::instrument(skip(state, caller))]
pub async fn create_car_model<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Json(draft): Json<CarModelDraft>,
) -> Result<(StatusCode, Json<CarModelView>), ApiError> {
    caller.require_administrator("create car models")?;
    let car_model = state.catalog_service.create_car_model(draft).await?;
    Ok((StatusCode::CREATED, Json(car_model)))
}

/// GET /cars
#[tracing::instrument(skip(state, _caller))]
pub async fn list_car_models<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(_caller): Authenticated,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<CarModelView>>, ApiError> {
    let page = state
        .catalog_service
        .list_car_models(params.skip, params.limit)
        .await?;
    Ok(Json(page))
}

/// GET /cars/{id}
#[tracing::instrument(skip(state, _caller))]
pub async fn get_car_model<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(_caller): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<CarModelView>, ApiError> {
    let car_model_id: CarModelId = parse_id(&id)?;
    Ok(Json(state.catalog_service.get_car_model(car_model_id).await?))
}

/// PUT /cars/{id}
#[tracing::instrument(skip(state, caller))]
pub async fn update_car_model<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
    Json(update): Json<CarModelUpdate>,
) -> Result<Json<CarModelView>, ApiError> {
    caller.require_administrator("update car models")?;
    let car_model_id: CarModelId = parse_id(&id)?;
    let car_model = state
        .catalog_service
        .update_car_model(car_model_id, update)
        .await?;
    Ok(Json(car_model))
}

/// DELETE /cars/{id}
#[tracing::instrument(skip(state, caller))]
pub async fn delete_car_model<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    caller.require_administrator("delete car models")?;
    let car_model_id: CarModelId = parse_id(&id)?;
    state.catalog_service.delete_car_model(car_model_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /customer-cars
#[tracing::instrument(skip(state, caller))]
pub async fn create_customer_vehicle<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Json(draft): Json<CustomerVehicleDraft>,
) -> Result<(StatusCode, Json<CustomerVehicleSummary>), ApiError> {
    caller.require_administrator("register customer vehicles")?;
    let vehicle = state.catalog_service.create_customer_vehicle(draft).await?;
    Ok((StatusCode::CREATED, Json(vehicle)))
}

/// GET /customer-cars
#[tracing::instrument(skip(state, _caller))]
pub async fn list_customer_vehicles<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(_caller): Authenticated,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<CustomerVehicleSummary>>, ApiError> {
    let page = state
        .catalog_service
        .list_customer_vehicles(params.skip, params.limit)
        .await?;
    Ok(Json(page))
}

/// GET /customer-cars/{id}: administrators only.
#[tracing::instrument(skip(state, caller))]
pub async fn get_customer_vehicle<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<CustomerVehicleSummary>, ApiError> {
    caller.require_administrator("view customer vehicles")?;
    let vehicle_id: CustomerVehicleId = parse_id(&id)?;
    Ok(Json(
        state.catalog_service.get_customer_vehicle(vehicle_id).await?,
    ))
}

/// PUT /customer-cars/{id}
#[tracing::instrument(skip(state, caller))]
pub async fn update_customer_vehicle<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
    Json(update): Json<CustomerVehicleUpdate>,
) -> Result<Json<CustomerVehicleSummary>, ApiError> {
    caller.require_administrator("update customer vehicles")?;
    let vehicle_id: CustomerVehicleId = parse_id(&id)?;
    let vehicle = state
        .catalog_service
        .update_customer_vehicle(vehicle_id, update)
        .await?;
    Ok(Json(vehicle))
}

/// DELETE /customer-cars/{id}
#[tracing::instrument(skip(state, caller))]
pub async fn delete_customer_vehicle<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    caller.require_administrator("delete customer vehicles")?;
    let vehicle_id: CustomerVehicleId = parse_id(&id)?;
    state
        .catalog_service
        .delete_customer_vehicle(vehicle_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /users
#[tracing::instrument(skip(state, caller, draft))]
pub async fn register_user<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Json(draft): Json<UserDraft>,
) -> Result<(StatusCode, Json<UserView>), ApiError> {
    caller.require_administrator("register users")?;
    let user = state.catalog_service.register_user(draft).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /users: administrators only.
#[tracing::instrument(skip(state, caller))]
pub async fn list_users<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<UserView>>, ApiError> {
    caller.require_administrator("list users")?;
    let page = state
        .catalog_service
        .list_users(params.skip, params.limit)
        .await?;
    Ok(Json(page))
}

/// GET /users/me: the caller's own record.
#[tracing::instrument(skip(state, caller))]
pub async fn current_user<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
) -> Result<Json<UserView>, ApiError> {
    Ok(Json(state.catalog_service.get_user(caller.user_id).await?))
}

/// DELETE /users/{id}
#[tracing::instrument(skip(state, caller))]
pub async fn delete_user<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    caller.require_administrator("delete users")?;
    let user_id: UserId = parse_id(&id)?;
    state.catalog_service.delete_user(user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
