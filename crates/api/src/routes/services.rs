//! Service catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use domain::{ServiceDraft, ServicePage, ServiceUpdate, ServiceView};
use store::{OrderStore, ServiceId};

use super::{AppState, PageParams, parse_id};
use crate::auth::Authenticated;
use crate::error::ApiError;

/// POST /services: add a service to the catalog.
#[tracing::instrument(skip(state, caller))]
pub async fn create<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Json(draft): Json<ServiceDraft>,
) -> Result<(StatusCode, Json<ServiceView>), ApiError> {
    caller.require_administrator("create services")?;
    let service = state.catalog_service.create_service(draft).await?;
    Ok((StatusCode::CREATED, Json(service)))
}

/// GET /services: the catalog ordered by name.
#[tracing::instrument(skip(state, _caller))]
pub async fn list<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(_caller): Authenticated,
    Query(params): Query<PageParams>,
) -> Result<Json<ServicePage>, ApiError> {
    let page = state
        .catalog_service
        .list_services(params.skip, params.limit)
        .await?;
    Ok(Json(page))
}

/// GET /services/{id}
#[tracing::instrument(skip(state, _caller))]
pub async fn get<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(_caller): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<ServiceView>, ApiError> {
    let service_id: ServiceId = parse_id(&id)?;
    Ok(Json(state.catalog_service.get_service(service_id).await?))
}

/// PUT /services/{id}: change name, price or duration.
#[tracing::instrument(skip(state, caller))]
pub async fn update<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
    Json(update): Json<ServiceUpdate>,
) -> Result<Json<ServiceView>, ApiError> {
    caller.require_administrator("update services")?;
    let service_id: ServiceId = parse_id(&id)?;
    let service = state
        .catalog_service
        .update_service(service_id, update)
        .await?;
    Ok(Json(service))
}

/// DELETE /services/{id}: remove a service no order uses.
#[tracing::instrument(skip(state, caller))]
pub async fn delete<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    caller.require_administrator("delete services")?;
    let service_id: ServiceId = parse_id(&id)?;
    state.catalog_service.delete_service(service_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
