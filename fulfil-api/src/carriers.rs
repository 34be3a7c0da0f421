use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use fulfil_core::Actor;
use fulfil_order::{Carrier, CarrierChangeLog, OrderSummary};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListCarriersQuery {
    #[serde(default)]
    pub active_only: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateCarrierRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChangeCarrierRequest {
    pub carrier_id: Uuid,
    pub reason: String,
    #[serde(default)]
    pub override_lock: bool,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/carriers", get(list_carriers).post(create_carrier))
        .route("/v1/carriers/{id}", get(get_carrier))
        .route("/v1/carriers/{id}/active", put(set_carrier_active))
        .route("/v1/orders/{id}/carrier", post(change_carrier))
        .route("/v1/orders/{id}/carrier-changes", get(carrier_changes))
}

// ============================================================================
// Carrier catalog
// ============================================================================

/// GET /v1/carriers
pub async fn list_carriers(
    State(state): State<AppState>,
    Query(query): Query<ListCarriersQuery>,
) -> Result<Json<Vec<Carrier>>, AppError> {
    Ok(Json(state.engine.carriers().list_carriers(query.active_only).await?))
}

/// POST /v1/carriers
pub async fn create_carrier(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<CreateCarrierRequest>,
) -> Result<(StatusCode, Json<Carrier>), AppError> {
    let carrier = state.engine.carriers().register_carrier(&req.name, &actor).await?;
    Ok((StatusCode::CREATED, Json(carrier)))
}

/// GET /v1/carriers/{id}
pub async fn get_carrier(
    State(state): State<AppState>,
    Path(carrier_id): Path<Uuid>,
) -> Result<Json<Carrier>, AppError> {
    Ok(Json(state.engine.carriers().get_carrier(carrier_id).await?))
}

/// PUT /v1/carriers/{id}/active
pub async fn set_carrier_active(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(carrier_id): Path<Uuid>,
    Json(req): Json<SetActiveRequest>,
) -> Result<Json<Carrier>, AppError> {
    Ok(Json(
        state
            .engine
            .carriers()
            .set_carrier_active(carrier_id, req.active, &actor)
            .await?,
    ))
}

// ============================================================================
// Order carrier
// ============================================================================

/// POST /v1/orders/{id}/carrier
pub async fn change_carrier(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<ChangeCarrierRequest>,
) -> Result<Json<OrderSummary>, AppError> {
    Ok(Json(
        state
            .engine
            .change_carrier(order_id, req.carrier_id, &req.reason, req.override_lock, &actor)
            .await?,
    ))
}

/// GET /v1/orders/{id}/carrier-changes
pub async fn carrier_changes(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Vec<CarrierChangeLog>>, AppError> {
    Ok(Json(state.engine.carrier_changes_for(order_id).await?))
}
