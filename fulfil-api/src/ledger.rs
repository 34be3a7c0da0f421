use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Extension, Json, Router,
};
use fulfil_core::Actor;
use fulfil_order::{CashLedgerEntry, RegisterCash, RegisterOutcome};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/orders/{id}/cash", post(register_cash).get(get_cash_entry))
        .route("/v1/cash/{entry_id}/accept", post(accept_cash))
}

/// POST /v1/orders/{id}/cash
pub async fn register_cash(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<RegisterCash>,
) -> Result<(StatusCode, Json<RegisterOutcome>), AppError> {
    let outcome = state.engine.ledger().register(order_id, req, &actor).await?;

    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome)))
}

/// GET /v1/orders/{id}/cash
pub async fn get_cash_entry(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Option<CashLedgerEntry>>, AppError> {
    Ok(Json(state.engine.ledger_entry_for(order_id).await?))
}

/// POST /v1/cash/{entry_id}/accept
/// Wallet confirms the money arrived.
pub async fn accept_cash(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<CashLedgerEntry>, AppError> {
    Ok(Json(state.engine.ledger().accept(entry_id, &actor).await?))
}
