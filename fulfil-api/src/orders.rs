use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use fulfil_core::Actor;
use fulfil_order::lifecycle::{ApprovalOutcome, ClassifyOutcome, GuideOutcome};
use fulfil_order::{
    Classification, DeliveryTracking, NewOrder, Order, OrderSummary, PaymentSubmission, ReadyOutcome,
    WalletValidation,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ReasonRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ApprovePaymentRequest {
    #[serde(default)]
    pub submission: Option<PaymentSubmission>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PackagingRequest {
    #[serde(default)]
    pub carrier_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct TrackingRequest {
    pub tracking_number: String,
}

#[derive(Debug, Deserialize)]
pub struct AssignMessengerRequest {
    pub messenger_id: Uuid,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/orders", post(create_order))
        .route("/v1/orders/{id}", get(get_order))
        .route("/v1/orders/by-number/{number}", get(get_order_by_number))
        .route("/v1/orders/{id}/classify", post(classify_order))
        .route("/v1/orders/{id}/cancel", post(cancel_order))
        .route("/v1/orders/{id}/payment/approve", post(approve_payment))
        .route("/v1/orders/{id}/payment/reject", post(reject_payment))
        .route("/v1/orders/{id}/payment/validation", get(latest_validation))
        .route("/v1/orders/{id}/packaging", post(process_to_packaging))
        .route("/v1/orders/{id}/ready", post(mark_ready))
        .route("/v1/orders/{id}/shipping-guide", post(generate_shipping_guide))
        .route("/v1/orders/{id}/tracking-number", put(set_tracking_number))
        .route("/v1/orders/{id}/return-to-packaging", post(return_to_packaging))
        .route("/v1/orders/{id}/deliver/carrier", post(deliver_to_carrier))
        .route("/v1/orders/{id}/deliver/customer", post(deliver_to_customer))
        .route("/v1/orders/{id}/deliver/warehouse", post(deliver_at_warehouse))
        .route("/v1/orders/{id}/messenger", post(assign_messenger))
        .route("/v1/orders/{id}/messenger/accept", post(messenger_accept))
        .route("/v1/orders/{id}/messenger/reject", post(messenger_reject))
        .route("/v1/orders/{id}/messenger/start", post(start_delivery))
        .route("/v1/orders/{id}/messenger/complete", post(messenger_complete))
        .route("/v1/orders/{id}/messenger/fail", post(messenger_fail))
        .route("/v1/orders/{id}/delivery-tracking", get(delivery_tracking))
}

// ============================================================================
// Billing
// ============================================================================

/// POST /v1/orders
pub async fn create_order(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<NewOrder>,
) -> Result<(StatusCode, Json<OrderSummary>), AppError> {
    let summary = state.engine.create_order(req, &actor).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

/// GET /v1/orders/{id}
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.engine.get_order(order_id).await?))
}

/// GET /v1/orders/by-number/{number}
pub async fn get_order_by_number(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.engine.get_order_by_number(&order_number).await?))
}

/// POST /v1/orders/{id}/classify
pub async fn classify_order(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<Classification>,
) -> Result<Json<ClassifyOutcome>, AppError> {
    Ok(Json(state.engine.classify(order_id, req, &actor).await?))
}

/// POST /v1/orders/{id}/cancel
pub async fn cancel_order(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<ReasonRequest>,
) -> Result<Json<OrderSummary>, AppError> {
    Ok(Json(state.engine.cancel(order_id, &req.reason, &actor).await?))
}

// ============================================================================
// Wallet
// ============================================================================

/// POST /v1/orders/{id}/payment/approve
pub async fn approve_payment(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<ApprovePaymentRequest>,
) -> Result<Json<ApprovalOutcome>, AppError> {
    Ok(Json(state.engine.approve_payment(order_id, req.submission, &actor).await?))
}

/// POST /v1/orders/{id}/payment/reject
pub async fn reject_payment(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<ReasonRequest>,
) -> Result<Json<OrderSummary>, AppError> {
    Ok(Json(state.engine.reject_payment(order_id, &req.reason, &actor).await?))
}

/// GET /v1/orders/{id}/payment/validation
pub async fn latest_validation(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Option<WalletValidation>>, AppError> {
    Ok(Json(state.engine.latest_wallet_validation(order_id).await?))
}

// ============================================================================
// Logistics and packaging
// ============================================================================

/// POST /v1/orders/{id}/packaging
pub async fn process_to_packaging(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
    req: Option<Json<PackagingRequest>>,
) -> Result<Json<OrderSummary>, AppError> {
    let req = req.map(|Json(r)| r).unwrap_or_default();
    Ok(Json(state.engine.process_to_packaging(order_id, req.carrier_id, &actor).await?))
}

/// POST /v1/orders/{id}/ready
pub async fn mark_ready(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<ReadyOutcome>, AppError> {
    Ok(Json(state.engine.mark_ready(order_id, &actor).await?))
}

/// POST /v1/orders/{id}/shipping-guide
pub async fn generate_shipping_guide(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<GuideOutcome>, AppError> {
    Ok(Json(state.engine.generate_shipping_guide(order_id, &actor).await?))
}

/// PUT /v1/orders/{id}/tracking-number
pub async fn set_tracking_number(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<TrackingRequest>,
) -> Result<Json<OrderSummary>, AppError> {
    Ok(Json(
        state
            .engine
            .set_tracking_number(order_id, &req.tracking_number, &actor)
            .await?,
    ))
}

/// POST /v1/orders/{id}/return-to-packaging
pub async fn return_to_packaging(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<ReasonRequest>,
) -> Result<Json<OrderSummary>, AppError> {
    Ok(Json(state.engine.return_to_packaging(order_id, &req.reason, &actor).await?))
}

// ============================================================================
// Delivery
// ============================================================================

/// POST /v1/orders/{id}/deliver/carrier
pub async fn deliver_to_carrier(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderSummary>, AppError> {
    Ok(Json(state.engine.deliver_to_carrier(order_id, &actor).await?))
}

/// POST /v1/orders/{id}/deliver/customer
pub async fn deliver_to_customer(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderSummary>, AppError> {
    Ok(Json(state.engine.deliver_to_customer(order_id, &actor).await?))
}

/// POST /v1/orders/{id}/deliver/warehouse
pub async fn deliver_at_warehouse(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderSummary>, AppError> {
    Ok(Json(state.engine.deliver_at_warehouse(order_id, &actor).await?))
}

/// POST /v1/orders/{id}/messenger
pub async fn assign_messenger(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<AssignMessengerRequest>,
) -> Result<Json<OrderSummary>, AppError> {
    Ok(Json(state.engine.assign_messenger(order_id, req.messenger_id, &actor).await?))
}

/// POST /v1/orders/{id}/messenger/accept
pub async fn messenger_accept(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderSummary>, AppError> {
    Ok(Json(state.engine.messengers().accept(order_id, &actor).await?))
}

/// POST /v1/orders/{id}/messenger/reject
pub async fn messenger_reject(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderSummary>, AppError> {
    Ok(Json(state.engine.messengers().reject(order_id, &actor).await?))
}

/// POST /v1/orders/{id}/messenger/start
pub async fn start_delivery(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderSummary>, AppError> {
    Ok(Json(state.engine.start_delivery(order_id, &actor).await?))
}

/// POST /v1/orders/{id}/messenger/complete
pub async fn messenger_complete(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderSummary>, AppError> {
    Ok(Json(state.engine.messengers().complete(order_id, &actor).await?))
}

/// POST /v1/orders/{id}/messenger/fail
pub async fn messenger_fail(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<ReasonRequest>,
) -> Result<Json<OrderSummary>, AppError> {
    Ok(Json(state.engine.messengers().mark_failed(order_id, &req.reason, &actor).await?))
}

/// GET /v1/orders/{id}/delivery-tracking
pub async fn delivery_tracking(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Option<DeliveryTracking>>, AppError> {
    Ok(Json(state.engine.tracking_for(order_id).await?))
}
