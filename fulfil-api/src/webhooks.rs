use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use fulfil_order::IngestAck;
use fulfil_shared::InvoiceWebhook;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/webhooks/invoices", post(receive_invoice_webhook))
}

/// POST /v1/webhooks/invoices
/// Acknowledge an invoicing event and queue it for the ingestion worker.
pub async fn receive_invoice_webhook(
    State(state): State<AppState>,
    Json(payload): Json<InvoiceWebhook>,
) -> Result<(StatusCode, Json<IngestAck>), AppError> {
    tracing::info!(
        "Received invoicing webhook {} for order {}",
        payload.id,
        payload.event.order_number()
    );

    let ack = state.ingestor.submit(payload)?;
    Ok((StatusCode::ACCEPTED, Json(ack)))
}
