use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fulfil_order::{IngestError, OrderError, PaymentRejection, StoreError};
use serde_json::{json, Value};

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    Order(OrderError),
    Ingest(IngestError),
    Anyhow(anyhow::Error),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            AppError::Ingest(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Order(err) => match err {
                OrderError::Validation(_) => StatusCode::BAD_REQUEST,
                OrderError::Forbidden { .. } => StatusCode::FORBIDDEN,
                OrderError::NotFound { .. } => StatusCode::NOT_FOUND,
                OrderError::IllegalTransition { .. }
                | OrderError::ReassignmentBlocked { .. }
                | OrderError::MessengerState { .. }
                | OrderError::CashEntryPending { .. }
                | OrderError::Conflict(_) => StatusCode::CONFLICT,
                OrderError::PaymentNotValidated { .. } => StatusCode::PAYMENT_REQUIRED,
                OrderError::Payment(rejection) => match rejection {
                    PaymentRejection::InsufficientPayment { .. } | PaymentRejection::ExcessPayment { .. } => {
                        StatusCode::UNPROCESSABLE_ENTITY
                    }
                    _ => StatusCode::BAD_REQUEST,
                },
                OrderError::Collaborator(_) => StatusCode::BAD_GATEWAY,
                OrderError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
                OrderError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::AuthenticationError(_) => "unauthenticated",
            AppError::Ingest(IngestError::QueueFull) => "queue_full",
            AppError::Ingest(IngestError::Closed) => "ingestion_stopped",
            AppError::Anyhow(_) => "internal_error",
            AppError::Order(err) => err.code(),
        }
    }

    /// Structured fields a client can render without parsing the message.
    fn detail(&self) -> Value {
        let AppError::Order(err) = self else {
            return json!({});
        };
        match err {
            OrderError::IllegalTransition {
                order_id,
                current,
                attempted,
            } => json!({ "order_id": order_id, "current_status": current, "attempted": attempted }),
            OrderError::PaymentNotValidated { order_id, reason } => {
                json!({ "order_id": order_id, "reason": reason })
            }
            OrderError::ReassignmentBlocked {
                order_id,
                messenger_id,
                state,
            } => json!({ "order_id": order_id, "messenger_id": messenger_id, "messenger_status": state }),
            OrderError::MessengerState {
                order_id,
                state,
                attempted,
            } => json!({ "order_id": order_id, "messenger_status": state, "attempted": attempted }),
            OrderError::Payment(PaymentRejection::InsufficientPayment {
                expected,
                received,
                delta,
                tolerance,
            })
            | OrderError::Payment(PaymentRejection::ExcessPayment {
                expected,
                received,
                delta,
                tolerance,
            }) => json!({ "expected": expected, "received": received, "delta": delta, "tolerance": tolerance }),
            OrderError::Payment(PaymentRejection::MissingEvidence { leg }) => json!({ "leg": leg.to_string() }),
            OrderError::Payment(PaymentRejection::MissingField { field }) => json!({ "field": field }),
            OrderError::Payment(PaymentRejection::NonPositiveAmount { field, amount }) => {
                json!({ "field": field, "amount": amount })
            }
            OrderError::NotFound { entity, id } => json!({ "entity": entity, "id": id }),
            OrderError::CashEntryPending { order_id, entry_id } => {
                json!({ "order_id": order_id, "entry_id": entry_id })
            }
            _ => json!({}),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                "Internal Server Error".to_string()
            }
            AppError::Order(err @ (OrderError::Store(_) | OrderError::Collaborator(_))) => {
                tracing::error!("Request failed: {}", err);
                "Internal Server Error".to_string()
            }
            AppError::AuthenticationError(msg) => msg.clone(),
            AppError::Order(err) => err.to_string(),
            AppError::Ingest(err) => err.to_string(),
        };

        let body = Json(json!({
            "error": self.code(),
            "message": message,
            "detail": self.detail(),
        }));

        (status, body).into_response()
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        Self::Order(err)
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        Self::Ingest(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}
