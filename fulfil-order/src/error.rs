use fulfil_core::CoreError;
use uuid::Uuid;

use crate::models::OrderStatus;
use crate::repository::StoreError;
use crate::validation::PaymentRejection;

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Cannot {attempted} order {order_id} in status {current}")]
    IllegalTransition {
        order_id: Uuid,
        current: OrderStatus,
        attempted: &'static str,
    },

    #[error("Payment not validated for order {order_id}: {reason}")]
    PaymentNotValidated { order_id: Uuid, reason: String },

    #[error("Order {order_id} is held by messenger {messenger_id} ({state}); reassignment blocked")]
    ReassignmentBlocked {
        order_id: Uuid,
        messenger_id: Uuid,
        state: &'static str,
    },

    #[error("Cannot {attempted} order {order_id}: messenger status is {state}")]
    MessengerState {
        order_id: Uuid,
        state: &'static str,
        attempted: &'static str,
    },

    #[error(transparent)]
    Payment(#[from] PaymentRejection),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Actor {actor_id} is not allowed to {action}")]
    Forbidden { actor_id: Uuid, action: String },

    #[error("Cash entry {entry_id} for order {order_id} is already pending collection")]
    CashEntryPending { order_id: Uuid, entry_id: Uuid },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Store(StoreError),

    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CoreError),
}

impl OrderError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        OrderError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable code for callers.
    pub fn code(&self) -> &'static str {
        match self {
            OrderError::Validation(_) => "validation_error",
            OrderError::IllegalTransition { .. } => "illegal_transition",
            OrderError::PaymentNotValidated { .. } => "payment_not_validated",
            OrderError::ReassignmentBlocked { .. } => "reassignment_blocked",
            OrderError::MessengerState { .. } => "messenger_state",
            OrderError::Payment(rejection) => rejection.code(),
            OrderError::NotFound { .. } => "not_found",
            OrderError::Forbidden { .. } => "forbidden",
            OrderError::CashEntryPending { .. } => "cash_entry_pending",
            OrderError::Conflict(_) => "conflict",
            OrderError::Store(_) => "store_error",
            OrderError::Collaborator(_) => "collaborator_error",
        }
    }
}

impl From<StoreError> for OrderError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate { entity, key } => {
                OrderError::Conflict(format!("{} already exists: {}", entity, key))
            }
            StoreError::Missing { entity, id } => OrderError::NotFound { entity, id },
            StoreError::PreconditionFailed { order_id, current } => OrderError::Conflict(format!(
                "order {} was modified concurrently (now {})",
                order_id, current
            )),
            other => OrderError::Store(other),
        }
    }
}

pub type OrderResult<T> = Result<T, OrderError>;
