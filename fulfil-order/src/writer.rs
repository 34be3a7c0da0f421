use chrono::Utc;
use fulfil_core::{Actor, StatusPublisher};
use fulfil_shared::StatusChangedEvent;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{OrderError, OrderResult};
use crate::models::Order;
use crate::repository::{OrderRepository, StoreError};

/// Loads orders and commits transitions through the conditional update,
/// then notifies observers.
#[derive(Clone)]
pub struct OrderWriter {
    orders: Arc<dyn OrderRepository>,
    publisher: Arc<dyn StatusPublisher>,
}

impl OrderWriter {
    pub fn new(orders: Arc<dyn OrderRepository>, publisher: Arc<dyn StatusPublisher>) -> Self {
        Self { orders, publisher }
    }

    pub async fn load(&self, order_id: Uuid) -> OrderResult<Order> {
        self.orders
            .get(order_id)
            .await?
            .ok_or_else(|| OrderError::not_found("order", order_id))
    }

    /// Persist `after` only if the stored row still matches `before`.
    ///
    /// A lost race surfaces as `IllegalTransition` carrying the status the
    /// winner left behind.
    pub async fn commit(
        &self,
        before: &Order,
        mut after: Order,
        transition: &'static str,
        actor: &Actor,
    ) -> OrderResult<Order> {
        after.version = before.version + 1;
        after.updated_at = Utc::now();

        if let Err(msg) = after.check_invariants() {
            return Err(OrderError::Validation(msg));
        }

        match self.orders.update(&after, before.precondition()).await {
            Ok(()) => {}
            Err(StoreError::PreconditionFailed { order_id, current }) => {
                tracing::warn!(
                    "Lost race on order {}: {} expected {} but found {}",
                    order_id,
                    transition,
                    before.status,
                    current
                );
                return Err(OrderError::IllegalTransition {
                    order_id,
                    current,
                    attempted: transition,
                });
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            order_id = %after.id,
            from = %before.status,
            to = %after.status,
            "Order {} {}",
            after.order_number,
            transition
        );

        let event = StatusChangedEvent {
            order_id: after.id,
            order_number: after.order_number.clone(),
            from_status: before.status.to_string(),
            to_status: after.status.to_string(),
            transition: transition.to_string(),
            actor_id: Some(actor.id),
            timestamp: after.updated_at.timestamp(),
        };
        self.notify(&event).await;

        Ok(after)
    }

    /// Best-effort: a failed publish is logged, never returned.
    pub async fn notify(&self, event: &StatusChangedEvent) {
        if let Err(e) = self.publisher.publish(event).await {
            tracing::error!(
                "Failed to publish {} for order {}: {}",
                event.transition,
                event.order_number,
                e
            );
        }
    }
}
