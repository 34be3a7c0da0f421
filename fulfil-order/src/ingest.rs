//! Invoicing webhook ingestion.
//!
//! The HTTP layer hands events to [`WebhookIngestor::submit`], which only
//! enqueues and acknowledges. A worker task applies them afterwards through
//! the regular engine operations; anything that no longer fits the order's
//! state is logged and dropped.

use fulfil_core::Actor;
use fulfil_shared::{InvoiceEvent, InvoiceWebhook};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::OrderError;
use crate::lifecycle::OrderLifecycle;
use crate::models::NewOrder;

const DEFAULT_VOID_REASON: &str = "factura anulada en facturación";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IngestAck {
    pub webhook_id: String,
    pub order_number: String,
    pub accepted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Applied { order_id: Uuid },
    Discarded { reason: String },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IngestError {
    #[error("Ingestion queue is full")]
    QueueFull,
    #[error("Ingestion worker has stopped")]
    Closed,
}

#[derive(Clone)]
pub struct WebhookIngestor {
    tx: mpsc::Sender<InvoiceWebhook>,
}

impl WebhookIngestor {
    /// Start the worker. It runs until every sender is dropped.
    pub fn spawn(engine: Arc<OrderLifecycle>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<InvoiceWebhook>(capacity.max(1));

        let handle = tokio::spawn(async move {
            info!("Webhook ingestion worker started");
            while let Some(webhook) = rx.recv().await {
                match apply(&engine, &webhook).await {
                    IngestOutcome::Applied { order_id } => {
                        info!("Webhook {} applied to order {}", webhook.id, order_id)
                    }
                    IngestOutcome::Discarded { reason } => {
                        warn!("Webhook {} discarded: {}", webhook.id, reason)
                    }
                }
            }
            info!("Webhook ingestion worker stopped");
        });

        (Self { tx }, handle)
    }

    /// Enqueue without waiting for the effect.
    pub fn submit(&self, webhook: InvoiceWebhook) -> Result<IngestAck, IngestError> {
        let ack = IngestAck {
            webhook_id: webhook.id.clone(),
            order_number: webhook.event.order_number().to_string(),
            accepted: true,
        };

        self.tx.try_send(webhook).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => IngestError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => IngestError::Closed,
        })?;
        Ok(ack)
    }
}

/// Apply one event. Never retried: failures become `Discarded`.
pub async fn apply(engine: &OrderLifecycle, webhook: &InvoiceWebhook) -> IngestOutcome {
    let system = Actor::system();

    let result = match &webhook.event {
        InvoiceEvent::Issued {
            order_number,
            customer_id,
            total_amount,
            is_service,
            notes,
        } => {
            let mut new_order = NewOrder::new(order_number.clone(), *total_amount);
            new_order.customer_id = customer_id.clone();
            new_order.is_service = *is_service;
            new_order.notes = notes.clone();
            engine.create_order(new_order, &system).await.map(|summary| summary.id)
        }
        InvoiceEvent::Voided { order_number, reason } => {
            let reason = reason
                .as_deref()
                .filter(|r| r.trim().chars().count() >= engine.rules().min_reason_len)
                .unwrap_or(DEFAULT_VOID_REASON);
            match engine.get_order_by_number(order_number).await {
                Ok(order) => engine.cancel(order.id, reason, &system).await.map(|summary| summary.id),
                Err(e) => Err(e),
            }
        }
    };

    match result {
        Ok(order_id) => IngestOutcome::Applied { order_id },
        Err(e @ (OrderError::IllegalTransition { .. } | OrderError::Conflict(_) | OrderError::NotFound { .. })) => {
            IngestOutcome::Discarded {
                reason: format!("stale update: {}", e),
            }
        }
        Err(e) => {
            error!("Webhook {} failed: {}", webhook.id, e);
            IngestOutcome::Discarded { reason: e.to_string() }
        }
    }
}
