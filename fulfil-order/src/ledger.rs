use chrono::Utc;
use fulfil_core::{Actor, Capability};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{OrderError, OrderResult};
use crate::guards::{require, require_non_terminal};
use crate::methods::{DeliveryMethod, PaymentMethod};
use crate::models::{Money, Order, OrderStatus};
use crate::records::{present_evidence, CashEntryStatus, CashLedgerEntry, EvidenceRef};
use crate::repository::{LedgerInsert, Stores};
use crate::validation::{PaymentLeg, PaymentRejection};
use crate::writer::OrderWriter;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterCash {
    pub amount: Money,
    /// Defaults to the order's classified method
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub delivery_method: Option<DeliveryMethod>,
    #[serde(default)]
    pub evidence: Vec<EvidenceRef>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RegisterOutcome {
    pub entry: CashLedgerEntry,
    /// False when an already-collected entry was returned
    pub created: bool,
    pub order_advanced: bool,
}

/// Money physically received for an order, one entry per order.
pub struct CashLedger {
    stores: Stores,
    writer: OrderWriter,
}

impl CashLedger {
    pub fn new(stores: Stores, writer: OrderWriter) -> Self {
        Self { stores, writer }
    }

    /// Record money received for an order.
    ///
    /// A second submission never creates a second row: a collected entry is
    /// returned as-is, a pending one is reported as `CashEntryPending` unless
    /// the call still had an order advance to finish.
    pub async fn register(
        &self,
        order_id: Uuid,
        input: RegisterCash,
        actor: &Actor,
    ) -> OrderResult<RegisterOutcome> {
        require(actor, &[Capability::RegisterCash], "register cash")?;

        let order = self.writer.load(order_id).await?;

        // 1. Idempotency guard on the existing row, ahead of input checks
        if let Some(existing) = self.stores.ledger.find_by_order(order_id).await? {
            return self.existing_outcome(&order, existing, actor).await;
        }

        require_non_terminal(&order, "register_cash")?;

        if input.amount <= 0 {
            return Err(OrderError::Validation(format!(
                "amount must be positive, got {}",
                input.amount
            )));
        }

        let method = input
            .payment_method
            .or_else(|| order.payment_method.clone())
            .ok_or_else(|| OrderError::Validation("payment_method is required".to_string()))?;

        if !method.is_cash_like() && present_evidence(&input.evidence) == 0 {
            return Err(PaymentRejection::MissingEvidence {
                leg: PaymentLeg::Transfer,
            }
            .into());
        }

        // 2. Insert under the one-entry-per-order constraint
        let now = Utc::now();
        let entry = CashLedgerEntry {
            id: Uuid::new_v4(),
            order_id,
            amount: input.amount,
            payment_method: method,
            delivery_method: input.delivery_method.or_else(|| order.delivery_method.clone()),
            registered_by: actor.id,
            evidence: input.evidence,
            status: CashEntryStatus::Pending,
            accepted_by: None,
            accepted_at: None,
            created_at: now,
            updated_at: now,
        };

        let entry = match self.stores.ledger.insert_if_absent(&entry).await? {
            LedgerInsert::Inserted(entry) => entry,
            LedgerInsert::Existing(existing) => {
                tracing::info!("Concurrent cash registration for order {}; keeping first", order_id);
                return self.existing_outcome(&order, existing, actor).await;
            }
        };

        tracing::info!(
            "Registered cash entry {} for order {}: {} via {}",
            entry.id,
            order.order_number,
            entry.amount,
            entry.payment_method
        );

        // 3. Money received unblocks logistics. The entry is already stored,
        // so a failed advance is reported, not raised; a repeat call retries it.
        let order_advanced = self.advance_to_logistics(&order, actor).await;

        Ok(RegisterOutcome {
            entry,
            created: true,
            order_advanced,
        })
    }

    /// A repeat registration still finishes an advance a previous call left
    /// undone; otherwise a pending entry is a conflict.
    async fn existing_outcome(
        &self,
        order: &Order,
        existing: CashLedgerEntry,
        actor: &Actor,
    ) -> OrderResult<RegisterOutcome> {
        let order_advanced = self.advance_to_logistics(order, actor).await;

        if existing.is_collected() || order_advanced {
            Ok(RegisterOutcome {
                entry: existing,
                created: false,
                order_advanced,
            })
        } else {
            Err(OrderError::CashEntryPending {
                order_id: existing.order_id,
                entry_id: existing.id,
            })
        }
    }

    /// revision_cartera -> en_logistica. Returns whether this call moved the order.
    async fn advance_to_logistics(&self, order: &Order, actor: &Actor) -> bool {
        if order.status != OrderStatus::RevisionCartera {
            return false;
        }

        let mut after = order.clone();
        after.status = OrderStatus::EnLogistica;
        after.wallet_rejection_reason = None;
        match self.writer.commit(order, after, "register_cash", actor).await {
            Ok(_) => true,
            Err(OrderError::IllegalTransition { current, .. }) => {
                tracing::warn!(
                    "Order {} moved to {} before cash registration could advance it",
                    order.order_number,
                    current
                );
                false
            }
            Err(e) => {
                tracing::warn!(
                    "Cash for order {} is registered but the order did not advance: {}",
                    order.order_number,
                    e
                );
                false
            }
        }
    }

    /// pending -> collected. Accepting a collected entry returns it unchanged.
    pub async fn accept(&self, entry_id: Uuid, actor: &Actor) -> OrderResult<CashLedgerEntry> {
        require(actor, &[Capability::CollectCash], "accept cash entry")?;

        let entry = self
            .stores
            .ledger
            .get(entry_id)
            .await?
            .ok_or_else(|| OrderError::not_found("cash ledger entry", entry_id))?;

        if entry.is_collected() {
            return Ok(entry);
        }

        let collected = self
            .stores
            .ledger
            .mark_collected(entry_id, actor.id, Utc::now())
            .await?;
        tracing::info!(
            "Cash entry {} for order {} collected by {}",
            entry_id,
            collected.order_id,
            actor.id
        );
        Ok(collected)
    }

    pub async fn entry_for(&self, order_id: Uuid) -> OrderResult<Option<CashLedgerEntry>> {
        Ok(self.stores.ledger.find_by_order(order_id).await?)
    }
}
