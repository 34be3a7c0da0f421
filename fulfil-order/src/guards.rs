use fulfil_core::{Actor, Capability};
use std::sync::Arc;

use crate::error::{OrderError, OrderResult};
use crate::models::{Order, OrderStatus};
use crate::repository::{CashLedgerRepository, WalletValidationRepository};

/// Fail with `Forbidden` unless the actor holds one of `any_of`.
pub fn require(actor: &Actor, any_of: &[Capability], action: &str) -> OrderResult<()> {
    if actor.can_any(any_of) {
        Ok(())
    } else {
        tracing::warn!("Actor {} denied: {}", actor.id, action);
        Err(OrderError::Forbidden {
            actor_id: actor.id,
            action: action.to_string(),
        })
    }
}

/// Only the messenger currently holding the order.
pub fn require_assigned_messenger(actor: &Actor, order: &Order, action: &str) -> OrderResult<()> {
    if order.messenger.is_held_by(actor.id) {
        Ok(())
    } else {
        Err(OrderError::Forbidden {
            actor_id: actor.id,
            action: format!("{} (not the assigned messenger)", action),
        })
    }
}

pub fn require_status(order: &Order, allowed: &[OrderStatus], attempted: &'static str) -> OrderResult<()> {
    if allowed.contains(&order.status) {
        Ok(())
    } else {
        Err(illegal(order, attempted))
    }
}

pub fn require_non_terminal(order: &Order, attempted: &'static str) -> OrderResult<()> {
    if order.status.is_terminal() {
        Err(illegal(order, attempted))
    } else {
        Ok(())
    }
}

pub fn illegal(order: &Order, attempted: &'static str) -> OrderError {
    OrderError::IllegalTransition {
        order_id: order.id,
        current: order.status,
        attempted,
    }
}

/// Payment checks consulted before goods leave the building.
#[derive(Clone)]
pub struct PaymentGuards {
    ledger: Arc<dyn CashLedgerRepository>,
    validations: Arc<dyn WalletValidationRepository>,
}

impl PaymentGuards {
    pub fn new(
        ledger: Arc<dyn CashLedgerRepository>,
        validations: Arc<dyn WalletValidationRepository>,
    ) -> Self {
        Self { ledger, validations }
    }

    /// Why a pickup order may not be handed over yet; `None` once settled.
    ///
    /// Credit and no-charge orders bypass both checks. Cash-like orders need
    /// a collected ledger entry, everything else an approved wallet review.
    pub async fn settlement_gap(&self, order: &Order) -> OrderResult<Option<String>> {
        if order.is_credit() || order.is_no_charge() {
            return Ok(None);
        }

        if order.is_cash_like() {
            return Ok(match self.ledger.find_by_order(order.id).await? {
                Some(entry) if entry.is_collected() => None,
                Some(entry) => Some(format!("cash entry {} is still pending collection", entry.id)),
                None => Some("no cash received has been registered".to_string()),
            });
        }

        Ok(match self.validations.approved_for(order.id).await? {
            Some(_) => None,
            None => Some("payment has not been approved by wallet".to_string()),
        })
    }

    pub async fn ensure_settled_for_pickup(&self, order: &Order) -> OrderResult<()> {
        match self.settlement_gap(order).await? {
            None => Ok(()),
            Some(reason) => Err(OrderError::PaymentNotValidated {
                order_id: order.id,
                reason,
            }),
        }
    }

    /// Start-delivery gate: credit, no-charge, cash collected at the door, or
    /// an approved wallet review.
    pub async fn ensure_can_dispatch(&self, order: &Order) -> OrderResult<()> {
        if order.is_credit() || order.is_no_charge() || order.is_cash_like() {
            return Ok(());
        }

        if self.validations.approved_for(order.id).await?.is_some() {
            return Ok(());
        }

        Err(OrderError::PaymentNotValidated {
            order_id: order.id,
            reason: "payment has not been approved by wallet".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::methods::{DeliveryMethod, PaymentMethod};
    use crate::models::NewOrder;
    use crate::records::{CashEntryStatus, CashLedgerEntry};
    use chrono::Utc;
    use fulfil_core::CapabilitySet;
    use uuid::Uuid;

    fn guards(store: &Arc<InMemoryStore>) -> PaymentGuards {
        PaymentGuards::new(store.clone(), store.clone())
    }

    fn pickup(method: PaymentMethod) -> Order {
        let mut order = Order::new(NewOrder::new("FV-30", 40_000));
        order.payment_method = Some(method);
        order.delivery_method = Some(DeliveryMethod::Pickup);
        order
    }

    #[test]
    fn test_require_any_capability() {
        let actor = Actor::new(
            Uuid::new_v4(),
            "empaque",
            CapabilitySet::empty().with(Capability::ManagePackaging),
        );
        assert!(require(&actor, &[Capability::ManagePackaging, Capability::ManageLogistics], "mark ready").is_ok());
        assert!(matches!(
            require(&actor, &[Capability::ReviewPayments], "approve payment"),
            Err(OrderError::Forbidden { .. })
        ));
    }

    #[tokio::test]
    async fn test_cash_pickup_needs_collected_entry() {
        let store = Arc::new(InMemoryStore::new());
        let order = pickup(PaymentMethod::Efectivo);

        let gap = guards(&store).settlement_gap(&order).await.unwrap();
        assert!(gap.is_some());

        let now = Utc::now();
        let entry = CashLedgerEntry {
            id: Uuid::new_v4(),
            order_id: order.id,
            amount: 40_000,
            payment_method: PaymentMethod::Efectivo,
            delivery_method: Some(DeliveryMethod::Pickup),
            registered_by: Uuid::new_v4(),
            evidence: vec![],
            status: CashEntryStatus::Pending,
            accepted_by: None,
            accepted_at: None,
            created_at: now,
            updated_at: now,
        };
        store.insert_if_absent(&entry).await.unwrap();
        assert!(guards(&store).ensure_settled_for_pickup(&order).await.is_err());

        store.mark_collected(entry.id, Uuid::new_v4(), now).await.unwrap();
        assert!(guards(&store).ensure_settled_for_pickup(&order).await.is_ok());
    }

    #[tokio::test]
    async fn test_credit_and_no_charge_bypass() {
        let store = Arc::new(InMemoryStore::new());
        for method in [PaymentMethod::Credito, PaymentMethod::Publicidad, PaymentMethod::Reposicion] {
            let order = pickup(method);
            assert!(guards(&store).ensure_settled_for_pickup(&order).await.is_ok());
            assert!(guards(&store).ensure_can_dispatch(&order).await.is_ok());
        }
    }

    #[tokio::test]
    async fn test_transfer_dispatch_needs_approval() {
        let store = Arc::new(InMemoryStore::new());
        let order = pickup(PaymentMethod::Transferencia);
        let err = guards(&store).ensure_can_dispatch(&order).await.unwrap_err();
        assert_eq!(err.code(), "payment_not_validated");
    }
}
