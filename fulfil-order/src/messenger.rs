//! Messenger sub-state machine: assigned -> accepted -> in_delivery ->
//! delivered | failed.

use chrono::Utc;
use fulfil_core::{Actor, Capability};
use uuid::Uuid;

use crate::error::{OrderError, OrderResult};
use crate::guards::{illegal, require, require_assigned_messenger, require_non_terminal, require_status, PaymentGuards};
use crate::models::{MessengerState, Order, OrderStatus, OrderSummary};
use crate::records::{DeliveryTracking, TrackingEvent};
use crate::repository::Stores;
use crate::rules::EngineRules;
use crate::writer::OrderWriter;

pub struct MessengerAssignment {
    stores: Stores,
    writer: OrderWriter,
    guards: PaymentGuards,
    rules: EngineRules,
}

impl MessengerAssignment {
    pub fn new(stores: Stores, writer: OrderWriter, guards: PaymentGuards, rules: EngineRules) -> Self {
        Self {
            stores,
            writer,
            guards,
            rules,
        }
    }

    /// Assign (or reassign) a messenger.
    ///
    /// Blocked once the current messenger has accepted; re-assigning the same
    /// messenger while only assigned is a no-op.
    pub async fn assign(&self, order_id: Uuid, messenger_id: Uuid, actor: &Actor) -> OrderResult<OrderSummary> {
        require(actor, &[Capability::ManageLogistics], "assign messenger")?;

        let order = self.writer.load(order_id).await?;

        if order.messenger.blocks_reassignment() {
            return Err(OrderError::ReassignmentBlocked {
                order_id,
                messenger_id: order.messenger.messenger_id().unwrap_or_default(),
                state: order.messenger.status_str().unwrap_or("unassigned"),
            });
        }
        require_non_terminal(&order, "assign_messenger")?;

        if order.is_pickup() {
            return Err(OrderError::Validation(
                "pickup orders are not dispatched by messenger".to_string(),
            ));
        }

        if order.messenger == (MessengerState::Assigned { messenger_id }) {
            tracing::debug!("Messenger {} already assigned to order {}", messenger_id, order.order_number);
            return Ok(OrderSummary::from(&order));
        }

        let mut after = order.clone();
        after.messenger = MessengerState::Assigned { messenger_id };
        let after = self.writer.commit(&order, after, "assign_messenger", actor).await?;

        if let Err(e) = self
            .stores
            .tracking
            .upsert_assigned(&DeliveryTracking::assigned(order_id, messenger_id))
            .await
        {
            tracing::warn!("Delivery tracking not recorded for order {}: {}", order.order_number, e);
        }

        Ok(OrderSummary::from(&after))
    }

    /// The assigned messenger takes the order. Pre-ready orders become ready.
    pub async fn accept(&self, order_id: Uuid, actor: &Actor) -> OrderResult<OrderSummary> {
        let order = self.writer.load(order_id).await?;
        require_non_terminal(&order, "accept_delivery")?;
        require_assigned_messenger(actor, &order, "accept delivery")?;
        let messenger_id = Self::expect_state(&order, "accept_delivery", |s| {
            matches!(s, MessengerState::Assigned { .. })
        })?;

        let mut after = order.clone();
        after.messenger = MessengerState::Accepted { messenger_id };
        if matches!(order.status, OrderStatus::EnLogistica | OrderStatus::EnEmpaque) {
            after.status = OrderStatus::ListoParaEntrega;
        }

        let after = self.writer.commit(&order, after, "accept_delivery", actor).await?;
        self.track(&after, TrackingEvent::Accepted).await;
        Ok(OrderSummary::from(&after))
    }

    /// The assigned messenger declines; the order becomes unassigned.
    pub async fn reject(&self, order_id: Uuid, actor: &Actor) -> OrderResult<OrderSummary> {
        let order = self.writer.load(order_id).await?;
        require_non_terminal(&order, "reject_delivery")?;
        require_assigned_messenger(actor, &order, "reject delivery")?;
        Self::expect_state(&order, "reject_delivery", |s| matches!(s, MessengerState::Assigned { .. }))?;

        let mut after = order.clone();
        after.messenger = MessengerState::Unassigned;

        let after = self.writer.commit(&order, after, "reject_delivery", actor).await?;
        if let Err(e) = self.stores.tracking.clear(order_id).await {
            tracing::warn!("Delivery tracking not cleared for order {}: {}", order.order_number, e);
        }
        Ok(OrderSummary::from(&after))
    }

    /// Goods leave with the messenger (or with logistics directly when no
    /// messenger is involved).
    pub async fn start(&self, order_id: Uuid, actor: &Actor) -> OrderResult<OrderSummary> {
        let order = self.writer.load(order_id).await?;

        if !order.messenger.is_held_by(actor.id) {
            require(actor, &[Capability::ManageLogistics], "start delivery")?;
        }
        require_status(
            &order,
            &[OrderStatus::EnEmpaque, OrderStatus::ListoParaEntrega],
            "start_delivery",
        )?;
        if order.is_pickup() {
            return Err(OrderError::Validation(
                "pickup orders are handed over at the warehouse".to_string(),
            ));
        }

        let messenger = match order.messenger {
            MessengerState::Unassigned => MessengerState::Unassigned,
            MessengerState::Assigned { messenger_id } | MessengerState::Accepted { messenger_id } => {
                MessengerState::InDelivery { messenger_id }
            }
            other => {
                return Err(OrderError::MessengerState {
                    order_id,
                    state: other.status_str().unwrap_or("unassigned"),
                    attempted: "start_delivery",
                })
            }
        };

        self.guards.ensure_can_dispatch(&order).await?;

        let mut after = order.clone();
        after.status = OrderStatus::EnReparto;
        after.messenger = messenger;

        let after = self.writer.commit(&order, after, "start_delivery", actor).await?;
        if after.messenger != MessengerState::Unassigned {
            self.track(&after, TrackingEvent::Started).await;
        }
        Ok(OrderSummary::from(&after))
    }

    /// Delivered to the customer by the messenger.
    pub async fn complete(&self, order_id: Uuid, actor: &Actor) -> OrderResult<OrderSummary> {
        let order = self.writer.load(order_id).await?;
        require_status(&order, &[OrderStatus::EnReparto], "complete_delivery")?;
        require_assigned_messenger(actor, &order, "complete delivery")?;
        let messenger_id = Self::expect_state(&order, "complete_delivery", |s| {
            matches!(s, MessengerState::InDelivery { .. })
        })?;

        let mut after = order.clone();
        after.status = OrderStatus::EntregadoCliente;
        after.messenger = MessengerState::Delivered { messenger_id };
        after.delivered_at = Some(Utc::now());

        let after = self.writer.commit(&order, after, "complete_delivery", actor).await?;
        self.track(&after, TrackingEvent::Completed).await;
        Ok(OrderSummary::from(&after))
    }

    /// Delivery attempt failed; the order goes back to ready for a new
    /// attempt, possibly with another messenger.
    pub async fn mark_failed(&self, order_id: Uuid, reason: &str, actor: &Actor) -> OrderResult<OrderSummary> {
        let reason = self.rules.reason("reason", reason).map_err(OrderError::Validation)?;

        let order = self.writer.load(order_id).await?;
        require_status(&order, &[OrderStatus::EnReparto], "fail_delivery")?;
        require_assigned_messenger(actor, &order, "mark delivery failed")?;
        let messenger_id = Self::expect_state(&order, "fail_delivery", |s| {
            matches!(s, MessengerState::InDelivery { .. })
        })?;

        let mut after = order.clone();
        after.status = OrderStatus::ListoParaEntrega;
        after.messenger = MessengerState::Failed { messenger_id };

        let after = self.writer.commit(&order, after, "fail_delivery", actor).await?;
        tracing::warn!("Delivery of order {} failed: {}", after.order_number, reason);
        self.track(
            &after,
            TrackingEvent::Failed {
                reason: reason.to_string(),
            },
        )
        .await;
        Ok(OrderSummary::from(&after))
    }

    fn expect_state(
        order: &Order,
        attempted: &'static str,
        allowed: impl Fn(&MessengerState) -> bool,
    ) -> OrderResult<Uuid> {
        match order.messenger.messenger_id() {
            Some(id) if allowed(&order.messenger) => Ok(id),
            Some(_) => Err(OrderError::MessengerState {
                order_id: order.id,
                state: order.messenger.status_str().unwrap_or("unassigned"),
                attempted,
            }),
            None => Err(illegal(order, attempted)),
        }
    }

    async fn track(&self, order: &Order, event: TrackingEvent) {
        if let Err(e) = self.stores.tracking.record(order.id, &event, Utc::now()).await {
            tracing::warn!("Delivery tracking {:?} not recorded for order {}: {}", event, order.order_number, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::methods::{DeliveryMethod, PaymentMethod};
    use crate::models::NewOrder;
    use crate::repository::DeliveryTrackingRepository;
    use fulfil_core::notify::NoopPublisher;
    use fulfil_core::CapabilitySet;
    use std::sync::Arc;

    struct Fixture {
        store: Arc<InMemoryStore>,
        messengers: MessengerAssignment,
        dispatcher: Actor,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let stores = store.stores();
        let writer = OrderWriter::new(stores.orders.clone(), Arc::new(NoopPublisher));
        let guards = PaymentGuards::new(stores.ledger.clone(), stores.validations.clone());
        Fixture {
            messengers: MessengerAssignment::new(stores, writer, guards, EngineRules::default()),
            store,
            dispatcher: Actor::new(
                Uuid::new_v4(),
                "logistica",
                CapabilitySet::empty().with(Capability::ManageLogistics),
            ),
        }
    }

    fn messenger() -> Actor {
        Actor::new(Uuid::new_v4(), "mensajero", CapabilitySet::empty().with(Capability::DeliverOrders))
    }

    fn local_order(store: &InMemoryStore, status: OrderStatus) -> Order {
        let mut order = Order::new(NewOrder::new(format!("FV-{}", Uuid::new_v4().simple()), 30_000));
        order.payment_method = Some(PaymentMethod::Contraentrega);
        order.delivery_method = Some(DeliveryMethod::LocalMessenger);
        order.status = status;
        store.put_order(order.clone());
        order
    }

    #[tokio::test]
    async fn test_same_messenger_reassignment_is_noop() {
        let f = fixture();
        let order = local_order(&f.store, OrderStatus::EnEmpaque);
        let m = messenger();

        let first = f.messengers.assign(order.id, m.id, &f.dispatcher).await.unwrap();
        let second = f.messengers.assign(order.id, m.id, &f.dispatcher).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(second.messenger_status.as_deref(), Some("assigned"));
    }

    #[tokio::test]
    async fn test_accept_advances_pre_ready_order() {
        let f = fixture();
        let order = local_order(&f.store, OrderStatus::EnEmpaque);
        let m = messenger();
        f.messengers.assign(order.id, m.id, &f.dispatcher).await.unwrap();

        let summary = f.messengers.accept(order.id, &m).await.unwrap();
        assert_eq!(summary.status, OrderStatus::ListoParaEntrega);
        assert_eq!(summary.messenger_status.as_deref(), Some("accepted"));

        let tracking = f.store.get(order.id).await.unwrap().unwrap();
        assert!(tracking.accepted_at.is_some());
    }

    #[tokio::test]
    async fn test_only_assigned_messenger_may_accept() {
        let f = fixture();
        let order = local_order(&f.store, OrderStatus::EnEmpaque);
        f.messengers.assign(order.id, messenger().id, &f.dispatcher).await.unwrap();

        let err = f.messengers.accept(order.id, &messenger()).await.unwrap_err();
        assert!(matches!(err, OrderError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn test_reject_returns_to_unassigned() {
        let f = fixture();
        let order = local_order(&f.store, OrderStatus::EnEmpaque);
        let m = messenger();
        f.messengers.assign(order.id, m.id, &f.dispatcher).await.unwrap();

        let summary = f.messengers.reject(order.id, &m).await.unwrap();
        assert_eq!(summary.assigned_messenger_id, None);
        assert_eq!(summary.messenger_status, None);
    }

    #[tokio::test]
    async fn test_failed_delivery_allows_reassignment() {
        let f = fixture();
        let order = local_order(&f.store, OrderStatus::ListoParaEntrega);
        let m = messenger();
        f.messengers.assign(order.id, m.id, &f.dispatcher).await.unwrap();
        f.messengers.accept(order.id, &m).await.unwrap();
        f.messengers.start(order.id, &m).await.unwrap();

        assert!(f.messengers.mark_failed(order.id, "no", &m).await.is_err());
        let failed = f.messengers.mark_failed(order.id, "cliente ausente", &m).await.unwrap();
        assert_eq!(failed.status, OrderStatus::ListoParaEntrega);
        assert_eq!(failed.messenger_status.as_deref(), Some("failed"));

        let other = messenger();
        let reassigned = f.messengers.assign(order.id, other.id, &f.dispatcher).await.unwrap();
        assert_eq!(reassigned.assigned_messenger_id, Some(other.id));
    }

    #[tokio::test]
    async fn test_complete_delivers_to_customer() {
        let f = fixture();
        let order = local_order(&f.store, OrderStatus::ListoParaEntrega);
        let m = messenger();
        f.messengers.assign(order.id, m.id, &f.dispatcher).await.unwrap();
        f.messengers.start(order.id, &m).await.unwrap();

        let done = f.messengers.complete(order.id, &m).await.unwrap();
        assert_eq!(done.status, OrderStatus::EntregadoCliente);
        assert!(done.delivered_at.is_some());
        assert_eq!(done.messenger_status.as_deref(), Some("delivered"));
    }

    #[tokio::test]
    async fn test_start_without_messenger_requires_logistics() {
        let f = fixture();
        let order = local_order(&f.store, OrderStatus::ListoParaEntrega);

        assert!(f.messengers.start(order.id, &messenger()).await.is_err());
        let started = f.messengers.start(order.id, &f.dispatcher).await.unwrap();
        assert_eq!(started.status, OrderStatus::EnReparto);
        assert_eq!(started.messenger_status, None);
    }

    #[tokio::test]
    async fn test_start_transfer_order_needs_wallet_approval() {
        let f = fixture();
        let mut order = local_order(&f.store, OrderStatus::ListoParaEntrega);
        order.payment_method = Some(PaymentMethod::Transferencia);
        f.store.put_order(order.clone());

        let err = f.messengers.start(order.id, &f.dispatcher).await.unwrap_err();
        assert!(matches!(err, OrderError::PaymentNotValidated { .. }));
    }
}
