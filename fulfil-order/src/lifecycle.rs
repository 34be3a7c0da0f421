//! Top-level order state machine.
//!
//! `pendiente_facturacion -> revision_cartera -> en_logistica -> en_empaque ->
//! listo_para_entrega -> en_reparto -> entregado_*`, with `cancelado` reachable
//! from any non-terminal status. Each operation loads the order, checks the
//! actor and the current status, then commits through [`OrderWriter`] which
//! only writes if nobody else moved the order in between.

use chrono::Utc;
use fulfil_core::credit::StaticCreditLookup;
use fulfil_core::documents::MockDocumentRenderer;
use fulfil_core::notify::NoopPublisher;
use fulfil_core::{
    Actor, Capability, CreditProfileLookup, DocumentRenderer, RenderedGuide, ShippingGuidePayload, StatusPublisher,
};
use fulfil_shared::StatusChangedEvent;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::carriers::CarrierDirectory;
use crate::error::{OrderError, OrderResult};
use crate::guards::{illegal, require, require_non_terminal, require_status, PaymentGuards};
use crate::ledger::CashLedger;
use crate::messenger::MessengerAssignment;
use crate::methods::{DeliveryMethod, PaymentMethod};
use crate::models::{MessengerState, NewOrder, Order, OrderStatus, OrderSummary};
use crate::records::{CarrierChangeLog, CashLedgerEntry, DeliveryTracking, ValidationStatus, WalletValidation};
use crate::recipient;
use crate::repository::Stores;
use crate::routing::{PaymentRoutingPolicy, RoutingDecision};
use crate::rules::EngineRules;
use crate::validation::{PaymentRejection, PaymentSubmission, PaymentValidationEngine, ValidationReport};
use crate::writer::OrderWriter;

/// Billing's classification of a new order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub delivery_method: Option<DeliveryMethod>,
    #[serde(default)]
    pub carrier_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifyOutcome {
    pub order: OrderSummary,
    pub routing: RoutingDecision,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApprovalOutcome {
    pub order: OrderSummary,
    pub report: Option<ValidationReport>,
}

/// What happened to a pickup order after it was marked ready.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AutoDelivery {
    NotApplicable,
    Delivered,
    AwaitingPayment { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadyOutcome {
    pub order: OrderSummary,
    pub auto_delivery: AutoDelivery,
}

#[derive(Debug, Clone, Serialize)]
pub struct GuideOutcome {
    pub order: OrderSummary,
    pub guide: RenderedGuide,
}

pub struct OrderLifecycle {
    stores: Stores,
    writer: OrderWriter,
    guards: PaymentGuards,
    validator: PaymentValidationEngine,
    renderer: Arc<dyn DocumentRenderer>,
    rules: EngineRules,
    ledger: CashLedger,
    messengers: MessengerAssignment,
    carriers: CarrierDirectory,
}

pub struct LifecycleBuilder {
    stores: Stores,
    publisher: Arc<dyn StatusPublisher>,
    credit: Arc<dyn CreditProfileLookup>,
    renderer: Arc<dyn DocumentRenderer>,
    rules: EngineRules,
}

impl LifecycleBuilder {
    pub fn publisher(mut self, publisher: Arc<dyn StatusPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn credit(mut self, credit: Arc<dyn CreditProfileLookup>) -> Self {
        self.credit = credit;
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn DocumentRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn rules(mut self, rules: EngineRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn build(self) -> OrderLifecycle {
        let stores = self.stores;
        let writer = OrderWriter::new(stores.orders.clone(), self.publisher);
        let guards = PaymentGuards::new(stores.ledger.clone(), stores.validations.clone());

        OrderLifecycle {
            validator: PaymentValidationEngine::new(self.rules.tolerance, self.credit),
            ledger: CashLedger::new(stores.clone(), writer.clone()),
            messengers: MessengerAssignment::new(stores.clone(), writer.clone(), guards.clone(), self.rules),
            carriers: CarrierDirectory::new(stores.clone(), writer.clone(), self.rules),
            renderer: self.renderer,
            rules: self.rules,
            guards,
            writer,
            stores,
        }
    }
}

impl OrderLifecycle {
    pub fn builder(stores: Stores) -> LifecycleBuilder {
        LifecycleBuilder {
            stores,
            publisher: Arc::new(NoopPublisher),
            credit: Arc::new(StaticCreditLookup::new()),
            renderer: Arc::new(MockDocumentRenderer::new()),
            rules: EngineRules::default(),
        }
    }

    pub fn ledger(&self) -> &CashLedger {
        &self.ledger
    }

    pub fn messengers(&self) -> &MessengerAssignment {
        &self.messengers
    }

    pub fn carriers(&self) -> &CarrierDirectory {
        &self.carriers
    }

    pub fn validator(&self) -> &PaymentValidationEngine {
        &self.validator
    }

    pub fn rules(&self) -> EngineRules {
        self.rules
    }

    // ========================================================================
    // Billing
    // ========================================================================

    pub async fn create_order(&self, mut new_order: NewOrder, actor: &Actor) -> OrderResult<OrderSummary> {
        require(actor, &[Capability::ClassifyOrders], "create order")?;

        new_order.order_number = new_order.order_number.trim().to_string();
        if new_order.order_number.is_empty() {
            return Err(OrderError::Validation("order_number is required".to_string()));
        }
        if new_order.total_amount < 0 {
            return Err(OrderError::Validation(format!(
                "total_amount must not be negative, got {}",
                new_order.total_amount
            )));
        }

        let order = Order::new(new_order);
        self.stores.orders.insert(&order).await?;
        tracing::info!(order_id = %order.id, "Created order {}", order.order_number);

        self.writer
            .notify(&StatusChangedEvent {
                order_id: order.id,
                order_number: order.order_number.clone(),
                from_status: order.status.to_string(),
                to_status: order.status.to_string(),
                transition: "create_order".to_string(),
                actor_id: Some(actor.id),
                timestamp: order.created_at.timestamp(),
            })
            .await;

        Ok(OrderSummary::from(&order))
    }

    /// Set payment and delivery methods and hand the order to the department
    /// chosen by [`PaymentRoutingPolicy`].
    pub async fn classify(
        &self,
        order_id: Uuid,
        classification: Classification,
        actor: &Actor,
    ) -> OrderResult<ClassifyOutcome> {
        require(actor, &[Capability::ClassifyOrders], "classify order")?;

        let order = self.writer.load(order_id).await?;
        require_status(&order, &[OrderStatus::PendienteFacturacion], "classify")?;

        let mut after = order.clone();
        after.payment_method = Some(classification.payment_method);

        if order.is_service {
            // logistics fields do not apply to services
            after.delivery_method = None;
            after.set_carrier(None);
        } else {
            let delivery = classification.delivery_method.ok_or_else(|| {
                OrderError::Validation("delivery_method is required for non-service orders".to_string())
            })?;
            if delivery.is_pickup() && classification.carrier_id.is_some() {
                return Err(OrderError::Validation(
                    "pickup orders cannot reference a carrier".to_string(),
                ));
            }
            if let Some(carrier_id) = classification.carrier_id {
                self.carriers.assignable(carrier_id).await?;
            }
            after.delivery_method = Some(delivery);
            after.set_carrier(classification.carrier_id);
        }

        let routing = match after.payment_method.as_ref() {
            Some(method) => PaymentRoutingPolicy::decide(method, after.delivery_method.as_ref(), after.is_service),
            None => return Err(OrderError::Validation("payment_method is required".to_string())),
        };
        after.status = routing.department.entry_status();

        tracing::info!(
            "Routing order {} to {:?} ({:?})",
            order.order_number,
            routing.department,
            routing.rule
        );

        let after = self.writer.commit(&order, after, "classify", actor).await?;
        Ok(ClassifyOutcome {
            order: OrderSummary::from(&after),
            routing,
        })
    }

    pub async fn cancel(&self, order_id: Uuid, reason: &str, actor: &Actor) -> OrderResult<OrderSummary> {
        require(actor, &[Capability::CancelOrders], "cancel order")?;
        let reason = self.rules.reason("reason", reason).map_err(OrderError::Validation)?;

        let order = self.writer.load(order_id).await?;
        require_non_terminal(&order, "cancel")?;

        let mut after = order.clone();
        after.status = OrderStatus::Cancelado;
        after.cancellation_reason = Some(reason.to_string());

        let after = self.writer.commit(&order, after, "cancel", actor).await?;
        Ok(OrderSummary::from(&after))
    }

    // ========================================================================
    // Wallet
    // ========================================================================

    /// Approve the payment of an order under wallet review.
    ///
    /// Credit and no-charge orders may be approved without a submission.
    /// A submission that fails validation is recorded as a rejection and the
    /// order stays in `revision_cartera`.
    pub async fn approve_payment(
        &self,
        order_id: Uuid,
        submission: Option<PaymentSubmission>,
        actor: &Actor,
    ) -> OrderResult<ApprovalOutcome> {
        require(actor, &[Capability::ReviewPayments], "approve payment")?;

        let order = self.writer.load(order_id).await?;
        require_status(&order, &[OrderStatus::RevisionCartera], "approve_payment")?;

        let submission = match submission {
            Some(s) => Some(s),
            None if order.is_credit() => Some(PaymentSubmission::Credit),
            None if order.is_no_charge() => None,
            None => return Err(PaymentRejection::MissingField { field: "payment" }.into()),
        };

        let report = match &submission {
            Some(s) => match self.validator.validate(&order, s).await {
                Ok(report) => Some(report),
                Err(rejection) => {
                    tracing::info!("Payment for order {} rejected: {}", order.order_number, rejection);
                    if let Err(e) = self
                        .record_rejection(&order, &rejection.to_string(), Some(s.payment_type()), actor)
                        .await
                    {
                        tracing::warn!("Rejection for order {} not recorded: {}", order.order_number, e);
                    }
                    return Err(rejection.into());
                }
            },
            None => None,
        };

        // 1. Advance the order; only the winning commit may record an approval
        let mut after = order.clone();
        after.status = if order.is_service {
            OrderStatus::EnEmpaque
        } else {
            OrderStatus::EnLogistica
        };
        after.wallet_rejection_reason = None;
        if let Some(report) = &report {
            after.payment_amount = Some(report.accepted_amount);
            if !order.is_credit() {
                after.paid_amount = report.accepted_amount;
            }
        }

        let after = self.writer.commit(&order, after, "approve_payment", actor).await?;

        // 2. Record the authoritative approval
        let validation = WalletValidation {
            id: Uuid::new_v4(),
            order_id,
            status: ValidationStatus::Approved,
            validated_by: actor.id,
            payment_type: submission.as_ref().map(|s| s.payment_type().to_string()),
            accepted_amount: report.as_ref().map(|r| r.accepted_amount),
            reason: None,
            warnings: report
                .as_ref()
                .map(|r| r.warnings.iter().map(ToString::to_string).collect())
                .unwrap_or_default(),
            created_at: Utc::now(),
        };
        if let Err(e) = self.stores.validations.record(&validation).await {
            tracing::error!("Approval for order {} committed but not recorded: {}", order.order_number, e);
            return Err(e.into());
        }

        Ok(ApprovalOutcome {
            order: OrderSummary::from(&after),
            report,
        })
    }

    /// Wallet declines the payment; the order stays under review.
    pub async fn reject_payment(&self, order_id: Uuid, reason: &str, actor: &Actor) -> OrderResult<OrderSummary> {
        require(actor, &[Capability::ReviewPayments], "reject payment")?;
        let reason = self.rules.reason("reason", reason).map_err(OrderError::Validation)?;

        let order = self.writer.load(order_id).await?;
        require_status(&order, &[OrderStatus::RevisionCartera], "reject_payment")?;

        let after = self.record_rejection(&order, reason, None, actor).await?;
        Ok(OrderSummary::from(&after))
    }

    async fn record_rejection(
        &self,
        order: &Order,
        reason: &str,
        payment_type: Option<&str>,
        actor: &Actor,
    ) -> OrderResult<Order> {
        let validation = WalletValidation {
            id: Uuid::new_v4(),
            order_id: order.id,
            status: ValidationStatus::Rejected,
            validated_by: actor.id,
            payment_type: payment_type.map(str::to_string),
            accepted_amount: None,
            reason: Some(reason.to_string()),
            warnings: Vec::new(),
            created_at: Utc::now(),
        };
        let mut after = order.clone();
        after.wallet_rejection_reason = Some(reason.to_string());
        let after = self.writer.commit(order, after, "reject_payment", actor).await?;

        self.stores.validations.record(&validation).await?;
        Ok(after)
    }

    // ========================================================================
    // Logistics and packaging
    // ========================================================================

    /// `en_logistica -> en_empaque`. Non-pickup orders need a carrier, either
    /// already assigned or supplied here.
    pub async fn process_to_packaging(
        &self,
        order_id: Uuid,
        carrier_id: Option<Uuid>,
        actor: &Actor,
    ) -> OrderResult<OrderSummary> {
        require(actor, &[Capability::ManageLogistics], "process to packaging")?;

        let order = self.writer.load(order_id).await?;
        require_status(&order, &[OrderStatus::EnLogistica], "process_to_packaging")?;

        let mut after = order.clone();
        if order.is_pickup() {
            if carrier_id.is_some() {
                return Err(OrderError::Validation(
                    "pickup orders cannot reference a carrier".to_string(),
                ));
            }
        } else if !order.is_service {
            match (carrier_id, order.carrier_id) {
                (Some(requested), current) if Some(requested) != current => {
                    let carrier = self.carriers.assignable(requested).await?;
                    after.set_carrier(Some(carrier.id));
                }
                (Some(_), _) => {}
                (None, Some(_)) => {}
                (None, None) => {
                    return Err(OrderError::Validation(
                        "carrier assignment is required before packaging".to_string(),
                    ))
                }
            }
        }
        after.status = OrderStatus::EnEmpaque;

        let after = self.writer.commit(&order, after, "process_to_packaging", actor).await?;
        Ok(OrderSummary::from(&after))
    }

    /// Advance to `listo_para_entrega`. Pickup orders whose payment is settled
    /// are handed over in the same call.
    pub async fn mark_ready(&self, order_id: Uuid, actor: &Actor) -> OrderResult<ReadyOutcome> {
        require(
            actor,
            &[Capability::ManagePackaging, Capability::ManageLogistics],
            "mark order ready",
        )?;

        let order = self.writer.load(order_id).await?;
        require_status(
            &order,
            &[OrderStatus::EnLogistica, OrderStatus::EnEmpaque, OrderStatus::ListoParaEntrega],
            "mark_ready",
        )?;

        let ready = if order.status == OrderStatus::ListoParaEntrega {
            order
        } else {
            let mut after = order.clone();
            after.status = OrderStatus::ListoParaEntrega;
            self.writer.commit(&order, after, "mark_ready", actor).await?
        };

        if !ready.is_pickup() {
            return Ok(ReadyOutcome {
                order: OrderSummary::from(&ready),
                auto_delivery: AutoDelivery::NotApplicable,
            });
        }

        match self.guards.settlement_gap(&ready).await? {
            None => {
                let delivered = self.finish_delivery(&ready, "deliver_at_warehouse", actor).await?;
                Ok(ReadyOutcome {
                    order: OrderSummary::from(&delivered),
                    auto_delivery: AutoDelivery::Delivered,
                })
            }
            Some(reason) => {
                tracing::info!(
                    "Pickup order {} ready but not handed over: {}",
                    ready.order_number,
                    reason
                );
                Ok(ReadyOutcome {
                    order: OrderSummary::from(&ready),
                    auto_delivery: AutoDelivery::AwaitingPayment { reason },
                })
            }
        }
    }

    pub async fn generate_shipping_guide(&self, order_id: Uuid, actor: &Actor) -> OrderResult<GuideOutcome> {
        require(actor, &[Capability::ManageLogistics], "generate shipping guide")?;

        let order = self.writer.load(order_id).await?;
        require_status(
            &order,
            &[OrderStatus::EnLogistica, OrderStatus::EnEmpaque, OrderStatus::ListoParaEntrega],
            "generate_shipping_guide",
        )?;
        if order.is_pickup() {
            return Err(OrderError::Validation(
                "pickup orders do not ship with a guide".to_string(),
            ));
        }
        let carrier_id = order
            .carrier_id
            .ok_or_else(|| OrderError::Validation("order has no carrier assigned".to_string()))?;
        // already-assigned carriers stay valid after deactivation
        let carrier = self.carriers.get_carrier(carrier_id).await?;

        let collect_on_delivery = (order.is_cash_like() && order.requires_payment)
            .then(|| order.total_amount - order.paid_amount)
            .filter(|amount| *amount > 0);

        let payload = ShippingGuidePayload {
            order_id: order.id,
            order_number: order.order_number.clone(),
            carrier_id: carrier.id,
            carrier_name: carrier.name.clone(),
            recipient: recipient::resolve(order.notes.as_deref(), order.customer_id.as_deref()),
            total_amount: order.total_amount,
            collect_on_delivery,
            notes: order.notes.clone(),
        };
        tracing::debug!("Shipping guide recipient for {}: {:?}", order.order_number, payload.recipient);

        let guide = self.renderer.render_shipping_guide(&payload).await?;

        let mut after = order.clone();
        after.shipping_guide_ref = Some(guide.reference.clone());
        if let Some(tracking) = &guide.tracking_number {
            after.tracking_number = Some(tracking.clone());
        }

        let after = self.writer.commit(&order, after, "generate_shipping_guide", actor).await?;
        Ok(GuideOutcome {
            order: OrderSummary::from(&after),
            guide,
        })
    }

    pub async fn set_tracking_number(
        &self,
        order_id: Uuid,
        tracking_number: &str,
        actor: &Actor,
    ) -> OrderResult<OrderSummary> {
        require(actor, &[Capability::ManageLogistics], "set tracking number")?;

        let tracking_number = tracking_number.trim();
        if tracking_number.is_empty() {
            return Err(OrderError::Validation("tracking_number is required".to_string()));
        }

        let order = self.writer.load(order_id).await?;
        require_non_terminal(&order, "set_tracking_number")?;
        if order.carrier_id.is_none() {
            return Err(OrderError::Validation(
                "tracking requires an assigned carrier".to_string(),
            ));
        }
        if order.tracking_number.as_deref() == Some(tracking_number) {
            return Ok(OrderSummary::from(&order));
        }

        let mut after = order.clone();
        after.tracking_number = Some(tracking_number.to_string());

        let after = self.writer.commit(&order, after, "set_tracking_number", actor).await?;
        Ok(OrderSummary::from(&after))
    }

    /// Undo logistics work and send the order back to packaging.
    pub async fn return_to_packaging(&self, order_id: Uuid, reason: &str, actor: &Actor) -> OrderResult<OrderSummary> {
        require(
            actor,
            &[Capability::ManagePackaging, Capability::ManageLogistics],
            "return to packaging",
        )?;
        let reason = self.rules.reason("reason", reason).map_err(OrderError::Validation)?;

        let order = self.writer.load(order_id).await?;
        if order.status.blocks_return_to_packaging() {
            return Err(illegal(&order, "return_to_packaging"));
        }

        let mut after = order.clone();
        after.clear_logistics();
        after.status = OrderStatus::EnEmpaque;
        after.return_reason = Some(reason.to_string());

        let after = self.writer.commit(&order, after, "return_to_packaging", actor).await?;

        if let Err(e) = self.stores.tracking.clear(order_id).await {
            tracing::warn!("Delivery tracking not cleared for order {}: {}", order.order_number, e);
        }
        Ok(OrderSummary::from(&after))
    }

    // ========================================================================
    // Delivery
    // ========================================================================

    pub async fn assign_messenger(&self, order_id: Uuid, messenger_id: Uuid, actor: &Actor) -> OrderResult<OrderSummary> {
        self.messengers.assign(order_id, messenger_id, actor).await
    }

    pub async fn start_delivery(&self, order_id: Uuid, actor: &Actor) -> OrderResult<OrderSummary> {
        self.messengers.start(order_id, actor).await
    }

    pub async fn change_carrier(
        &self,
        order_id: Uuid,
        carrier_id: Uuid,
        reason: &str,
        override_lock: bool,
        actor: &Actor,
    ) -> OrderResult<OrderSummary> {
        self.carriers
            .change_carrier(order_id, carrier_id, reason, override_lock, actor)
            .await
    }

    pub async fn deliver_to_carrier(&self, order_id: Uuid, actor: &Actor) -> OrderResult<OrderSummary> {
        require(actor, &[Capability::ManageLogistics], "deliver to carrier")?;

        let order = self.writer.load(order_id).await?;
        require_non_terminal(&order, "deliver_to_carrier")?;
        if order.is_pickup() {
            return Err(OrderError::Validation(
                "pickup orders are handed over at the warehouse".to_string(),
            ));
        }
        if order.carrier_id.is_none() {
            return Err(OrderError::Validation("order has no carrier assigned".to_string()));
        }

        let mut after = order.clone();
        after.status = OrderStatus::EntregadoTransportadora;

        let after = self.writer.commit(&order, after, "deliver_to_carrier", actor).await?;
        Ok(OrderSummary::from(&after))
    }

    pub async fn deliver_to_customer(&self, order_id: Uuid, actor: &Actor) -> OrderResult<OrderSummary> {
        let order = self.writer.load(order_id).await?;
        Self::require_deliverer(actor, &order, "deliver to customer")?;
        require_status(
            &order,
            &[OrderStatus::ListoParaEntrega, OrderStatus::EnReparto],
            "deliver_to_customer",
        )?;
        if order.is_pickup() {
            self.guards.ensure_settled_for_pickup(&order).await?;
        }

        let after = self.finish_delivery(&order, "deliver_to_customer", actor).await?;
        Ok(OrderSummary::from(&after))
    }

    pub async fn deliver_at_warehouse(&self, order_id: Uuid, actor: &Actor) -> OrderResult<OrderSummary> {
        let order = self.writer.load(order_id).await?;
        Self::require_deliverer(actor, &order, "deliver at warehouse")?;
        require_status(
            &order,
            &[OrderStatus::EnEmpaque, OrderStatus::ListoParaEntrega],
            "deliver_at_warehouse",
        )?;
        if !order.is_pickup() {
            return Err(OrderError::Validation(
                "only pickup orders are delivered at the warehouse".to_string(),
            ));
        }
        self.guards.ensure_settled_for_pickup(&order).await?;

        let after = self.finish_delivery(&order, "deliver_at_warehouse", actor).await?;
        Ok(OrderSummary::from(&after))
    }

    fn require_deliverer(actor: &Actor, order: &Order, action: &str) -> OrderResult<()> {
        if order.messenger.is_held_by(actor.id) {
            return Ok(());
        }
        require(
            actor,
            &[Capability::ManageLogistics, Capability::ReviewPayments, Capability::DeliverOrders],
            action,
        )
    }

    async fn finish_delivery(&self, order: &Order, transition: &'static str, actor: &Actor) -> OrderResult<Order> {
        let mut after = order.clone();
        after.status = OrderStatus::EntregadoCliente;
        after.delivered_at = Some(Utc::now());
        after.messenger = match order.messenger {
            MessengerState::Assigned { messenger_id }
            | MessengerState::Accepted { messenger_id }
            | MessengerState::InDelivery { messenger_id } => MessengerState::Delivered { messenger_id },
            other => other,
        };
        self.writer.commit(order, after, transition, actor).await
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn get_order(&self, order_id: Uuid) -> OrderResult<Order> {
        self.writer.load(order_id).await
    }

    pub async fn get_order_by_number(&self, order_number: &str) -> OrderResult<Order> {
        self.stores
            .orders
            .find_by_number(order_number.trim())
            .await?
            .ok_or_else(|| OrderError::not_found("order", order_number))
    }

    pub async fn ledger_entry_for(&self, order_id: Uuid) -> OrderResult<Option<CashLedgerEntry>> {
        self.ledger.entry_for(order_id).await
    }

    pub async fn latest_wallet_validation(&self, order_id: Uuid) -> OrderResult<Option<WalletValidation>> {
        Ok(self.stores.validations.latest_for(order_id).await?)
    }

    pub async fn tracking_for(&self, order_id: Uuid) -> OrderResult<Option<DeliveryTracking>> {
        Ok(self.stores.tracking.get(order_id).await?)
    }

    pub async fn carrier_changes_for(&self, order_id: Uuid) -> OrderResult<Vec<CarrierChangeLog>> {
        self.carriers.changes_for(order_id).await
    }
}
