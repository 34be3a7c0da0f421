use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::methods::{DeliveryMethod, PaymentMethod};

/// Currency-agnostic integer amount.
pub type Money = i64;

/// Order status in the fulfillment workflow
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub enum OrderStatus {
    PendienteFacturacion,
    RevisionCartera,
    EnLogistica,
    EnEmpaque,
    ListoParaEntrega,
    EnReparto,
    EntregadoTransportadora,
    EntregadoCliente,
    Cancelado,
}

/// Status strings written by older deployments.
const LEGACY_STATUS_ALIASES: &[(&str, OrderStatus)] = &[
    ("listo", OrderStatus::ListoParaEntrega),
    ("enviado", OrderStatus::EntregadoTransportadora),
    ("pendiente", OrderStatus::PendienteFacturacion),
    ("pendiente_cartera", OrderStatus::RevisionCartera),
    ("en_cartera", OrderStatus::RevisionCartera),
    ("empaque", OrderStatus::EnEmpaque),
    ("en_preparacion", OrderStatus::EnEmpaque),
    ("reparto", OrderStatus::EnReparto),
    ("entregado", OrderStatus::EntregadoCliente),
    ("cancelada", OrderStatus::Cancelado),
];

impl OrderStatus {
    pub const ALL: [OrderStatus; 9] = [
        OrderStatus::PendienteFacturacion,
        OrderStatus::RevisionCartera,
        OrderStatus::EnLogistica,
        OrderStatus::EnEmpaque,
        OrderStatus::ListoParaEntrega,
        OrderStatus::EnReparto,
        OrderStatus::EntregadoTransportadora,
        OrderStatus::EntregadoCliente,
        OrderStatus::Cancelado,
    ];

    /// Statuses from which "return to packaging" is refused. The legacy
    /// `enviado` normalizes into `EntregadoTransportadora`.
    pub const RETURN_BLOCKED: [OrderStatus; 3] = [
        OrderStatus::EntregadoTransportadora,
        OrderStatus::EntregadoCliente,
        OrderStatus::Cancelado,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::PendienteFacturacion => "pendiente_facturacion",
            OrderStatus::RevisionCartera => "revision_cartera",
            OrderStatus::EnLogistica => "en_logistica",
            OrderStatus::EnEmpaque => "en_empaque",
            OrderStatus::ListoParaEntrega => "listo_para_entrega",
            OrderStatus::EnReparto => "en_reparto",
            OrderStatus::EntregadoTransportadora => "entregado_transportadora",
            OrderStatus::EntregadoCliente => "entregado_cliente",
            OrderStatus::Cancelado => "cancelado",
        }
    }

    /// Parse a stored or submitted status, folding legacy aliases.
    pub fn normalize(raw: &str) -> Result<Self, UnknownStatus> {
        let token = crate::methods::normalize_token(raw);

        if let Some(status) = Self::ALL.into_iter().find(|s| s.as_str() == token) {
            return Ok(status);
        }

        LEGACY_STATUS_ALIASES
            .iter()
            .find(|(alias, _)| *alias == token)
            .map(|(_, status)| *status)
            .ok_or_else(|| UnknownStatus(raw.to_string()))
    }

    /// Every stored spelling that normalizes to this status, canonical first.
    pub fn spellings(&self) -> Vec<&'static str> {
        std::iter::once(self.as_str())
            .chain(
                LEGACY_STATUS_ALIASES
                    .iter()
                    .filter(|(_, status)| status == self)
                    .map(|(alias, _)| *alias),
            )
            .collect()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::EntregadoTransportadora | OrderStatus::EntregadoCliente | OrderStatus::Cancelado
        )
    }

    pub fn blocks_return_to_packaging(&self) -> bool {
        Self::RETURN_BLOCKED.contains(self)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::normalize(s)
    }
}

impl TryFrom<String> for OrderStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::normalize(&value)
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        status.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown order status: {0}")]
pub struct UnknownStatus(pub String);

/// A messenger's relationship to one order.
///
/// Each variant carries exactly the data valid in that state, so an order can
/// never hold a status without a messenger or the reverse.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MessengerState {
    #[default]
    Unassigned,
    Assigned { messenger_id: Uuid },
    Accepted { messenger_id: Uuid },
    InDelivery { messenger_id: Uuid },
    Delivered { messenger_id: Uuid },
    Failed { messenger_id: Uuid },
}

impl MessengerState {
    pub fn messenger_id(&self) -> Option<Uuid> {
        match self {
            MessengerState::Unassigned => None,
            MessengerState::Assigned { messenger_id }
            | MessengerState::Accepted { messenger_id }
            | MessengerState::InDelivery { messenger_id }
            | MessengerState::Delivered { messenger_id }
            | MessengerState::Failed { messenger_id } => Some(*messenger_id),
        }
    }

    /// Column value for `messenger_status`; `None` while unassigned
    pub fn status_str(&self) -> Option<&'static str> {
        match self {
            MessengerState::Unassigned => None,
            MessengerState::Assigned { .. } => Some("assigned"),
            MessengerState::Accepted { .. } => Some("accepted"),
            MessengerState::InDelivery { .. } => Some("in_delivery"),
            MessengerState::Delivered { .. } => Some("delivered"),
            MessengerState::Failed { .. } => Some("failed"),
        }
    }

    /// Rebuild from the two persisted columns. Mismatched nullability is
    /// reported rather than guessed at.
    pub fn from_columns(messenger_id: Option<Uuid>, status: Option<&str>) -> Result<Self, String> {
        match (messenger_id, status.map(crate::methods::normalize_token).as_deref()) {
            (None, None) => Ok(MessengerState::Unassigned),
            (Some(messenger_id), None | Some("assigned")) => Ok(MessengerState::Assigned { messenger_id }),
            (Some(messenger_id), Some("accepted")) => Ok(MessengerState::Accepted { messenger_id }),
            (Some(messenger_id), Some("in_delivery")) => Ok(MessengerState::InDelivery { messenger_id }),
            (Some(messenger_id), Some("delivered")) => Ok(MessengerState::Delivered { messenger_id }),
            (Some(messenger_id), Some("failed")) => Ok(MessengerState::Failed { messenger_id }),
            (None, Some(other)) => Err(format!("messenger_status '{}' without assigned messenger", other)),
            (Some(_), Some(other)) => Err(format!("unknown messenger_status '{}'", other)),
        }
    }

    pub fn blocks_reassignment(&self) -> bool {
        matches!(
            self,
            MessengerState::Accepted { .. } | MessengerState::InDelivery { .. } | MessengerState::Delivered { .. }
        )
    }

    /// Only a live assignment counts; a failed or finished attempt holds nothing.
    pub fn is_held_by(&self, actor_id: Uuid) -> bool {
        match self {
            MessengerState::Assigned { messenger_id }
            | MessengerState::Accepted { messenger_id }
            | MessengerState::InDelivery { messenger_id } => *messenger_id == actor_id,
            MessengerState::Unassigned | MessengerState::Delivered { .. } | MessengerState::Failed { .. } => false,
        }
    }
}

/// Write guard for conditional updates: the row must still be at this status
/// and version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Precondition {
    pub status: OrderStatus,
    pub version: i64,
}

/// A retail order tracked from invoicing through delivery
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub delivery_method: Option<DeliveryMethod>,
    pub is_service: bool,
    pub status: OrderStatus,
    pub carrier_id: Option<Uuid>,
    pub tracking_number: Option<String>,
    pub messenger: MessengerState,
    pub shipping_guide_ref: Option<String>,
    pub total_amount: Money,
    pub requires_payment: bool,
    pub payment_amount: Option<Money>,
    pub paid_amount: Money,
    pub notes: Option<String>,
    pub wallet_rejection_reason: Option<String>,
    pub return_reason: Option<String>,
    pub cancellation_reason: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(new_order: NewOrder) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order_number: new_order.order_number,
            customer_id: new_order.customer_id,
            payment_method: None,
            delivery_method: None,
            is_service: new_order.is_service,
            status: OrderStatus::PendienteFacturacion,
            carrier_id: None,
            tracking_number: None,
            messenger: MessengerState::Unassigned,
            shipping_guide_ref: None,
            total_amount: new_order.total_amount,
            requires_payment: new_order.requires_payment,
            payment_amount: None,
            paid_amount: 0,
            notes: new_order.notes,
            wallet_rejection_reason: None,
            return_reason: None,
            cancellation_reason: None,
            delivered_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn precondition(&self) -> Precondition {
        Precondition {
            status: self.status,
            version: self.version,
        }
    }

    pub fn is_pickup(&self) -> bool {
        self.delivery_method.as_ref().is_some_and(DeliveryMethod::is_pickup)
    }

    pub fn is_cash_like(&self) -> bool {
        self.payment_method.as_ref().is_some_and(PaymentMethod::is_cash_like)
    }

    pub fn is_credit(&self) -> bool {
        self.payment_method.as_ref().is_some_and(PaymentMethod::is_credit)
    }

    /// Nothing to collect: a no-charge method, or billing flagged the order as
    /// not requiring payment.
    pub fn is_no_charge(&self) -> bool {
        !self.requires_payment || self.payment_method.as_ref().is_some_and(PaymentMethod::is_no_charge)
    }

    pub fn shipping_guide_generated(&self) -> bool {
        self.shipping_guide_ref.is_some()
    }

    /// Any carrier change invalidates the tracking number and the guide.
    pub fn set_carrier(&mut self, carrier_id: Option<Uuid>) {
        if self.carrier_id != carrier_id {
            self.tracking_number = None;
            self.shipping_guide_ref = None;
        }
        self.carrier_id = carrier_id;
    }

    /// Drop every logistics artifact: messenger, carrier, tracking and guide.
    pub fn clear_logistics(&mut self) {
        self.messenger = MessengerState::Unassigned;
        self.carrier_id = None;
        self.tracking_number = None;
        self.shipping_guide_ref = None;
    }

    pub fn check_invariants(&self) -> Result<(), String> {
        if self.is_pickup() && (self.carrier_id.is_some() || self.tracking_number.is_some()) {
            return Err(format!(
                "pickup order {} must not reference a carrier or tracking number",
                self.order_number
            ));
        }
        if self.tracking_number.is_some() && self.carrier_id.is_none() {
            return Err(format!("order {} has tracking without a carrier", self.order_number));
        }
        Ok(())
    }
}

/// Billing input for a new order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_number: String,
    pub customer_id: Option<String>,
    pub total_amount: Money,
    #[serde(default = "default_requires_payment")]
    pub requires_payment: bool,
    #[serde(default)]
    pub is_service: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_requires_payment() -> bool {
    true
}

impl NewOrder {
    pub fn new(order_number: impl Into<String>, total_amount: Money) -> Self {
        Self {
            order_number: order_number.into(),
            customer_id: None,
            total_amount,
            requires_payment: true,
            is_service: false,
            notes: None,
        }
    }

    pub fn customer(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn service(mut self) -> Self {
        self.is_service = true;
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn without_charge(mut self) -> Self {
        self.requires_payment = false;
        self
    }
}

/// Flat view returned to callers after each transition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderSummary {
    pub id: Uuid,
    pub order_number: String,
    pub status: OrderStatus,
    pub payment_method: Option<PaymentMethod>,
    pub delivery_method: Option<DeliveryMethod>,
    pub is_service: bool,
    pub carrier_id: Option<Uuid>,
    pub tracking_number: Option<String>,
    pub assigned_messenger_id: Option<Uuid>,
    pub messenger_status: Option<String>,
    pub shipping_guide_generated: bool,
    pub total_amount: Money,
    pub requires_payment: bool,
    pub payment_amount: Option<Money>,
    pub paid_amount: Money,
    pub delivered_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Order> for OrderSummary {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            order_number: order.order_number.clone(),
            status: order.status,
            payment_method: order.payment_method.clone(),
            delivery_method: order.delivery_method.clone(),
            is_service: order.is_service,
            carrier_id: order.carrier_id,
            tracking_number: order.tracking_number.clone(),
            assigned_messenger_id: order.messenger.messenger_id(),
            messenger_status: order.messenger.status_str().map(str::to_string),
            shipping_guide_generated: order.shipping_guide_generated(),
            total_amount: order.total_amount,
            requires_payment: order.requires_payment,
            payment_amount: order.payment_amount,
            paid_amount: order.paid_amount,
            delivered_at: order.delivered_at,
            updated_at: order.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_canonical_names_round_trip() {
        for status in OrderStatus::ALL {
            assert_eq!(OrderStatus::normalize(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn test_status_legacy_aliases_normalize() {
        assert_eq!(OrderStatus::normalize("listo").unwrap(), OrderStatus::ListoParaEntrega);
        assert_eq!(OrderStatus::normalize("Enviado").unwrap(), OrderStatus::EntregadoTransportadora);
        assert_eq!(OrderStatus::normalize("pendiente_cartera").unwrap(), OrderStatus::RevisionCartera);
        assert!(OrderStatus::normalize("perdido").is_err());

        let parsed: OrderStatus = serde_json::from_str("\"listo\"").unwrap();
        assert_eq!(parsed, OrderStatus::ListoParaEntrega);
        assert_eq!(serde_json::to_string(&parsed).unwrap(), "\"listo_para_entrega\"");

        assert_eq!(
            OrderStatus::RevisionCartera.spellings(),
            vec!["revision_cartera", "pendiente_cartera", "en_cartera"]
        );
        assert_eq!(OrderStatus::EnLogistica.spellings(), vec!["en_logistica"]);
    }

    #[test]
    fn test_terminal_and_return_block_list() {
        assert!(OrderStatus::Cancelado.is_terminal());
        assert!(OrderStatus::EntregadoCliente.blocks_return_to_packaging());
        assert!(OrderStatus::normalize("enviado").unwrap().blocks_return_to_packaging());
        assert!(!OrderStatus::EnReparto.blocks_return_to_packaging());
    }

    #[test]
    fn test_messenger_state_columns() {
        let id = Uuid::new_v4();
        assert_eq!(MessengerState::from_columns(None, None).unwrap(), MessengerState::Unassigned);
        assert_eq!(
            MessengerState::from_columns(Some(id), Some("in_delivery")).unwrap(),
            MessengerState::InDelivery { messenger_id: id }
        );
        assert!(MessengerState::from_columns(None, Some("accepted")).is_err());
        assert!(MessengerState::from_columns(Some(id), Some("lost")).is_err());

        let state = MessengerState::Accepted { messenger_id: id };
        assert_eq!(state.status_str(), Some("accepted"));
        assert!(state.blocks_reassignment());
        assert!(!MessengerState::Failed { messenger_id: id }.blocks_reassignment());
    }

    #[test]
    fn test_only_live_assignment_holds_order() {
        let id = Uuid::new_v4();
        assert!(MessengerState::Assigned { messenger_id: id }.is_held_by(id));
        assert!(MessengerState::InDelivery { messenger_id: id }.is_held_by(id));
        assert!(!MessengerState::Accepted { messenger_id: id }.is_held_by(Uuid::new_v4()));
        assert!(!MessengerState::Failed { messenger_id: id }.is_held_by(id));
        assert!(!MessengerState::Delivered { messenger_id: id }.is_held_by(id));
        assert!(!MessengerState::Unassigned.is_held_by(id));
    }

    #[test]
    fn test_set_carrier_clears_tracking_and_guide() {
        let mut order = Order::new(NewOrder::new("FV-1", 10_000));
        order.carrier_id = Some(Uuid::new_v4());
        order.tracking_number = Some("TRK-1".to_string());
        order.shipping_guide_ref = Some("GUIA-FV-1".to_string());

        let same = order.carrier_id;
        order.set_carrier(same);
        assert!(order.tracking_number.is_some());

        order.set_carrier(Some(Uuid::new_v4()));
        assert!(order.tracking_number.is_none());
        assert!(!order.shipping_guide_generated());
    }

    #[test]
    fn test_pickup_invariant() {
        let mut order = Order::new(NewOrder::new("FV-2", 10_000));
        order.delivery_method = Some(DeliveryMethod::Pickup);
        assert!(order.check_invariants().is_ok());

        order.carrier_id = Some(Uuid::new_v4());
        assert!(order.check_invariants().is_err());
    }

    #[test]
    fn test_no_charge_covers_flag_and_method() {
        let mut order = Order::new(NewOrder::new("FV-3", 0).without_charge());
        assert!(order.is_no_charge());

        order.requires_payment = true;
        order.payment_method = Some(PaymentMethod::Publicidad);
        assert!(order.is_no_charge());

        order.payment_method = Some(PaymentMethod::Efectivo);
        assert!(!order.is_no_charge());
        assert!(order.is_cash_like());
    }
}
