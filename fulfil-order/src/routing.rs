use serde::{Deserialize, Serialize};

use crate::methods::{DeliveryMethod, PaymentMethod};
use crate::models::OrderStatus;

/// Department that receives a freshly classified order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Department {
    Wallet,
    Logistics,
}

impl Department {
    pub fn entry_status(&self) -> OrderStatus {
        match self {
            Department::Wallet => OrderStatus::RevisionCartera,
            Department::Logistics => OrderStatus::EnLogistica,
        }
    }
}

/// The rule that produced a routing decision, for logs and API responses.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoutingRule {
    ServiceOrder,
    CollectedDownstream,
    CashAtWarehouse,
    CashByMessenger,
    ProofOrCreditRequired,
    Fallback,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct RoutingDecision {
    pub department: Department,
    pub rule: RoutingRule,
}

/// Decides which department receives an order after classification.
pub struct PaymentRoutingPolicy;

impl PaymentRoutingPolicy {
    pub fn route(
        payment: &PaymentMethod,
        delivery: Option<&DeliveryMethod>,
        is_service: bool,
    ) -> Department {
        Self::decide(payment, delivery, is_service).department
    }

    pub fn decide(
        payment: &PaymentMethod,
        delivery: Option<&DeliveryMethod>,
        is_service: bool,
    ) -> RoutingDecision {
        use Department::*;
        use RoutingRule::*;

        let (department, rule) = if is_service {
            (Wallet, ServiceOrder)
        } else {
            match (payment, delivery) {
                (PaymentMethod::Contraentrega | PaymentMethod::Publicidad | PaymentMethod::Reposicion, _) => {
                    (Logistics, CollectedDownstream)
                }
                (PaymentMethod::Efectivo, Some(DeliveryMethod::Pickup)) => (Wallet, CashAtWarehouse),
                (PaymentMethod::Efectivo, Some(DeliveryMethod::LocalMessenger)) => (Logistics, CashByMessenger),
                (PaymentMethod::Transferencia | PaymentMethod::PagoElectronico | PaymentMethod::Credito, _) => {
                    (Wallet, ProofOrCreditRequired)
                }
                _ => (Wallet, Fallback),
            }
        };

        RoutingDecision { department, rule }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payments() -> Vec<PaymentMethod> {
        vec![
            PaymentMethod::Efectivo,
            PaymentMethod::Transferencia,
            PaymentMethod::PagoElectronico,
            PaymentMethod::Credito,
            PaymentMethod::Contraentrega,
            PaymentMethod::Publicidad,
            PaymentMethod::Reposicion,
            PaymentMethod::Other("bono".to_string()),
        ]
    }

    fn deliveries() -> Vec<Option<DeliveryMethod>> {
        vec![
            None,
            Some(DeliveryMethod::Pickup),
            Some(DeliveryMethod::LocalMessenger),
            Some(DeliveryMethod::Carrier),
            Some(DeliveryMethod::Other("dron".to_string())),
        ]
    }

    fn expected(payment: &PaymentMethod, delivery: Option<&DeliveryMethod>, is_service: bool) -> Department {
        if is_service {
            return Department::Wallet;
        }
        match payment {
            PaymentMethod::Contraentrega | PaymentMethod::Publicidad | PaymentMethod::Reposicion => Department::Logistics,
            PaymentMethod::Efectivo if delivery == Some(&DeliveryMethod::LocalMessenger) => Department::Logistics,
            _ => Department::Wallet,
        }
    }

    #[test]
    fn test_route_full_matrix() {
        for payment in payments() {
            for delivery in deliveries() {
                for is_service in [false, true] {
                    let first = PaymentRoutingPolicy::route(&payment, delivery.as_ref(), is_service);
                    let second = PaymentRoutingPolicy::route(&payment, delivery.as_ref(), is_service);
                    assert_eq!(first, second, "non-deterministic for {payment} {delivery:?}");
                    assert_eq!(
                        first,
                        expected(&payment, delivery.as_ref(), is_service),
                        "wrong department for {payment} {delivery:?} service={is_service}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_cash_depends_on_delivery() {
        let pickup = PaymentRoutingPolicy::decide(&PaymentMethod::Efectivo, Some(&DeliveryMethod::Pickup), false);
        assert_eq!(pickup.department, Department::Wallet);
        assert_eq!(pickup.rule, RoutingRule::CashAtWarehouse);

        let local = PaymentRoutingPolicy::decide(&PaymentMethod::Efectivo, Some(&DeliveryMethod::LocalMessenger), false);
        assert_eq!(local.department, Department::Logistics);

        let carrier = PaymentRoutingPolicy::decide(&PaymentMethod::Efectivo, Some(&DeliveryMethod::Carrier), false);
        assert_eq!(carrier.rule, RoutingRule::Fallback);
    }

    #[test]
    fn test_service_orders_always_go_to_wallet() {
        let decision = PaymentRoutingPolicy::decide(&PaymentMethod::Contraentrega, None, true);
        assert_eq!(decision.department, Department::Wallet);
        assert_eq!(decision.rule, RoutingRule::ServiceOrder);
        assert_eq!(decision.department.entry_status(), OrderStatus::RevisionCartera);
    }
}
