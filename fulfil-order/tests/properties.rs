mod common;

use common::*;
use fulfil_order::records::EvidenceRef;
use fulfil_order::validation::PaymentValidationEngine;
use fulfil_order::{
    Classification, DeliveryMethod, NewOrder, Order, OrderError, OrderStatus, PaymentMethod, PaymentRejection,
    PaymentRoutingPolicy, PaymentSubmission, RegisterCash, ToleranceRule,
};
use fulfil_core::credit::StaticCreditLookup;
use std::sync::Arc;
use uuid::Uuid;

#[tokio::test]
async fn test_cash_registration_is_idempotent() {
    let h = harness();
    let order = classified_order(&h.engine, 18_000, PaymentMethod::Contraentrega, DeliveryMethod::LocalMessenger).await;
    let cashier = wallet();
    let input = RegisterCash {
        amount: 18_000,
        payment_method: None,
        delivery_method: None,
        evidence: vec![],
    };

    let first = h.engine.ledger().register(order.id, input.clone(), &cashier).await.unwrap();
    let second = h.engine.ledger().register(order.id, input.clone(), &cashier).await;
    match second {
        Err(OrderError::CashEntryPending { entry_id, .. }) => assert_eq!(entry_id, first.entry.id),
        other => panic!("expected pending conflict, got {other:?}"),
    }

    h.engine.ledger().accept(first.entry.id, &cashier).await.unwrap();
    let third = h.engine.ledger().register(order.id, input, &cashier).await.unwrap();
    assert_eq!(third.entry.id, first.entry.id);
    assert!(!third.created);
    assert_eq!(h.store.ledger_rows_for(order.id), 1);
}

#[tokio::test]
async fn test_concurrent_cash_registration_keeps_one_row() {
    let h = harness();
    let order = classified_order(&h.engine, 9_000, PaymentMethod::Efectivo, DeliveryMethod::Pickup).await;
    let order_id = order.id;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = h.engine.clone();
        let cashier = wallet();
        handles.push(tokio::spawn(async move {
            engine
                .ledger()
                .register(
                    order_id,
                    RegisterCash {
                        amount: 9_000,
                        payment_method: None,
                        delivery_method: None,
                        evidence: vec![],
                    },
                    &cashier,
                )
                .await
        }));
    }

    let mut created = 0;
    for handle in handles {
        if let Ok(outcome) = handle.await.unwrap() {
            assert!(outcome.created);
            created += 1;
        }
    }
    assert_eq!(created, 1);
    assert_eq!(h.store.ledger_rows_for(order_id), 1);
}

#[tokio::test]
async fn test_reassignment_blocked_for_every_messenger_once_accepted() {
    let h = harness();
    let order = classified_order(&h.engine, 22_000, PaymentMethod::Contraentrega, DeliveryMethod::LocalMessenger).await;
    let dispatcher = logistics();
    let m = messenger();

    // unset/assigned: same messenger is idempotent, another one replaces
    h.engine.assign_messenger(order.id, m.id, &dispatcher).await.unwrap();
    h.engine.assign_messenger(order.id, m.id, &dispatcher).await.unwrap();

    h.engine.messengers().accept(order.id, &m).await.unwrap();
    for candidate in [m.id, Uuid::new_v4(), Uuid::new_v4()] {
        let err = h.engine.assign_messenger(order.id, candidate, &dispatcher).await.unwrap_err();
        assert!(matches!(err, OrderError::ReassignmentBlocked { .. }));
    }

    h.engine.start_delivery(order.id, &m).await.unwrap();
    let err = h.engine.assign_messenger(order.id, m.id, &dispatcher).await.unwrap_err();
    assert!(matches!(err, OrderError::ReassignmentBlocked { state: "in_delivery", .. }));

    h.engine.messengers().complete(order.id, &m).await.unwrap();
    let err = h.engine.assign_messenger(order.id, Uuid::new_v4(), &dispatcher).await.unwrap_err();
    assert!(matches!(err, OrderError::ReassignmentBlocked { state: "delivered", .. }));
}

#[test]
fn test_tolerance_bounds_are_symmetric() {
    let engine = PaymentValidationEngine::new(ToleranceRule::default(), Arc::new(StaticCreditLookup::new()));
    let rule = ToleranceRule::default();

    for total in [1_000_i64, 39_999, 40_000, 100_000, 555_555, 999_999, 1_000_000, 5_000_000] {
        let tol = rule.tolerance(total);
        let submit = |amount: i64| PaymentSubmission::Single {
            method: Some(PaymentMethod::PagoElectronico),
            declared_amount: Some(amount),
            evidence: vec![EvidenceRef::new("pse.pdf")],
        };

        for amount in [total - tol, total, total + tol] {
            assert!(
                engine.check_amounts(total, &submit(amount), None).is_ok(),
                "{amount} should validate against {total}"
            );
        }

        match engine.check_amounts(total, &submit(total - tol - 1), None) {
            Err(PaymentRejection::InsufficientPayment { delta, .. }) => assert_eq!(delta, tol + 1),
            other => panic!("expected insufficient for {total}, got {other:?}"),
        }
        match engine.check_amounts(total, &submit(total + tol + 1), None) {
            Err(PaymentRejection::ExcessPayment { delta, .. }) => assert_eq!(delta, tol + 1),
            other => panic!("expected excess for {total}, got {other:?}"),
        }
    }
}

#[test]
fn test_routing_is_deterministic() {
    let payments = ["efectivo", "transferencia", "pago electrónico", "crédito", "contraentrega", "publicidad", "reposición", "bono"];
    let deliveries = [None, Some("recoge en bodega"), Some("mensajería local"), Some("transportadora"), Some("dron")];

    for payment in payments {
        for delivery in deliveries {
            for is_service in [false, true] {
                let p = PaymentMethod::parse(payment);
                let d = delivery.map(DeliveryMethod::parse);
                let first = PaymentRoutingPolicy::route(&p, d.as_ref(), is_service);
                for _ in 0..3 {
                    assert_eq!(PaymentRoutingPolicy::route(&p, d.as_ref(), is_service), first);
                }
            }
        }
    }
}

#[tokio::test]
async fn test_carrier_change_clears_tracking() {
    let h = harness();
    let admin = admin();
    let order = classified_order(&h.engine, 60_000, PaymentMethod::Contraentrega, DeliveryMethod::Carrier).await;
    let a = h.engine.carriers().register_carrier("Servientrega", &admin).await.unwrap();
    let b = h.engine.carriers().register_carrier("Envia", &admin).await.unwrap();

    h.engine.process_to_packaging(order.id, Some(a.id), &admin).await.unwrap();
    h.engine.generate_shipping_guide(order.id, &admin).await.unwrap();
    h.engine.set_tracking_number(order.id, "SV-123456", &admin).await.unwrap();

    let before = h.engine.get_order(order.id).await.unwrap();
    assert!(before.shipping_guide_generated());
    assert!(before.tracking_number.is_some());

    let after = h
        .engine
        .change_carrier(order.id, b.id, "cobertura insuficiente", false, &admin)
        .await
        .unwrap();
    assert!(after.tracking_number.is_none());
    assert!(!after.shipping_guide_generated);
    assert_eq!(h.engine.carrier_changes_for(order.id).await.unwrap().len(), 1);
}

fn terminal_order(h: &Harness, status: OrderStatus) -> Order {
    let mut order = Order::new(NewOrder::new(order_number(), 10_000));
    order.payment_method = Some(PaymentMethod::Transferencia);
    order.delivery_method = Some(DeliveryMethod::Carrier);
    order.status = status;
    h.store.put_order(order.clone());
    order
}

#[tokio::test]
async fn test_terminal_orders_reject_every_transition() {
    let h = harness();
    let actor = admin();
    let carrier = h.engine.carriers().register_carrier("TCC", &actor).await.unwrap();

    for status in [
        OrderStatus::EntregadoCliente,
        OrderStatus::EntregadoTransportadora,
        OrderStatus::Cancelado,
    ] {
        let order = terminal_order(&h, status);
        let id = order.id;
        let e = &h.engine;

        let results = vec![
            e.classify(
                id,
                Classification {
                    payment_method: PaymentMethod::Efectivo,
                    delivery_method: Some(DeliveryMethod::Pickup),
                    carrier_id: None,
                },
                &actor,
            )
            .await
            .map(|_| ()),
            e.approve_payment(id, None, &actor).await.map(|_| ()),
            e.reject_payment(id, "comprobante ilegible", &actor).await.map(|_| ()),
            e.process_to_packaging(id, Some(carrier.id), &actor).await.map(|_| ()),
            e.mark_ready(id, &actor).await.map(|_| ()),
            e.assign_messenger(id, Uuid::new_v4(), &actor).await.map(|_| ()),
            e.start_delivery(id, &actor).await.map(|_| ()),
            e.deliver_to_carrier(id, &actor).await.map(|_| ()),
            e.deliver_to_customer(id, &actor).await.map(|_| ()),
            e.deliver_at_warehouse(id, &actor).await.map(|_| ()),
            e.return_to_packaging(id, "devolución", &actor).await.map(|_| ()),
            e.change_carrier(id, carrier.id, "reclamo cliente", false, &actor).await.map(|_| ()),
            e.cancel(id, "cliente desiste", &actor).await.map(|_| ()),
            e.generate_shipping_guide(id, &actor).await.map(|_| ()),
            e.set_tracking_number(id, "TRK-1", &actor).await.map(|_| ()),
        ];

        for (i, result) in results.into_iter().enumerate() {
            assert!(
                matches!(result, Err(OrderError::IllegalTransition { .. })),
                "operation #{i} on {status} returned {result:?}"
            );
        }

        let stored = h.engine.get_order(id).await.unwrap();
        assert_eq!(stored.status, status);
        assert_eq!(stored.version, order.version);
    }

    // the explicit override is the one way through
    let order = terminal_order(&h, OrderStatus::EntregadoTransportadora);
    let changed = h
        .engine
        .change_carrier(order.id, carrier.id, "reclamo cliente", true, &actor)
        .await
        .unwrap();
    assert_eq!(changed.carrier_id, Some(carrier.id));
}
