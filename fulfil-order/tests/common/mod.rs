#![allow(dead_code)]

use fulfil_core::notify::RecordingPublisher;
use fulfil_core::{Actor, Capability, CapabilitySet};
use fulfil_order::memory::InMemoryStore;
use fulfil_order::{Classification, DeliveryMethod, NewOrder, OrderLifecycle, OrderSummary, PaymentMethod};
use std::sync::Arc;
use uuid::Uuid;

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub publisher: Arc<RecordingPublisher>,
    pub engine: Arc<OrderLifecycle>,
}

pub fn harness() -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let publisher = Arc::new(RecordingPublisher::new());
    let engine = OrderLifecycle::builder(store.stores())
        .publisher(publisher.clone())
        .build();
    Harness {
        store,
        publisher,
        engine: Arc::new(engine),
    }
}

fn actor(name: &str, capabilities: &[Capability]) -> Actor {
    Actor::new(Uuid::new_v4(), name, capabilities.iter().copied().collect::<CapabilitySet>())
}

pub fn admin() -> Actor {
    Actor::new(Uuid::new_v4(), "admin", CapabilitySet::all())
}

pub fn billing() -> Actor {
    actor("facturacion", &[Capability::ClassifyOrders, Capability::CancelOrders])
}

pub fn wallet() -> Actor {
    actor(
        "cartera",
        &[Capability::ReviewPayments, Capability::RegisterCash, Capability::CollectCash],
    )
}

pub fn logistics() -> Actor {
    actor("logistica", &[Capability::ManageLogistics])
}

pub fn packaging() -> Actor {
    actor("empaque", &[Capability::ManagePackaging])
}

pub fn messenger() -> Actor {
    actor("mensajero", &[Capability::DeliverOrders])
}

pub fn order_number() -> String {
    format!("FV-{}", &Uuid::new_v4().simple().to_string()[..8])
}

/// Create and classify an order in one go.
pub async fn classified_order(
    engine: &OrderLifecycle,
    total: i64,
    payment: PaymentMethod,
    delivery: DeliveryMethod,
) -> OrderSummary {
    let biller = billing();
    let created = engine
        .create_order(NewOrder::new(order_number(), total).customer("C-100"), &biller)
        .await
        .unwrap();
    engine
        .classify(
            created.id,
            Classification {
                payment_method: payment,
                delivery_method: Some(delivery),
                carrier_id: None,
            },
            &biller,
        )
        .await
        .unwrap()
        .order
}
