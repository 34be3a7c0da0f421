use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use fulfil_api::{app, middleware::JwtIdentityResolver, middleware::StaffClaims, AppState};
use fulfil_core::identity::StaticIdentityResolver;
use fulfil_core::notify::BroadcastPublisher;
use fulfil_core::{Actor, Capability, CapabilitySet, IdentityResolver};
use fulfil_order::{OrderLifecycle, Stores, WebhookIngestor};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

const BILLING: &str = "billing-token";
const WALLET: &str = "wallet-token";
const PACKER: &str = "packer-token";

fn actor(name: &str, capabilities: &[Capability]) -> Actor {
    Actor::new(Uuid::new_v4(), name, capabilities.iter().copied().collect::<CapabilitySet>())
}

fn state_with(identity: Arc<dyn IdentityResolver>) -> AppState {
    let events = Arc::new(BroadcastPublisher::new(64));
    let engine = Arc::new(
        OrderLifecycle::builder(Stores::in_memory())
            .publisher(events.clone())
            .build(),
    );
    let (ingestor, _worker) = WebhookIngestor::spawn(engine.clone(), 16);

    AppState {
        engine,
        identity,
        ingestor,
        events,
    }
}

fn test_state() -> AppState {
    let identity = StaticIdentityResolver::new()
        .with_actor(BILLING, actor("Facturación", &[Capability::ClassifyOrders, Capability::CancelOrders]))
        .with_actor(WALLET, actor("Cartera", &[Capability::ReviewPayments]))
        .with_actor(PACKER, actor("Empaque", &[Capability::ManagePackaging]));
    state_with(Arc::new(identity))
}

async fn send(router: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn create_order(router: &Router, number: &str, total: i64) -> String {
    let (status, body) = send(
        router,
        "POST",
        "/v1/orders",
        Some(BILLING),
        Some(json!({ "order_number": number, "customer_id": "C-77", "total_amount": total })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "pendiente_facturacion");
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_is_public() {
    let router = app(test_state());
    let (status, _) = send(&router, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_staff_routes_require_token() {
    let router = app(test_state());

    let (status, body) = send(&router, "GET", "/v1/carriers", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthenticated");

    let (status, _) = send(&router, "GET", "/v1/carriers", Some("forged"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_transfer_order_reaches_logistics() {
    let router = app(test_state());
    let id = create_order(&router, "FV-1001", 100_000).await;

    // 1. Billing classifies
    let (status, body) = send(
        &router,
        "POST",
        &format!("/v1/orders/{}/classify", id),
        Some(BILLING),
        Some(json!({ "payment_method": "transferencia", "delivery_method": "transportadora" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["status"], "revision_cartera");
    assert_eq!(body["routing"]["department"], "WALLET");

    // 2. Wallet approves with proof
    let (status, body) = send(
        &router,
        "POST",
        &format!("/v1/orders/{}/payment/approve", id),
        Some(WALLET),
        Some(json!({
            "submission": {
                "payment_type": "single",
                "declared_amount": 100_300,
                "evidence": ["uploads/fv-1001.jpg"]
            }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["status"], "en_logistica");
    assert_eq!(body["order"]["paid_amount"], 100_300);

    // 3. Recorded validation is readable
    let (status, body) = send(
        &router,
        "GET",
        &format!("/v1/orders/{}/payment/validation", id),
        Some(WALLET),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "approved");

    let (status, body) = send(&router, "GET", "/v1/orders/by-number/FV-1001", Some(PACKER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id.as_str());
}

#[tokio::test]
async fn test_wrong_department_is_forbidden() {
    let router = app(test_state());
    let id = create_order(&router, "FV-1002", 50_000).await;

    let (status, body) = send(
        &router,
        "POST",
        &format!("/v1/orders/{}/classify", id),
        Some(PACKER),
        Some(json!({ "payment_method": "efectivo", "delivery_method": "recoge_bodega" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn test_short_payment_is_unprocessable() {
    let router = app(test_state());
    let id = create_order(&router, "FV-1003", 100_000).await;
    send(
        &router,
        "POST",
        &format!("/v1/orders/{}/classify", id),
        Some(BILLING),
        Some(json!({ "payment_method": "transferencia", "delivery_method": "transportadora" })),
    )
    .await;

    let (status, body) = send(
        &router,
        "POST",
        &format!("/v1/orders/{}/payment/approve", id),
        Some(WALLET),
        Some(json!({
            "submission": { "payment_type": "single", "declared_amount": 99_000, "evidence": ["x.jpg"] }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "insufficient_payment");
    assert_eq!(body["detail"]["delta"], 1_000);
    assert_eq!(body["detail"]["tolerance"], 500);

    // Order stays under review
    let (_, body) = send(&router, "GET", &format!("/v1/orders/{}", id), Some(WALLET), None).await;
    assert_eq!(body["status"], "revision_cartera");
}

#[tokio::test]
async fn test_out_of_order_transition_conflicts() {
    let router = app(test_state());
    let id = create_order(&router, "FV-1004", 20_000).await;

    let (status, body) = send(&router, "POST", &format!("/v1/orders/{}/ready", id), Some(PACKER), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "illegal_transition");
    assert_eq!(body["detail"]["current_status"], "pendiente_facturacion");
    assert_eq!(body["detail"]["attempted"], "mark_ready");
}

#[tokio::test]
async fn test_unknown_order_is_not_found() {
    let router = app(test_state());
    let (status, body) = send(
        &router,
        "GET",
        &format!("/v1/orders/{}", Uuid::new_v4()),
        Some(BILLING),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_invoice_webhook_is_accepted_and_applied() {
    let state = test_state();
    let engine = state.engine.clone();
    let router = app(state);

    let (status, body) = send(
        &router,
        "POST",
        "/v1/webhooks/invoices",
        None,
        Some(json!({
            "id": "wh-1",
            "event": {
                "type": "invoice.issued",
                "data": { "order_number": "FV-2001", "customer_id": "C-1", "total_amount": 45_000 }
            }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["webhook_id"], "wh-1");
    assert_eq!(body["order_number"], "FV-2001");

    let mut created = None;
    for _ in 0..50 {
        if let Ok(order) = engine.get_order_by_number("FV-2001").await {
            created = Some(order);
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    let order = created.expect("webhook was never applied");
    assert_eq!(order.total_amount, 45_000);
}

#[tokio::test]
async fn test_jwt_role_drives_access() {
    let state = state_with(Arc::new(JwtIdentityResolver::new("test-secret")));
    let router = app(state);

    let claims = StaffClaims {
        sub: Uuid::new_v4().to_string(),
        name: "Andrea".to_string(),
        role: "FACTURACION".to_string(),
        permissions: vec![],
        exp: (Utc::now() + Duration::minutes(5)).timestamp() as usize,
    };
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"test-secret")).unwrap();

    let (status, body) = send(
        &router,
        "POST",
        "/v1/orders",
        Some(&token),
        Some(json!({ "order_number": "FV-3001", "total_amount": 10_000 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["order_number"], "FV-3001");

    let (status, _) = send(
        &router,
        "POST",
        "/v1/carriers",
        Some(&token),
        Some(json!({ "name": "Servientrega" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
