use fulfil_core::notify::BroadcastPublisher;
use fulfil_core::IdentityResolver;
use fulfil_order::{OrderLifecycle, WebhookIngestor};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<OrderLifecycle>,
    pub identity: Arc<dyn IdentityResolver>,
    pub ingestor: WebhookIngestor,
    /// Same publisher the engine writes to; feeds `/v1/events`
    pub events: Arc<BroadcastPublisher>,
}
