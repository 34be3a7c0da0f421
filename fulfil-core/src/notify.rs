use async_trait::async_trait;
use fulfil_shared::StatusChangedEvent;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::CoreError;

/// Sink for status-change notifications. Delivery is best-effort: callers log
/// a failed publish and carry on.
#[async_trait]
pub trait StatusPublisher: Send + Sync {
    async fn publish(&self, event: &StatusChangedEvent) -> Result<(), CoreError>;
}

pub struct NoopPublisher;

#[async_trait]
impl StatusPublisher for NoopPublisher {
    async fn publish(&self, _event: &StatusChangedEvent) -> Result<(), CoreError> {
        Ok(())
    }
}

/// Keeps every event in memory. Can be switched to fail every publish.
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<StatusChangedEvent>>,
    failing: bool,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    pub fn events(&self) -> Vec<StatusChangedEvent> {
        self.events.lock().clone()
    }

    pub fn transitions(&self) -> Vec<(String, String)> {
        self.events
            .lock()
            .iter()
            .map(|e| (e.from_status.clone(), e.to_status.clone()))
            .collect()
    }
}

#[async_trait]
impl StatusPublisher for RecordingPublisher {
    async fn publish(&self, event: &StatusChangedEvent) -> Result<(), CoreError> {
        if self.failing {
            return Err(CoreError::Unavailable("notification sink offline".to_string()));
        }
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// Fans events out to in-process subscribers (e.g. the API event stream).
#[derive(Clone)]
pub struct BroadcastPublisher {
    tx: broadcast::Sender<StatusChangedEvent>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusChangedEvent> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl StatusPublisher for BroadcastPublisher {
    async fn publish(&self, event: &StatusChangedEvent) -> Result<(), CoreError> {
        // No subscribers is not a failure.
        if self.tx.send(event.clone()).is_err() {
            tracing::debug!("No subscribers for status event on order {}", event.order_id);
        }
        Ok(())
    }
}
