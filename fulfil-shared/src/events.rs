use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Broadcast after every committed order transition.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StatusChangedEvent {
    #[serde(rename = "orderId")]
    pub order_id: Uuid,
    pub order_number: String,
    pub from_status: String,
    pub to_status: String,
    pub transition: String,
    pub actor_id: Option<Uuid>,
    pub timestamp: i64,
}

impl StatusChangedEvent {
    pub fn is_status_change(&self) -> bool {
        self.from_status != self.to_status
    }
}

/// Envelope posted by the external invoicing system.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct InvoiceWebhook {
    pub id: String,
    pub event: InvoiceEvent,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum InvoiceEvent {
    #[serde(rename = "invoice.issued")]
    Issued {
        order_number: String,
        customer_id: Option<String>,
        total_amount: i64,
        #[serde(default)]
        is_service: bool,
        #[serde(default)]
        notes: Option<String>,
    },
    #[serde(rename = "invoice.voided")]
    Voided {
        order_number: String,
        #[serde(default)]
        reason: Option<String>,
    },
}

impl InvoiceEvent {
    pub fn order_number(&self) -> &str {
        match self {
            InvoiceEvent::Issued { order_number, .. } => order_number,
            InvoiceEvent::Voided { order_number, .. } => order_number,
        }
    }
}
