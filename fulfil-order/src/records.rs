//! Rows owned by the engine besides the order itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::methods::{DeliveryMethod, PaymentMethod};
use crate::models::Money;

/// Reference to an uploaded proof artifact (image or document key).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvidenceRef(pub String);

impl EvidenceRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

/// Keeps only artifacts that actually reference something.
pub fn present_evidence(evidence: &[EvidenceRef]) -> usize {
    evidence.iter().filter(|e| !e.is_blank()).count()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CashEntryStatus {
    Pending,
    Collected,
}

impl CashEntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CashEntryStatus::Pending => "pending",
            CashEntryStatus::Collected => "collected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" | "pendiente" => Some(CashEntryStatus::Pending),
            "collected" | "recibido" | "aceptado" => Some(CashEntryStatus::Collected),
            _ => None,
        }
    }
}

/// Money physically received by a department for one order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CashLedgerEntry {
    pub id: Uuid,
    pub order_id: Uuid,
    pub amount: Money,
    pub payment_method: PaymentMethod,
    pub delivery_method: Option<DeliveryMethod>,
    pub registered_by: Uuid,
    pub evidence: Vec<EvidenceRef>,
    pub status: CashEntryStatus,
    pub accepted_by: Option<Uuid>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CashLedgerEntry {
    pub fn is_collected(&self) -> bool {
        self.status == CashEntryStatus::Collected
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Approved,
    Rejected,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Approved => "approved",
            ValidationStatus::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "approved" | "aprobado" => Some(ValidationStatus::Approved),
            "rejected" | "rechazado" => Some(ValidationStatus::Rejected),
            _ => None,
        }
    }
}

/// A wallet reviewer's decision on an order's payment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WalletValidation {
    pub id: Uuid,
    pub order_id: Uuid,
    pub status: ValidationStatus,
    pub validated_by: Uuid,
    pub payment_type: Option<String>,
    pub accepted_amount: Option<Money>,
    pub reason: Option<String>,
    pub warnings: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl WalletValidation {
    pub fn is_approved(&self) -> bool {
        self.status == ValidationStatus::Approved
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Carrier {
    pub id: Uuid,
    pub name: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Carrier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            active: true,
            created_at: Utc::now(),
        }
    }
}

/// Audit row for a carrier reassignment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CarrierChangeLog {
    pub id: Uuid,
    pub order_id: Uuid,
    pub old_carrier_id: Option<Uuid>,
    pub new_carrier_id: Uuid,
    pub changed_by: Uuid,
    pub reason: String,
    pub overridden: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliveryTracking {
    pub order_id: Uuid,
    pub messenger_id: Uuid,
    pub assigned_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
}

impl DeliveryTracking {
    pub fn assigned(order_id: Uuid, messenger_id: Uuid) -> Self {
        Self {
            order_id,
            messenger_id,
            assigned_at: Utc::now(),
            accepted_at: None,
            started_at: None,
            completed_at: None,
            failed_at: None,
            failure_reason: None,
        }
    }

    /// Stamp the timestamp mirrored from a messenger transition.
    pub fn record(&mut self, event: &TrackingEvent, at: DateTime<Utc>) {
        match event {
            TrackingEvent::Accepted => self.accepted_at = Some(at),
            TrackingEvent::Started => self.started_at = Some(at),
            TrackingEvent::Completed => self.completed_at = Some(at),
            TrackingEvent::Failed { reason } => {
                self.failed_at = Some(at);
                self.failure_reason = Some(reason.clone());
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingEvent {
    Accepted,
    Started,
    Completed,
    Failed { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_evidence_is_ignored() {
        let evidence = vec![EvidenceRef::new("  "), EvidenceRef::new("s3://proof/1.jpg")];
        assert_eq!(present_evidence(&evidence), 1);
        assert_eq!(present_evidence(&[]), 0);
    }

    #[test]
    fn test_status_parsing_accepts_legacy_words() {
        assert_eq!(CashEntryStatus::parse("Recibido"), Some(CashEntryStatus::Collected));
        assert_eq!(ValidationStatus::parse("aprobado"), Some(ValidationStatus::Approved));
        assert_eq!(ValidationStatus::parse("maybe"), None);
    }

    #[test]
    fn test_tracking_records_failure_reason() {
        let mut tracking = DeliveryTracking::assigned(Uuid::new_v4(), Uuid::new_v4());
        let now = Utc::now();
        tracking.record(&TrackingEvent::Started, now);
        tracking.record(
            &TrackingEvent::Failed {
                reason: "cliente ausente".to_string(),
            },
            now,
        );

        assert_eq!(tracking.started_at, Some(now));
        assert_eq!(tracking.failure_reason.as_deref(), Some("cliente ausente"));
        assert!(tracking.completed_at.is_none());
    }
}
