//! Persistence ports for the engine.
//!
//! Every write that depends on the order's current state goes through
//! [`OrderRepository::update`], which must apply the row only if it still
//! matches the supplied [`Precondition`]. Adapters live in [`crate::memory`]
//! and in the `fulfil-store` crate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{Order, OrderStatus, Precondition};
use crate::records::{
    Carrier, CarrierChangeLog, CashLedgerEntry, DeliveryTracking, TrackingEvent, WalletValidation,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Order {order_id} was modified concurrently (now {current})")]
    PreconditionFailed { order_id: Uuid, current: OrderStatus },

    #[error("Duplicate {entity}: {key}")]
    Duplicate { entity: &'static str, key: String },

    #[error("{entity} not found: {id}")]
    Missing { entity: &'static str, id: String },

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Schema drift: {0}")]
    SchemaDrift(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of an insert guarded by the one-entry-per-order constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerInsert {
    Inserted(CashLedgerEntry),
    /// Another submission won; this is the row already stored.
    Existing(CashLedgerEntry),
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Fails with `Duplicate` if the order number is already taken.
    async fn insert(&self, order: &Order) -> StoreResult<()>;
    async fn get(&self, id: Uuid) -> StoreResult<Option<Order>>;
    async fn find_by_number(&self, order_number: &str) -> StoreResult<Option<Order>>;
    /// Conditional write: applies only while the stored row still has the
    /// precondition's status and version.
    async fn update(&self, order: &Order, expected: Precondition) -> StoreResult<()>;
}

#[async_trait]
pub trait CashLedgerRepository: Send + Sync {
    async fn insert_if_absent(&self, entry: &CashLedgerEntry) -> StoreResult<LedgerInsert>;
    async fn get(&self, entry_id: Uuid) -> StoreResult<Option<CashLedgerEntry>>;
    async fn find_by_order(&self, order_id: Uuid) -> StoreResult<Option<CashLedgerEntry>>;
    /// pending -> collected. Returns the stored row, unchanged if it was
    /// already collected.
    async fn mark_collected(
        &self,
        entry_id: Uuid,
        accepted_by: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<CashLedgerEntry>;
}

#[async_trait]
pub trait WalletValidationRepository: Send + Sync {
    async fn record(&self, validation: &WalletValidation) -> StoreResult<()>;
    async fn latest_for(&self, order_id: Uuid) -> StoreResult<Option<WalletValidation>>;
    async fn approved_for(&self, order_id: Uuid) -> StoreResult<Option<WalletValidation>>;
}

#[async_trait]
pub trait CarrierRepository: Send + Sync {
    /// Names are unique case-insensitively; a clash is `Duplicate`.
    async fn insert(&self, carrier: &Carrier) -> StoreResult<()>;
    async fn get(&self, id: Uuid) -> StoreResult<Option<Carrier>>;
    async fn list(&self, active_only: bool) -> StoreResult<Vec<Carrier>>;
    async fn set_active(&self, id: Uuid, active: bool) -> StoreResult<Option<Carrier>>;
}

/// Audit trail for carrier reassignments. Writes are best-effort.
#[async_trait]
pub trait CarrierChangeLogRepository: Send + Sync {
    async fn append(&self, entry: &CarrierChangeLog) -> StoreResult<()>;
    async fn list_for(&self, order_id: Uuid) -> StoreResult<Vec<CarrierChangeLog>>;
}

/// Per-order messenger timestamps. Writes are best-effort.
#[async_trait]
pub trait DeliveryTrackingRepository: Send + Sync {
    async fn upsert_assigned(&self, tracking: &DeliveryTracking) -> StoreResult<()>;
    async fn record(
        &self,
        order_id: Uuid,
        event: &TrackingEvent,
        at: DateTime<Utc>,
    ) -> StoreResult<()>;
    async fn clear(&self, order_id: Uuid) -> StoreResult<()>;
    async fn get(&self, order_id: Uuid) -> StoreResult<Option<DeliveryTracking>>;
}

/// Bundle of every port the engine writes through.
#[derive(Clone)]
pub struct Stores {
    pub orders: Arc<dyn OrderRepository>,
    pub ledger: Arc<dyn CashLedgerRepository>,
    pub validations: Arc<dyn WalletValidationRepository>,
    pub carriers: Arc<dyn CarrierRepository>,
    pub carrier_changes: Arc<dyn CarrierChangeLogRepository>,
    pub tracking: Arc<dyn DeliveryTrackingRepository>,
}
