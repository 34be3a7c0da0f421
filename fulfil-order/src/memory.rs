//! In-process adapters for every repository port.
//!
//! Used by tests and by the API binary when no database is configured.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{Order, Precondition};
use crate::records::{
    CashEntryStatus, Carrier, CarrierChangeLog, CashLedgerEntry, DeliveryTracking, TrackingEvent,
    ValidationStatus, WalletValidation,
};
use crate::repository::{
    CarrierChangeLogRepository, CarrierRepository, CashLedgerRepository, DeliveryTrackingRepository,
    LedgerInsert, OrderRepository, StoreError, StoreResult, Stores, WalletValidationRepository,
};

#[derive(Default)]
struct Tables {
    orders: HashMap<Uuid, Order>,
    ledger: HashMap<Uuid, CashLedgerEntry>,
    validations: Vec<WalletValidation>,
    carriers: HashMap<Uuid, Carrier>,
    carrier_changes: Vec<CarrierChangeLog>,
    tracking: HashMap<Uuid, DeliveryTracking>,
}

/// All tables behind one lock, so conditional writes are atomic.
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    audit_tables: bool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            audit_tables: true,
        }
    }

    /// A deployment where the change-log and tracking tables were never
    /// created; writes to them fail with `SchemaDrift`.
    pub fn without_audit_tables() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            audit_tables: false,
        }
    }

    pub fn stores(self: &Arc<Self>) -> Stores {
        Stores {
            orders: self.clone(),
            ledger: self.clone(),
            validations: self.clone(),
            carriers: self.clone(),
            carrier_changes: self.clone(),
            tracking: self.clone(),
        }
    }

    /// Overwrite a row without any precondition (test fixtures).
    pub fn put_order(&self, order: Order) {
        self.tables.write().orders.insert(order.id, order);
    }

    pub fn ledger_rows_for(&self, order_id: Uuid) -> usize {
        self.tables
            .read()
            .ledger
            .values()
            .filter(|e| e.order_id == order_id)
            .count()
    }

    fn require_audit(&self, table: &str) -> StoreResult<()> {
        if self.audit_tables {
            Ok(())
        } else {
            Err(StoreError::SchemaDrift(format!("relation \"{}\" does not exist", table)))
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Stores {
    pub fn in_memory() -> Self {
        Arc::new(InMemoryStore::new()).stores()
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn insert(&self, order: &Order) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if tables.orders.values().any(|o| o.order_number == order.order_number) {
            return Err(StoreError::Duplicate {
                entity: "order",
                key: order.order_number.clone(),
            });
        }
        tables.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.tables.read().orders.get(&id).cloned())
    }

    async fn find_by_number(&self, order_number: &str) -> StoreResult<Option<Order>> {
        Ok(self
            .tables
            .read()
            .orders
            .values()
            .find(|o| o.order_number == order_number)
            .cloned())
    }

    async fn update(&self, order: &Order, expected: Precondition) -> StoreResult<()> {
        let mut tables = self.tables.write();
        let stored = tables.orders.get_mut(&order.id).ok_or_else(|| StoreError::Missing {
            entity: "order",
            id: order.id.to_string(),
        })?;

        if stored.status != expected.status || stored.version != expected.version {
            return Err(StoreError::PreconditionFailed {
                order_id: order.id,
                current: stored.status,
            });
        }

        *stored = order.clone();
        Ok(())
    }
}

#[async_trait]
impl CashLedgerRepository for InMemoryStore {
    async fn insert_if_absent(&self, entry: &CashLedgerEntry) -> StoreResult<LedgerInsert> {
        let mut tables = self.tables.write();
        if let Some(existing) = tables.ledger.values().find(|e| e.order_id == entry.order_id) {
            return Ok(LedgerInsert::Existing(existing.clone()));
        }
        tables.ledger.insert(entry.id, entry.clone());
        Ok(LedgerInsert::Inserted(entry.clone()))
    }

    async fn get(&self, entry_id: Uuid) -> StoreResult<Option<CashLedgerEntry>> {
        Ok(self.tables.read().ledger.get(&entry_id).cloned())
    }

    async fn find_by_order(&self, order_id: Uuid) -> StoreResult<Option<CashLedgerEntry>> {
        Ok(self
            .tables
            .read()
            .ledger
            .values()
            .find(|e| e.order_id == order_id)
            .cloned())
    }

    async fn mark_collected(
        &self,
        entry_id: Uuid,
        accepted_by: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<CashLedgerEntry> {
        let mut tables = self.tables.write();
        let entry = tables.ledger.get_mut(&entry_id).ok_or_else(|| StoreError::Missing {
            entity: "cash ledger entry",
            id: entry_id.to_string(),
        })?;

        if entry.status == CashEntryStatus::Pending {
            entry.status = CashEntryStatus::Collected;
            entry.accepted_by = Some(accepted_by);
            entry.accepted_at = Some(at);
            entry.updated_at = at;
        }
        Ok(entry.clone())
    }
}

#[async_trait]
impl WalletValidationRepository for InMemoryStore {
    async fn record(&self, validation: &WalletValidation) -> StoreResult<()> {
        self.tables.write().validations.push(validation.clone());
        Ok(())
    }

    async fn latest_for(&self, order_id: Uuid) -> StoreResult<Option<WalletValidation>> {
        Ok(self
            .tables
            .read()
            .validations
            .iter()
            .rev()
            .find(|v| v.order_id == order_id)
            .cloned())
    }

    async fn approved_for(&self, order_id: Uuid) -> StoreResult<Option<WalletValidation>> {
        Ok(self
            .tables
            .read()
            .validations
            .iter()
            .rev()
            .find(|v| v.order_id == order_id && v.status == ValidationStatus::Approved)
            .cloned())
    }
}

#[async_trait]
impl CarrierRepository for InMemoryStore {
    async fn insert(&self, carrier: &Carrier) -> StoreResult<()> {
        let mut tables = self.tables.write();
        let key = carrier.name.trim().to_lowercase();
        if tables.carriers.values().any(|c| c.name.trim().to_lowercase() == key) {
            return Err(StoreError::Duplicate {
                entity: "carrier",
                key: carrier.name.clone(),
            });
        }
        tables.carriers.insert(carrier.id, carrier.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Carrier>> {
        Ok(self.tables.read().carriers.get(&id).cloned())
    }

    async fn list(&self, active_only: bool) -> StoreResult<Vec<Carrier>> {
        let mut carriers: Vec<Carrier> = self
            .tables
            .read()
            .carriers
            .values()
            .filter(|c| !active_only || c.active)
            .cloned()
            .collect();
        carriers.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(carriers)
    }

    async fn set_active(&self, id: Uuid, active: bool) -> StoreResult<Option<Carrier>> {
        let mut tables = self.tables.write();
        Ok(tables.carriers.get_mut(&id).map(|carrier| {
            carrier.active = active;
            carrier.clone()
        }))
    }
}

#[async_trait]
impl CarrierChangeLogRepository for InMemoryStore {
    async fn append(&self, entry: &CarrierChangeLog) -> StoreResult<()> {
        self.require_audit("carrier_change_logs")?;
        self.tables.write().carrier_changes.push(entry.clone());
        Ok(())
    }

    async fn list_for(&self, order_id: Uuid) -> StoreResult<Vec<CarrierChangeLog>> {
        if !self.audit_tables {
            return Ok(Vec::new());
        }
        Ok(self
            .tables
            .read()
            .carrier_changes
            .iter()
            .filter(|c| c.order_id == order_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DeliveryTrackingRepository for InMemoryStore {
    async fn upsert_assigned(&self, tracking: &DeliveryTracking) -> StoreResult<()> {
        self.require_audit("delivery_tracking")?;
        self.tables.write().tracking.insert(tracking.order_id, tracking.clone());
        Ok(())
    }

    async fn record(
        &self,
        order_id: Uuid,
        event: &TrackingEvent,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.require_audit("delivery_tracking")?;
        if let Some(row) = self.tables.write().tracking.get_mut(&order_id) {
            row.record(event, at);
        }
        Ok(())
    }

    async fn clear(&self, order_id: Uuid) -> StoreResult<()> {
        self.require_audit("delivery_tracking")?;
        self.tables.write().tracking.remove(&order_id);
        Ok(())
    }

    async fn get(&self, order_id: Uuid) -> StoreResult<Option<DeliveryTracking>> {
        if !self.audit_tables {
            return Ok(None);
        }
        Ok(self.tables.read().tracking.get(&order_id).cloned())
    }
}
