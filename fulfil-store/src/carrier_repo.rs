use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fulfil_order::repository::{CarrierChangeLogRepository, CarrierRepository, StoreResult};
use fulfil_order::{Carrier, CarrierChangeLog, StoreError};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{db_error, is_unique_violation};
use crate::schema::{SchemaProfile, CARRIER_CHANGE_LOGS};

pub struct PgCarrierRepository {
    pool: PgPool,
}

impl PgCarrierRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CarrierRow {
    id: Uuid,
    name: String,
    active: bool,
    created_at: DateTime<Utc>,
}

impl From<CarrierRow> for Carrier {
    fn from(row: CarrierRow) -> Self {
        Carrier {
            id: row.id,
            name: row.name,
            active: row.active,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl CarrierRepository for PgCarrierRepository {
    async fn insert(&self, carrier: &Carrier) -> StoreResult<()> {
        let result = sqlx::query("INSERT INTO carriers (id, name, active, created_at) VALUES ($1, $2, $3, $4)")
            .bind(carrier.id)
            .bind(carrier.name.trim())
            .bind(carrier.active)
            .bind(carrier.created_at)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            // carriers_name_lower_idx
            Err(e) if is_unique_violation(&e) => Err(StoreError::Duplicate {
                entity: "carrier",
                key: carrier.name.clone(),
            }),
            Err(e) => Err(db_error(e)),
        }
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Carrier>> {
        let row: Option<CarrierRow> =
            sqlx::query_as("SELECT id, name, active, created_at FROM carriers WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
        Ok(row.map(Carrier::from))
    }

    async fn list(&self, active_only: bool) -> StoreResult<Vec<Carrier>> {
        let rows: Vec<CarrierRow> = sqlx::query_as(
            "SELECT id, name, active, created_at FROM carriers WHERE ($1 = false OR active) ORDER BY lower(name)",
        )
        .bind(active_only)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(rows.into_iter().map(Carrier::from).collect())
    }

    async fn set_active(&self, id: Uuid, active: bool) -> StoreResult<Option<Carrier>> {
        let row: Option<CarrierRow> = sqlx::query_as(
            "UPDATE carriers SET active = $2 WHERE id = $1 RETURNING id, name, active, created_at",
        )
        .bind(id)
        .bind(active)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(row.map(Carrier::from))
    }
}

// ============================================================================
// Carrier change log
// ============================================================================

pub struct PgCarrierChangeLogRepository {
    pool: PgPool,
    enabled: bool,
}

impl PgCarrierChangeLogRepository {
    pub fn new(pool: PgPool, profile: &SchemaProfile) -> Self {
        Self {
            pool,
            enabled: profile.has_table(CARRIER_CHANGE_LOGS),
        }
    }
}

#[derive(sqlx::FromRow)]
struct ChangeLogRow {
    id: Uuid,
    order_id: Uuid,
    old_carrier_id: Option<Uuid>,
    new_carrier_id: Uuid,
    changed_by: Uuid,
    reason: String,
    overridden: bool,
    created_at: DateTime<Utc>,
}

impl From<ChangeLogRow> for CarrierChangeLog {
    fn from(row: ChangeLogRow) -> Self {
        CarrierChangeLog {
            id: row.id,
            order_id: row.order_id,
            old_carrier_id: row.old_carrier_id,
            new_carrier_id: row.new_carrier_id,
            changed_by: row.changed_by,
            reason: row.reason,
            overridden: row.overridden,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl CarrierChangeLogRepository for PgCarrierChangeLogRepository {
    async fn append(&self, entry: &CarrierChangeLog) -> StoreResult<()> {
        if !self.enabled {
            debug!("carrier_change_logs absent, skipping audit row for order {}", entry.order_id);
            return Ok(());
        }

        sqlx::query(
            "INSERT INTO carrier_change_logs (id, order_id, old_carrier_id, new_carrier_id, changed_by, reason, \
             overridden, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(entry.id)
        .bind(entry.order_id)
        .bind(entry.old_carrier_id)
        .bind(entry.new_carrier_id)
        .bind(entry.changed_by)
        .bind(&entry.reason)
        .bind(entry.overridden)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn list_for(&self, order_id: Uuid) -> StoreResult<Vec<CarrierChangeLog>> {
        if !self.enabled {
            return Ok(Vec::new());
        }

        let rows: Vec<ChangeLogRow> = sqlx::query_as(
            "SELECT id, order_id, old_carrier_id, new_carrier_id, changed_by, reason, overridden, created_at \
             FROM carrier_change_logs WHERE order_id = $1 ORDER BY created_at",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(rows.into_iter().map(CarrierChangeLog::from).collect())
    }
}
