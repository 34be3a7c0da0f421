use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fulfil_order::repository::{CashLedgerRepository, StoreResult, WalletValidationRepository};
use fulfil_order::{
    CashEntryStatus, CashLedgerEntry, DeliveryMethod, EvidenceRef, LedgerInsert, PaymentMethod, StoreError,
    ValidationStatus, WalletValidation,
};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::db_error;

const LEDGER_COLUMNS: &str = "id, order_id, amount, payment_method, delivery_method, registered_by, evidence, \
                              status, accepted_by, accepted_at, created_at, updated_at";

pub struct PgCashLedgerRepository {
    pool: PgPool,
}

impl PgCashLedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct LedgerRow {
    id: Uuid,
    order_id: Uuid,
    amount: i64,
    payment_method: String,
    delivery_method: Option<String>,
    registered_by: Uuid,
    evidence: Json<Vec<EvidenceRef>>,
    status: String,
    accepted_by: Option<Uuid>,
    accepted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<LedgerRow> for CashLedgerEntry {
    type Error = StoreError;

    fn try_from(row: LedgerRow) -> Result<Self, Self::Error> {
        let status = CashEntryStatus::parse(&row.status)
            .ok_or_else(|| StoreError::Corrupt(format!("cash entry {}: status '{}'", row.id, row.status)))?;
        Ok(CashLedgerEntry {
            id: row.id,
            order_id: row.order_id,
            amount: row.amount,
            payment_method: PaymentMethod::from(row.payment_method),
            delivery_method: row.delivery_method.map(DeliveryMethod::from),
            registered_by: row.registered_by,
            evidence: row.evidence.0,
            status,
            accepted_by: row.accepted_by,
            accepted_at: row.accepted_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl PgCashLedgerRepository {
    async fn select_one(&self, column: &str, id: Uuid) -> StoreResult<Option<CashLedgerEntry>> {
        let sql = format!("SELECT {} FROM cash_ledger WHERE {} = $1", LEDGER_COLUMNS, column);
        let row: Option<LedgerRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.map(CashLedgerEntry::try_from).transpose()
    }
}

#[async_trait]
impl CashLedgerRepository for PgCashLedgerRepository {
    async fn insert_if_absent(&self, entry: &CashLedgerEntry) -> StoreResult<LedgerInsert> {
        // The unique index on order_id decides between concurrent registrations
        let sql = format!(
            "INSERT INTO cash_ledger ({cols}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             ON CONFLICT (order_id) DO NOTHING RETURNING {cols}",
            cols = LEDGER_COLUMNS
        );
        let inserted: Option<LedgerRow> = sqlx::query_as(&sql)
            .bind(entry.id)
            .bind(entry.order_id)
            .bind(entry.amount)
            .bind(entry.payment_method.as_str())
            .bind(entry.delivery_method.as_ref().map(|m| m.as_str()))
            .bind(entry.registered_by)
            .bind(Json(&entry.evidence))
            .bind(entry.status.as_str())
            .bind(entry.accepted_by)
            .bind(entry.accepted_at)
            .bind(entry.created_at)
            .bind(entry.updated_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        match inserted {
            Some(row) => Ok(LedgerInsert::Inserted(row.try_into()?)),
            None => self
                .find_by_order(entry.order_id)
                .await?
                .map(LedgerInsert::Existing)
                .ok_or_else(|| StoreError::Missing {
                    entity: "cash ledger entry",
                    id: entry.order_id.to_string(),
                }),
        }
    }

    async fn get(&self, entry_id: Uuid) -> StoreResult<Option<CashLedgerEntry>> {
        self.select_one("id", entry_id).await
    }

    async fn find_by_order(&self, order_id: Uuid) -> StoreResult<Option<CashLedgerEntry>> {
        self.select_one("order_id", order_id).await
    }

    async fn mark_collected(
        &self,
        entry_id: Uuid,
        accepted_by: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<CashLedgerEntry> {
        let sql = format!(
            "UPDATE cash_ledger SET status = 'collected', accepted_by = $2, accepted_at = $3, updated_at = $3 \
             WHERE id = $1 AND status = 'pending' RETURNING {}",
            LEDGER_COLUMNS
        );
        let updated: Option<LedgerRow> = sqlx::query_as(&sql)
            .bind(entry_id)
            .bind(accepted_by)
            .bind(at)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        match updated {
            Some(row) => row.try_into(),
            // Already collected, or gone
            None => self.get(entry_id).await?.ok_or_else(|| StoreError::Missing {
                entity: "cash ledger entry",
                id: entry_id.to_string(),
            }),
        }
    }
}

// ============================================================================
// Wallet validations
// ============================================================================

const VALIDATION_COLUMNS: &str =
    "id, order_id, status, validated_by, payment_type, accepted_amount, reason, warnings, created_at";

pub struct PgWalletValidationRepository {
    pool: PgPool,
}

impl PgWalletValidationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ValidationRow {
    id: Uuid,
    order_id: Uuid,
    status: String,
    validated_by: Uuid,
    payment_type: Option<String>,
    accepted_amount: Option<i64>,
    reason: Option<String>,
    warnings: Json<Vec<String>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ValidationRow> for WalletValidation {
    type Error = StoreError;

    fn try_from(row: ValidationRow) -> Result<Self, Self::Error> {
        let status = ValidationStatus::parse(&row.status)
            .ok_or_else(|| StoreError::Corrupt(format!("wallet validation {}: status '{}'", row.id, row.status)))?;
        Ok(WalletValidation {
            id: row.id,
            order_id: row.order_id,
            status,
            validated_by: row.validated_by,
            payment_type: row.payment_type,
            accepted_amount: row.accepted_amount,
            reason: row.reason,
            warnings: row.warnings.0,
            created_at: row.created_at,
        })
    }
}

impl PgWalletValidationRepository {
    async fn latest(&self, order_id: Uuid, status: Option<ValidationStatus>) -> StoreResult<Option<WalletValidation>> {
        let sql = format!(
            "SELECT {} FROM wallet_validations WHERE order_id = $1 AND ($2::text IS NULL OR status = $2) \
             ORDER BY created_at DESC LIMIT 1",
            VALIDATION_COLUMNS
        );
        let row: Option<ValidationRow> = sqlx::query_as(&sql)
            .bind(order_id)
            .bind(status.map(|s| s.as_str()))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.map(WalletValidation::try_from).transpose()
    }
}

#[async_trait]
impl WalletValidationRepository for PgWalletValidationRepository {
    async fn record(&self, validation: &WalletValidation) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO wallet_validations (id, order_id, status, validated_by, payment_type, accepted_amount, \
             reason, warnings, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(validation.id)
        .bind(validation.order_id)
        .bind(validation.status.as_str())
        .bind(validation.validated_by)
        .bind(validation.payment_type.as_deref())
        .bind(validation.accepted_amount)
        .bind(validation.reason.as_deref())
        .bind(Json(&validation.warnings))
        .bind(validation.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn latest_for(&self, order_id: Uuid) -> StoreResult<Option<WalletValidation>> {
        self.latest(order_id, None).await
    }

    async fn approved_for(&self, order_id: Uuid) -> StoreResult<Option<WalletValidation>> {
        self.latest(order_id, Some(ValidationStatus::Approved)).await
    }
}
