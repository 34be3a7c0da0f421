//! Boot-time probe of which optional columns and tables a deployment has.
//!
//! Older databases predate some of the order columns and the two audit
//! tables. The adapters build their statements from a [`SchemaProfile`]
//! instead of discovering the gap through failed queries.

use sqlx::PgPool;
use std::collections::HashSet;
use tracing::{info, warn};

/// Order columns every deployment has.
pub const REQUIRED_ORDER_COLUMNS: &[&str] = &[
    "id",
    "order_number",
    "customer_id",
    "payment_method",
    "delivery_method",
    "is_service",
    "status",
    "carrier_id",
    "tracking_number",
    "assigned_messenger_id",
    "messenger_status",
    "total_amount",
    "requires_payment",
    "payment_amount",
    "paid_amount",
    "notes",
    "cancellation_reason",
    "version",
    "created_at",
    "updated_at",
];

/// Order columns added by later migrations, with the SQL type used to
/// select a typed NULL when the column is missing.
pub const OPTIONAL_ORDER_COLUMNS: &[(&str, &str)] = &[
    ("shipping_guide_ref", "text"),
    ("delivered_at", "timestamptz"),
    ("return_reason", "text"),
    ("wallet_rejection_reason", "text"),
];

pub const CARRIER_CHANGE_LOGS: &str = "carrier_change_logs";
pub const DELIVERY_TRACKING: &str = "delivery_tracking";

const OPTIONAL_TABLES: &[&str] = &[CARRIER_CHANGE_LOGS, DELIVERY_TRACKING];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaProfile {
    order_columns: HashSet<String>,
    tables: HashSet<String>,
}

impl SchemaProfile {
    /// Everything present, as created by the bundled migrations.
    pub fn full() -> Self {
        Self::from_parts(
            OPTIONAL_ORDER_COLUMNS.iter().map(|(c, _)| *c),
            OPTIONAL_TABLES.iter().copied(),
        )
    }

    /// Only the mandatory columns and no audit tables.
    pub fn minimal() -> Self {
        Self::from_parts(std::iter::empty::<&str>(), std::iter::empty::<&str>())
    }

    pub fn from_parts<C, T>(order_columns: C, tables: T) -> Self
    where
        C: IntoIterator,
        C::Item: AsRef<str>,
        T: IntoIterator,
        T::Item: AsRef<str>,
    {
        Self {
            order_columns: order_columns.into_iter().map(|c| c.as_ref().to_string()).collect(),
            tables: tables.into_iter().map(|t| t.as_ref().to_string()).collect(),
        }
    }

    pub async fn probe(pool: &PgPool) -> Result<Self, sqlx::Error> {
        let columns: Vec<String> = sqlx::query_scalar(
            "SELECT column_name::text FROM information_schema.columns \
             WHERE table_schema = current_schema() AND table_name = 'orders'",
        )
        .fetch_all(pool)
        .await?;

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT table_name::text FROM information_schema.tables \
             WHERE table_schema = current_schema()",
        )
        .fetch_all(pool)
        .await?;

        let profile = Self::from_parts(columns, tables);
        let missing = profile.missing();
        if missing.is_empty() {
            info!("Schema profile: all optional columns and tables present");
        } else {
            warn!("Schema profile: running without {}", missing.join(", "));
        }
        Ok(profile)
    }

    pub fn has_order_column(&self, column: &str) -> bool {
        REQUIRED_ORDER_COLUMNS.contains(&column) || self.order_columns.contains(column)
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.tables.contains(table)
    }

    /// Columns to write: the mandatory set plus the optional ones present.
    pub fn writable_order_columns(&self) -> Vec<&'static str> {
        REQUIRED_ORDER_COLUMNS
            .iter()
            .copied()
            .chain(
                OPTIONAL_ORDER_COLUMNS
                    .iter()
                    .map(|(c, _)| *c)
                    .filter(|c| self.order_columns.contains(*c)),
            )
            .collect()
    }

    /// SELECT list with typed NULLs standing in for absent optional columns.
    pub fn order_select_list(&self) -> String {
        let mut list: Vec<String> = REQUIRED_ORDER_COLUMNS.iter().map(|c| c.to_string()).collect();
        for (column, sql_type) in OPTIONAL_ORDER_COLUMNS {
            if self.order_columns.contains(*column) {
                list.push(column.to_string());
            } else {
                list.push(format!("NULL::{} AS {}", sql_type, column));
            }
        }
        list.join(", ")
    }

    pub fn missing(&self) -> Vec<String> {
        OPTIONAL_ORDER_COLUMNS
            .iter()
            .filter(|(c, _)| !self.order_columns.contains(*c))
            .map(|(c, _)| format!("orders.{}", c))
            .chain(
                OPTIONAL_TABLES
                    .iter()
                    .filter(|t| !self.tables.contains(**t))
                    .map(|t| t.to_string()),
            )
            .collect()
    }
}
