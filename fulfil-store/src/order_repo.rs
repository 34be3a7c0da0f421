use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use fulfil_order::repository::{OrderRepository, StoreResult};
use fulfil_order::{
    DeliveryMethod, MessengerState, Order, OrderStatus, PaymentMethod, Precondition, StoreError,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::warn;
use uuid::Uuid;

use crate::error::{db_error, is_undefined_column, is_unique_violation};
use crate::schema::SchemaProfile;

pub struct PgOrderRepository {
    pool: PgPool,
    profile: SchemaProfile,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool, profile: SchemaProfile) -> Self {
        Self { pool, profile }
    }
}

// Every column, optional ones included; absent columns are selected as NULL
#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    customer_id: Option<String>,
    payment_method: Option<String>,
    delivery_method: Option<String>,
    is_service: bool,
    status: String,
    carrier_id: Option<Uuid>,
    tracking_number: Option<String>,
    assigned_messenger_id: Option<Uuid>,
    messenger_status: Option<String>,
    total_amount: i64,
    requires_payment: bool,
    payment_amount: Option<i64>,
    paid_amount: i64,
    notes: Option<String>,
    cancellation_reason: Option<String>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    shipping_guide_ref: Option<String>,
    delivered_at: Option<DateTime<Utc>>,
    return_reason: Option<String>,
    wallet_rejection_reason: Option<String>,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = OrderStatus::normalize(&row.status)
            .map_err(|e| StoreError::Corrupt(format!("order {}: {}", row.order_number, e)))?;
        let messenger = MessengerState::from_columns(row.assigned_messenger_id, row.messenger_status.as_deref())
            .map_err(|e| StoreError::Corrupt(format!("order {}: {}", row.order_number, e)))?;

        Ok(Order {
            id: row.id,
            order_number: row.order_number,
            customer_id: row.customer_id,
            payment_method: row.payment_method.map(PaymentMethod::from),
            delivery_method: row.delivery_method.map(DeliveryMethod::from),
            is_service: row.is_service,
            status,
            carrier_id: row.carrier_id,
            tracking_number: row.tracking_number,
            messenger,
            shipping_guide_ref: row.shipping_guide_ref,
            total_amount: row.total_amount,
            requires_payment: row.requires_payment,
            payment_amount: row.payment_amount,
            paid_amount: row.paid_amount,
            notes: row.notes,
            wallet_rejection_reason: row.wallet_rejection_reason,
            return_reason: row.return_reason,
            cancellation_reason: row.cancellation_reason,
            delivered_at: row.delivered_at,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

enum Lookup<'a> {
    Id(Uuid),
    Number(&'a str),
}

fn push_value(qb: &mut QueryBuilder<'_, Postgres>, column: &str, order: &Order) {
    match column {
        "id" => qb.push_bind(order.id),
        "order_number" => qb.push_bind(order.order_number.clone()),
        "customer_id" => qb.push_bind(order.customer_id.clone()),
        "payment_method" => qb.push_bind(order.payment_method.as_ref().map(|m| m.as_str().to_string())),
        "delivery_method" => qb.push_bind(order.delivery_method.as_ref().map(|m| m.as_str().to_string())),
        "is_service" => qb.push_bind(order.is_service),
        "status" => qb.push_bind(order.status.as_str()),
        "carrier_id" => qb.push_bind(order.carrier_id),
        "tracking_number" => qb.push_bind(order.tracking_number.clone()),
        "assigned_messenger_id" => qb.push_bind(order.messenger.messenger_id()),
        "messenger_status" => qb.push_bind(order.messenger.status_str()),
        "total_amount" => qb.push_bind(order.total_amount),
        "requires_payment" => qb.push_bind(order.requires_payment),
        "payment_amount" => qb.push_bind(order.payment_amount),
        "paid_amount" => qb.push_bind(order.paid_amount),
        "notes" => qb.push_bind(order.notes.clone()),
        "cancellation_reason" => qb.push_bind(order.cancellation_reason.clone()),
        "version" => qb.push_bind(order.version),
        "created_at" => qb.push_bind(order.created_at),
        "updated_at" => qb.push_bind(order.updated_at),
        "shipping_guide_ref" => qb.push_bind(order.shipping_guide_ref.clone()),
        "delivered_at" => qb.push_bind(order.delivered_at),
        "return_reason" => qb.push_bind(order.return_reason.clone()),
        "wallet_rejection_reason" => qb.push_bind(order.wallet_rejection_reason.clone()),
        _ => qb.push("DEFAULT"),
    };
}

fn insert_statement<'a>(order: &Order, columns: &[&'static str]) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::new("INSERT INTO orders (");
    qb.push(columns.join(", "));
    qb.push(") VALUES (");
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        push_value(&mut qb, column, order);
    }
    qb.push(")");
    qb
}

fn update_statement<'a>(order: &Order, expected: Precondition, columns: &[&'static str]) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::new("UPDATE orders SET ");
    let assignable = columns.iter().filter(|c| !matches!(**c, "id" | "order_number" | "created_at"));
    for (i, column) in assignable.enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        qb.push(*column).push(" = ");
        push_value(&mut qb, column, order);
    }

    // Legacy spellings of the expected status count as a match
    let spellings: Vec<String> = expected.status.spellings().into_iter().map(str::to_string).collect();
    qb.push(" WHERE id = ").push_bind(order.id);
    qb.push(" AND version = ").push_bind(expected.version);
    qb.push(" AND status = ANY(").push_bind(spellings).push(")");
    qb
}

fn select_statement<'a>(profile: &SchemaProfile, lookup: &Lookup<'_>) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT {} FROM orders WHERE ", profile.order_select_list()));
    match lookup {
        Lookup::Id(id) => qb.push("id = ").push_bind(*id),
        Lookup::Number(number) => qb.push("order_number = ").push_bind(number.to_string()),
    };
    qb
}

/// Run a statement against the configured columns. When the database
/// reports a missing column, run it exactly once more with only the
/// mandatory columns; a second failure is returned as-is.
async fn with_column_fallback<T, E, F, Fut>(
    profile: &SchemaProfile,
    is_missing_column: fn(&E) -> bool,
    what: &str,
    mut run: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut(SchemaProfile) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    match run(profile.clone()).await {
        Err(e) if is_missing_column(&e) => {
            warn!("{} hit a missing column, retrying with mandatory columns: {}", what, e);
            run(SchemaProfile::minimal()).await
        }
        other => other,
    }
}

impl PgOrderRepository {
    async fn fetch(&self, lookup: Lookup<'_>) -> StoreResult<Option<Order>> {
        let pool = &self.pool;
        let lookup = &lookup;
        let row = with_column_fallback(&self.profile, is_undefined_column, "Order select", |profile| async move {
            select_statement(&profile, lookup)
                .build_query_as::<OrderRow>()
                .fetch_optional(pool)
                .await
        })
        .await
        .map_err(db_error)?;

        row.map(Order::try_from).transpose()
    }

    /// Explain a zero-row conditional update.
    async fn precondition_failure(&self, order_id: Uuid) -> StoreError {
        let current: Result<Option<String>, sqlx::Error> =
            sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
                .bind(order_id)
                .fetch_optional(&self.pool)
                .await;

        match current {
            Ok(Some(raw)) => match OrderStatus::normalize(&raw) {
                Ok(current) => StoreError::PreconditionFailed { order_id, current },
                Err(e) => StoreError::Corrupt(e.to_string()),
            },
            Ok(None) => StoreError::Missing {
                entity: "order",
                id: order_id.to_string(),
            },
            Err(e) => db_error(e),
        }
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn insert(&self, order: &Order) -> StoreResult<()> {
        let pool = &self.pool;
        let result = with_column_fallback(&self.profile, is_undefined_column, "Order insert", |profile| async move {
            insert_statement(order, &profile.writable_order_columns())
                .build()
                .execute(pool)
                .await
        })
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(StoreError::Duplicate {
                entity: "order",
                key: order.order_number.clone(),
            }),
            Err(e) => Err(db_error(e)),
        }
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Order>> {
        self.fetch(Lookup::Id(id)).await
    }

    async fn find_by_number(&self, order_number: &str) -> StoreResult<Option<Order>> {
        self.fetch(Lookup::Number(order_number)).await
    }

    async fn update(&self, order: &Order, expected: Precondition) -> StoreResult<()> {
        let pool = &self.pool;
        let result = with_column_fallback(&self.profile, is_undefined_column, "Order update", |profile| async move {
            update_statement(order, expected, &profile.writable_order_columns())
                .build()
                .execute(pool)
                .await
        })
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(self.precondition_failure(order.id).await);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fulfil_order::NewOrder;

    #[test]
    fn test_update_statement_skips_identity_columns() {
        let order = Order::new(NewOrder::new("FV-1", 10_000));
        let columns = SchemaProfile::minimal().writable_order_columns();
        let sql = update_statement(&order, order.precondition(), &columns).into_sql();

        assert!(sql.starts_with("UPDATE orders SET customer_id = $1"));
        assert!(!sql.contains("order_number ="));
        assert!(!sql.contains("created_at ="));
        assert!(sql.contains("AND status = ANY("));
        assert!(!sql.contains("delivered_at"));
    }

    #[test]
    fn test_select_statement_follows_profile() {
        let sql = select_statement(&SchemaProfile::minimal(), &Lookup::Number("FV-1")).into_sql();
        assert!(sql.contains("NULL::text AS shipping_guide_ref"));
        assert!(sql.ends_with("WHERE order_number = $1"));

        let sql = select_statement(&SchemaProfile::full(), &Lookup::Id(Uuid::nil())).into_sql();
        assert!(sql.contains(", delivered_at,"));
    }

    #[test]
    fn test_insert_statement_binds_every_column() {
        let order = Order::new(NewOrder::new("FV-2", 5_000));
        let columns = SchemaProfile::full().writable_order_columns();
        let sql = insert_statement(&order, &columns).into_sql();

        assert!(sql.contains(&format!("${}", columns.len())));
        assert!(!sql.contains("DEFAULT"));
    }

    #[derive(Debug, PartialEq)]
    enum FakeDbError {
        MissingColumn,
        Down,
    }

    impl std::fmt::Display for FakeDbError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    fn missing_column(e: &FakeDbError) -> bool {
        *e == FakeDbError::MissingColumn
    }

    /// Replays canned results and records the profile of every attempt.
    async fn replay(results: Vec<Result<u32, FakeDbError>>) -> (Result<u32, FakeDbError>, Vec<SchemaProfile>) {
        let mut results = results.into_iter();
        let mut attempts = Vec::new();
        let outcome = with_column_fallback(&SchemaProfile::full(), missing_column, "Order select", |profile| {
            attempts.push(profile);
            let next = results.next().unwrap_or(Err(FakeDbError::Down));
            async move { next }
        })
        .await;
        (outcome, attempts)
    }

    #[tokio::test]
    async fn test_column_fallback_not_used_when_first_attempt_succeeds() {
        let (outcome, attempts) = replay(vec![Ok(7)]).await;
        assert_eq!(outcome, Ok(7));
        assert_eq!(attempts, vec![SchemaProfile::full()]);
    }

    #[tokio::test]
    async fn test_column_fallback_retries_once_with_mandatory_columns() {
        let (outcome, attempts) = replay(vec![Err(FakeDbError::MissingColumn), Ok(3)]).await;
        assert_eq!(outcome, Ok(3));
        assert_eq!(attempts, vec![SchemaProfile::full(), SchemaProfile::minimal()]);
    }

    #[tokio::test]
    async fn test_column_fallback_reraises_second_failure() {
        let (outcome, attempts) = replay(vec![
            Err(FakeDbError::MissingColumn),
            Err(FakeDbError::MissingColumn),
            Ok(1),
        ])
        .await;
        assert_eq!(outcome, Err(FakeDbError::MissingColumn));
        assert_eq!(attempts.len(), 2);
    }

    #[tokio::test]
    async fn test_column_fallback_ignores_other_errors() {
        let (outcome, attempts) = replay(vec![Err(FakeDbError::Down), Ok(1)]).await;
        assert_eq!(outcome, Err(FakeDbError::Down));
        assert_eq!(attempts.len(), 1);
    }
}
