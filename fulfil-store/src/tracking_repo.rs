use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fulfil_order::repository::{DeliveryTrackingRepository, StoreResult};
use fulfil_order::{DeliveryTracking, TrackingEvent};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::error::db_error;
use crate::schema::{SchemaProfile, DELIVERY_TRACKING};

pub struct PgDeliveryTrackingRepository {
    pool: PgPool,
    enabled: bool,
}

impl PgDeliveryTrackingRepository {
    pub fn new(pool: PgPool, profile: &SchemaProfile) -> Self {
        Self {
            pool,
            enabled: profile.has_table(DELIVERY_TRACKING),
        }
    }
}

#[derive(sqlx::FromRow)]
struct TrackingRow {
    order_id: Uuid,
    messenger_id: Uuid,
    assigned_at: DateTime<Utc>,
    accepted_at: Option<DateTime<Utc>>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    failed_at: Option<DateTime<Utc>>,
    failure_reason: Option<String>,
}

impl From<TrackingRow> for DeliveryTracking {
    fn from(row: TrackingRow) -> Self {
        DeliveryTracking {
            order_id: row.order_id,
            messenger_id: row.messenger_id,
            assigned_at: row.assigned_at,
            accepted_at: row.accepted_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            failed_at: row.failed_at,
            failure_reason: row.failure_reason,
        }
    }
}

/// Column stamped by each messenger event.
fn event_column(event: &TrackingEvent) -> &'static str {
    match event {
        TrackingEvent::Accepted => "accepted_at",
        TrackingEvent::Started => "started_at",
        TrackingEvent::Completed => "completed_at",
        TrackingEvent::Failed { .. } => "failed_at",
    }
}

#[async_trait]
impl DeliveryTrackingRepository for PgDeliveryTrackingRepository {
    async fn upsert_assigned(&self, tracking: &DeliveryTracking) -> StoreResult<()> {
        if !self.enabled {
            debug!("delivery_tracking absent, skipping assignment of order {}", tracking.order_id);
            return Ok(());
        }

        // A new assignment restarts the timeline
        sqlx::query(
            "INSERT INTO delivery_tracking (order_id, messenger_id, assigned_at) VALUES ($1, $2, $3) \
             ON CONFLICT (order_id) DO UPDATE SET messenger_id = EXCLUDED.messenger_id, \
             assigned_at = EXCLUDED.assigned_at, accepted_at = NULL, started_at = NULL, \
             completed_at = NULL, failed_at = NULL, failure_reason = NULL",
        )
        .bind(tracking.order_id)
        .bind(tracking.messenger_id)
        .bind(tracking.assigned_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn record(
        &self,
        order_id: Uuid,
        event: &TrackingEvent,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        if !self.enabled {
            return Ok(());
        }

        let reason = match event {
            TrackingEvent::Failed { reason } => Some(reason.as_str()),
            _ => None,
        };
        let sql = format!(
            "UPDATE delivery_tracking SET {} = $2, failure_reason = COALESCE($3, failure_reason) WHERE order_id = $1",
            event_column(event)
        );
        sqlx::query(&sql)
            .bind(order_id)
            .bind(at)
            .bind(reason)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn clear(&self, order_id: Uuid) -> StoreResult<()> {
        if !self.enabled {
            return Ok(());
        }

        sqlx::query("DELETE FROM delivery_tracking WHERE order_id = $1")
            .bind(order_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn get(&self, order_id: Uuid) -> StoreResult<Option<DeliveryTracking>> {
        if !self.enabled {
            return Ok(None);
        }

        let row: Option<TrackingRow> = sqlx::query_as(
            "SELECT order_id, messenger_id, assigned_at, accepted_at, started_at, completed_at, failed_at, \
             failure_reason FROM delivery_tracking WHERE order_id = $1",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(row.map(DeliveryTracking::from))
    }
}
