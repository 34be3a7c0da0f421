use fulfil_order::Stores;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::carrier_repo::{PgCarrierChangeLogRepository, PgCarrierRepository};
use crate::ledger_repo::{PgCashLedgerRepository, PgWalletValidationRepository};
use crate::order_repo::PgOrderRepository;
use crate::schema::SchemaProfile;
use crate::tracking_repo::PgDeliveryTrackingRepository;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    /// Probe the schema once and wire every repository port to this pool.
    pub async fn stores(&self) -> Result<(Stores, SchemaProfile), sqlx::Error> {
        let profile = SchemaProfile::probe(&self.pool).await?;

        let stores = Stores {
            orders: Arc::new(PgOrderRepository::new(self.pool.clone(), profile.clone())),
            ledger: Arc::new(PgCashLedgerRepository::new(self.pool.clone())),
            validations: Arc::new(PgWalletValidationRepository::new(self.pool.clone())),
            carriers: Arc::new(PgCarrierRepository::new(self.pool.clone())),
            carrier_changes: Arc::new(PgCarrierChangeLogRepository::new(self.pool.clone(), &profile)),
            tracking: Arc::new(PgDeliveryTrackingRepository::new(self.pool.clone(), &profile)),
        };
        Ok((stores, profile))
    }
}
