pub mod app_config;
pub mod database;
pub mod schema;
pub mod error;
pub mod order_repo;
pub mod ledger_repo;
pub mod carrier_repo;
pub mod tracking_repo;

pub use app_config::{BusinessRules, Config};
pub use database::DbClient;
pub use schema::SchemaProfile;
