use fulfil_order::{EngineRules, ToleranceRule};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    #[serde(default = "default_tolerance_floor")]
    pub tolerance_floor: i64,
    /// 50 = 0.5% of the order total
    #[serde(default = "default_tolerance_basis_points")]
    pub tolerance_basis_points: i64,
    #[serde(default = "default_tolerance_cap")]
    pub tolerance_cap: i64,
    #[serde(default = "default_min_reason_len")]
    pub min_reason_len: usize,
    #[serde(default = "default_webhook_queue_capacity")]
    pub webhook_queue_capacity: usize,
}

fn default_tolerance_floor() -> i64 { 200 }
fn default_tolerance_basis_points() -> i64 { 50 }
fn default_tolerance_cap() -> i64 { 5_000 }
fn default_min_reason_len() -> usize { 5 }
fn default_webhook_queue_capacity() -> usize { 256 }

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            tolerance_floor: default_tolerance_floor(),
            tolerance_basis_points: default_tolerance_basis_points(),
            tolerance_cap: default_tolerance_cap(),
            min_reason_len: default_min_reason_len(),
            webhook_queue_capacity: default_webhook_queue_capacity(),
        }
    }
}

impl From<&BusinessRules> for EngineRules {
    fn from(rules: &BusinessRules) -> Self {
        EngineRules {
            tolerance: ToleranceRule {
                floor: rules.tolerance_floor,
                basis_points: rules.tolerance_basis_points,
                cap: rules.tolerance_cap,
            },
            min_reason_len: rules.min_reason_len,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Without a URL the service runs on in-memory adapters.
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg.. `FULFIL_DATABASE__URL=postgres://...` sets `database.url`
            .add_source(config::Environment::with_prefix("FULFIL").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
