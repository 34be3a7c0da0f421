use fulfil_api::{app, middleware::JwtIdentityResolver, AppState};
use fulfil_core::notify::BroadcastPublisher;
use fulfil_order::{EngineRules, OrderLifecycle, Stores, WebhookIngestor};
use fulfil_store::{Config, DbClient};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const EVENT_BUFFER: usize = 256;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fulfil_api=debug,fulfil_order=info,fulfil_store=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!("Starting fulfilment API on port {}", config.server.port);

    // Storage
    let stores = match config.database.url.as_deref() {
        Some(url) => {
            let db = DbClient::new(url, config.database.max_connections).await?;
            db.migrate().await?;
            let (stores, profile) = db.stores().await?;
            if !profile.missing().is_empty() {
                tracing::warn!("Running against a partial schema, missing: {:?}", profile.missing());
            }
            stores
        }
        None => {
            tracing::warn!("No database configured, orders are kept in memory only");
            Stores::in_memory()
        }
    };

    // Engine
    let events = Arc::new(BroadcastPublisher::new(EVENT_BUFFER));
    let rules = EngineRules::from(&config.business_rules);
    let engine = Arc::new(
        OrderLifecycle::builder(stores)
            .publisher(events.clone())
            .rules(rules)
            .build(),
    );

    // Webhook worker
    let (ingestor, _worker) = WebhookIngestor::spawn(engine.clone(), config.business_rules.webhook_queue_capacity);

    let app_state = AppState {
        engine,
        identity: Arc::new(JwtIdentityResolver::new(&config.auth.jwt_secret)),
        ingestor,
        events,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(app_state)).await?;
    Ok(())
}
