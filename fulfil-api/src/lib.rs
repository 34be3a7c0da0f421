use axum::{http::Method, routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod carriers;
pub mod error;
pub mod events;
pub mod ledger;
pub mod middleware;
pub mod orders;
pub mod state;
pub mod webhooks;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    // CORS Middleware
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    // Staff routes carry an Actor; webhooks and health do not.
    let staff = Router::new()
        .merge(orders::routes())
        .merge(ledger::routes())
        .merge(carriers::routes())
        .merge(events::routes())
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::actor_middleware,
        ));

    Router::new()
        .merge(staff)
        .merge(webhooks::routes())
        .route("/health", get(|| async { "OK" }))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
