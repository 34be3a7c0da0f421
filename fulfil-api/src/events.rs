use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EventFilter {
    pub order_id: Option<Uuid>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/events", get(stream_events))
}

/// GET /v1/events
/// Server-sent stream of committed status changes, optionally for one order.
pub async fn stream_events(
    State(state): State<AppState>,
    Query(filter): Query<EventFilter>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events.subscribe();
    let only = filter.order_id;

    let stream = BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(event) => {
                if only.is_some_and(|id| id != event.order_id) {
                    return None;
                }
                Event::default()
                    .event("status_changed")
                    .json_data(&event)
                    .ok()
                    .map(Ok::<_, Infallible>)
            }
            Err(lagged) => {
                // slow subscriber; keep streaming from the newest event
                tracing::warn!("Event stream subscriber lagged: {}", lagged);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
