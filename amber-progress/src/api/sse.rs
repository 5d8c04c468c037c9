//! Server-Sent Events for progress changes

use crate::AppState;
use axum::{
    extract::{Query, State},
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use serde::Deserialize;
use std::convert::Infallible;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsQuery {
    /// Only stream events for this learner
    #[serde(default)]
    pub user_id: Option<String>,
}

/// GET /events - SSE stream of progress events
///
/// Sends `ConnectionStatus` on connect, then one SSE event per
/// `ProgressEvent` (event name = event type, data = JSON).
pub async fn event_stream(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    amber_common::sse::create_event_sse_stream(
        "amber-progress",
        state.tracker.events(),
        query.user_id,
    )
}
