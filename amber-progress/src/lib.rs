//! amber-progress library - Progress Graph Engine service
//!
//! Maintains each learner's topic graph: mastery updates from performance
//! samples, prerequisite-gated unlocking, recommendations, and concept import
//! from analyzed materials.

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use amber_common::EventBus;

pub mod api;
pub mod db;
pub mod engine;
pub mod error;
pub mod locks;
pub mod tracker;

pub use crate::error::{ApiError, ApiResult};
pub use crate::tracker::{MasteryOutcome, ProgressTracker};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Graph operations (owns the database pool and event bus)
    pub tracker: ProgressTracker,
    /// Service startup timestamp for uptime reporting
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, event_bus: EventBus, max_write_attempts: u32) -> Self {
        Self {
            tracker: ProgressTracker::new(db, event_bus, max_write_attempts),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::progress_routes())
        .merge(api::health_routes())
        .route("/build_info", get(api::get_build_info))
        .route("/events", get(api::event_stream))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
