//! Progress graph endpoints
//!
//! Thin wrappers over [`crate::tracker::ProgressTracker`]. Request and response
//! bodies use camelCase field names.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use amber_common::{ProgressGraph, TopicNode};

use crate::{ApiResult, AppState, MasteryOutcome};

/// Body of POST /api/progress/:user_id/mastery
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteryRequest {
    pub topic_id: String,
    /// Score of the study session, normally in [0, 1]
    pub performance: f64,
    /// Study time to add to the topic's total
    #[serde(default)]
    pub time_spent: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteryResponse {
    pub success: bool,
    #[serde(flatten)]
    pub outcome: MasteryOutcome,
}

/// Body of POST /api/progress/:user_id/unlock
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockRequest {
    pub topic_id: String,
}

#[derive(Debug, Serialize)]
pub struct UnlockResponse {
    pub unlocked: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RecommendationsResponse {
    pub recommendations: Vec<TopicNode>,
}

/// Body of POST /api/progress/:user_id/edges
#[derive(Debug, Deserialize)]
pub struct LinkRequest {
    pub from: String,
    pub to: String,
    #[serde(default = "default_strength")]
    pub strength: f64,
}

fn default_strength() -> f64 {
    1.0
}

/// POST /api/progress/:user_id
///
/// Creates an empty graph. 201 when created, 200 when it already existed.
pub async fn create_graph(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<(StatusCode, Json<ProgressGraph>)> {
    let (graph, created) = state.tracker.create_graph(&user_id).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(graph)))
}

/// GET /api/progress/:user_id
pub async fn get_progress(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<ProgressGraph>> {
    Ok(Json(state.tracker.get_graph(&user_id).await?))
}

/// POST /api/progress/:user_id/mastery
///
/// **Request:** `{"topicId": "algebra-1", "performance": 0.9, "timeSpent": 15}`
///
/// **Errors:**
/// - 400 Bad Request: non-finite performance or negative timeSpent
/// - 404 Not Found: unknown user or topic
pub async fn update_topic_mastery(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(payload): Json<MasteryRequest>,
) -> ApiResult<Json<MasteryResponse>> {
    let outcome = state
        .tracker
        .update_mastery(
            &user_id,
            &payload.topic_id,
            payload.performance,
            payload.time_spent,
        )
        .await?;

    Ok(Json(MasteryResponse {
        success: true,
        outcome,
    }))
}

/// POST /api/progress/:user_id/unlock
pub async fn unlock_dependents(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(payload): Json<UnlockRequest>,
) -> ApiResult<Json<UnlockResponse>> {
    let unlocked = state
        .tracker
        .unlock_dependents(&user_id, &payload.topic_id)
        .await?;
    Ok(Json(UnlockResponse { unlocked }))
}

/// GET /api/progress/:user_id/recommendations
pub async fn get_recommendations(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<RecommendationsResponse>> {
    let recommendations = state.tracker.recommended_topics(&user_id).await?;
    Ok(Json(RecommendationsResponse { recommendations }))
}

/// POST /api/progress/:user_id/edges
pub async fn link_topics(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(payload): Json<LinkRequest>,
) -> ApiResult<Json<ProgressGraph>> {
    let graph = state
        .tracker
        .link_topics(&user_id, &payload.from, &payload.to, payload.strength)
        .await?;
    info!("{}: linked {} -> {}", user_id, payload.from, payload.to);
    Ok(Json(graph))
}

/// Build progress routes
pub fn progress_routes() -> Router<AppState> {
    Router::new()
        .route("/api/progress/:user_id", get(get_progress).post(create_graph))
        .route("/api/progress/:user_id/mastery", post(update_topic_mastery))
        .route("/api/progress/:user_id/unlock", post(unlock_dependents))
        .route("/api/progress/:user_id/recommendations", get(get_recommendations))
        .route("/api/progress/:user_id/edges", post(link_topics))
        .route(
            "/api/progress/:user_id/concepts",
            post(super::concepts::add_concepts),
        )
}
