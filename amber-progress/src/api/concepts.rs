//! Concept import from analyzed materials
//!
//! The material analyzer posts its analysis here once per material; every
//! concept not yet in the learner's graph becomes a locked topic.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::engine::{DifficultyLevel, MaterialAnalysis};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptsResponse {
    /// Topic ids created by this call
    pub added: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty_level: Option<DifficultyLevel>,
}

/// POST /api/progress/:user_id/concepts
///
/// **Request:** `{"concepts": [...], "prerequisites": [...], "subject": "Physics", "difficulty": 0.6}`
pub async fn add_concepts(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(analysis): Json<MaterialAnalysis>,
) -> ApiResult<Json<ConceptsResponse>> {
    let difficulty_level = match analysis.difficulty {
        Some(d) if !d.is_finite() => {
            return Err(ApiError::BadRequest(format!(
                "difficulty must be a finite number, got {}",
                d
            )))
        }
        Some(d) => Some(DifficultyLevel::from_score(d)),
        None => None,
    };

    let added = state.tracker.add_concept_nodes(&user_id, &analysis).await?;

    Ok(Json(ConceptsResponse {
        added,
        difficulty_level,
    }))
}
