use axum::{extract::State, Json};
use serde::Deserialize;

use crate::{
    error::{AppError, AppResult},
    middleware::RequestId,
    models::{Category, EnrichedRecommendation, ParticipantPreferences},
};

use super::{default_language, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationRequest {
    pub participants: Vec<ParticipantPreferences>,
    pub category: Category,
    #[serde(default = "default_language")]
    pub language: String,
}

impl RecommendationRequest {
    pub(crate) fn validate(&self) -> AppResult<()> {
        if self.participants.is_empty() {
            return Err(AppError::InvalidInput(
                "At least one participant is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Handler for recommendations endpoint
pub async fn recommend(
    State(state): State<AppState>,
    request_id: RequestId,
    Json(request): Json<RecommendationRequest>,
) -> AppResult<Json<Vec<EnrichedRecommendation>>> {
    request.validate()?;

    tracing::info!(
        request_id = %request_id,
        category = %request.category,
        participants = request.participants.len(),
        language = %request.language,
        "Generating recommendations"
    );

    let recommendations = state
        .recommender
        .generate_recommendations(&request.participants, request.category, &request.language)
        .await;

    Ok(Json(recommendations))
}
