use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{error::AppResult, middleware::RequestId, models::EnrichedRecommendation};

use super::{recommendations::RecommendationRequest, AppState};

/// Generates recommendations for an event and stores them
pub async fn generate(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    request_id: RequestId,
    Json(request): Json<RecommendationRequest>,
) -> AppResult<(StatusCode, Json<Vec<EnrichedRecommendation>>)> {
    request.validate()?;

    tracing::info!(
        request_id = %request_id,
        event_id = %event_id,
        category = %request.category,
        store = state.store.name(),
        "Generating recommendations for event"
    );

    let recommendations = state
        .recommender
        .generate_and_store_recommendations(
            event_id,
            &request.participants,
            request.category,
            &request.language,
            state.store.as_ref(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(recommendations)))
}

/// Returns the recommendations stored for an event
pub async fn fetch(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> AppResult<Json<Vec<EnrichedRecommendation>>> {
    let recommendations = state.store.event_recommendations(event_id).await?;
    Ok(Json(recommendations))
}
