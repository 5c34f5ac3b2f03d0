use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;

use crate::{
    error::{AppError, AppResult},
    models::{Category, EnrichedRecommendation, HistoryEvent},
};

use super::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordHistoryRequest {
    pub category: Category,
    pub participants: Vec<String>,
    pub chosen_item: EnrichedRecommendation,
}

/// Lists past decisions, newest first
pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<HistoryEvent>>> {
    let history = state.store.history().await?;
    Ok(Json(history))
}

/// Records the work a group chose
pub async fn record(
    State(state): State<AppState>,
    Json(request): Json<RecordHistoryRequest>,
) -> AppResult<(StatusCode, Json<HistoryEvent>)> {
    if request.chosen_item.category != request.category {
        return Err(AppError::InvalidInput(format!(
            "Chosen item is a {} but the event category is {}",
            request.chosen_item.category, request.category
        )));
    }

    let event = HistoryEvent::record(request.category, request.participants, request.chosen_item);
    state.store.add_history_event(&event).await?;

    tracing::info!(
        event_id = %event.id,
        category = %event.category,
        title = %event.chosen_item.title,
        "Decision recorded"
    );

    Ok((StatusCode::CREATED, Json(event)))
}

/// Clears the whole history
pub async fn clear(State(state): State<AppState>) -> AppResult<StatusCode> {
    state.store.clear_history().await?;
    Ok(StatusCode::NO_CONTENT)
}
