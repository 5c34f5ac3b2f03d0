use axum::{extract::State, Json};
use serde::Deserialize;

use crate::{
    error::AppResult,
    models::{Category, FavoriteWork},
    services::NewFavorite,
};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct ResolveFavoriteRequest {
    pub category: Category,
    pub work: NewFavorite,
}

/// Resolves a newly added favorite against the taste graph
pub async fn resolve(
    State(state): State<AppState>,
    Json(request): Json<ResolveFavoriteRequest>,
) -> AppResult<Json<FavoriteWork>> {
    let favorite = state
        .favorites
        .resolve_favorite(request.category, request.work)
        .await?;
    Ok(Json(favorite))
}
