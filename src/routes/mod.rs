use axum::{
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    db::RecommendationStore,
    middleware::{make_span_with_request_id, request_id_middleware},
    services::{
        providers::{BookMetadataProvider, ScreenMetadataProvider, TasteGraphProvider, TextGenerator},
        FavoriteResolver, PreferenceAssistant, RecommendationService, RecommendationSettings,
        TasteDiscovery,
    },
};

pub mod assistant;
pub mod events;
pub mod favorites;
pub mod history;
pub mod recommendations;

/// Language used when a request does not name one
pub(crate) fn default_language() -> String {
    "en".to_string()
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub recommender: Arc<RecommendationService>,
    pub favorites: Arc<FavoriteResolver>,
    pub assistant: Arc<PreferenceAssistant>,
    pub chat: Arc<TasteDiscovery>,
    pub store: Arc<dyn RecommendationStore>,
}

impl AppState {
    /// Wires the services on top of the provider clients
    pub fn new(
        taste_graph: Arc<dyn TasteGraphProvider>,
        screens: Arc<dyn ScreenMetadataProvider>,
        books: Arc<dyn BookMetadataProvider>,
        text: Arc<dyn TextGenerator>,
        settings: RecommendationSettings,
        store: Arc<dyn RecommendationStore>,
    ) -> Self {
        let favorites = Arc::new(FavoriteResolver::new(taste_graph.clone()));

        Self {
            recommender: Arc::new(RecommendationService::new(
                taste_graph.clone(),
                screens.clone(),
                books.clone(),
                text.clone(),
                settings,
            )),
            chat: Arc::new(TasteDiscovery::new(
                text.clone(),
                screens,
                books,
                favorites.clone(),
            )),
            favorites,
            assistant: Arc::new(PreferenceAssistant::new(text, taste_graph)),
            store,
        }
    }
}

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id)),
        )
}

/// API routes under /api/v1
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/recommendations", post(recommendations::recommend))
        .route(
            "/events/:event_id/recommendations",
            post(events::generate).get(events::fetch),
        )
        .route("/favorites/resolve", post(favorites::resolve))
        .route("/assistant/interpret", post(assistant::interpret))
        .route("/assistant/chat", post(assistant::chat))
        .route(
            "/history",
            get(history::list).post(history::record).delete(history::clear),
        )
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
