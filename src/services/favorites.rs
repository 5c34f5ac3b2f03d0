//! Favorite resolution
//!
//! A work picked from a metadata provider is looked up in the taste graph so
//! its identifier and tags can seed later recommendations.

use serde::Deserialize;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{lenient_year, string_or_number, Category, FavoriteMetadata, FavoriteWork},
    services::providers::TasteGraphProvider,
};

/// Entities requested per lookup; only the first is used
const SEARCH_LIMIT: usize = 2;

/// A work as picked from a metadata provider, before resolution
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFavorite {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub title: String,
    #[serde(default, deserialize_with = "lenient_year")]
    pub year: Option<i32>,
    #[serde(default, alias = "coverUrl")]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
}

pub struct FavoriteResolver {
    taste_graph: Arc<dyn TasteGraphProvider>,
}

impl FavoriteResolver {
    pub fn new(taste_graph: Arc<dyn TasteGraphProvider>) -> Self {
        Self { taste_graph }
    }

    /// Attaches the taste-graph id and tags to a new favorite
    ///
    /// A failed or empty lookup is not an error: the favorite is returned
    /// without an id and will simply not seed taste-graph recommendations.
    pub async fn resolve_favorite(
        &self,
        category: Category,
        work: NewFavorite,
    ) -> AppResult<FavoriteWork> {
        let title = work.title.trim();
        if title.is_empty() {
            return Err(AppError::InvalidInput(
                "Favorite title must not be empty".to_string(),
            ));
        }

        let found = match self
            .taste_graph
            .search(title, work.year, category, SEARCH_LIMIT)
            .await
        {
            Ok(entities) => entities.into_iter().find(|entity| entity.id.is_some()),
            Err(e) => {
                tracing::warn!(
                    title = %title,
                    category = %category,
                    error = %e,
                    "Taste-graph lookup failed, storing favorite without id"
                );
                None
            }
        };

        let (taste_graph_id, metadata) = match found {
            Some(entity) => {
                tracing::info!(
                    title = %title,
                    category = %category,
                    genres = entity.genres.len(),
                    "Favorite resolved"
                );
                (
                    entity.id.map(|id| id.to_string()),
                    Some(FavoriteMetadata {
                        genres: entity.genres,
                        keywords: entity.keywords,
                    }),
                )
            }
            None => {
                tracing::warn!(title = %title, category = %category, "No taste-graph match for favorite");
                (None, None)
            }
        };

        Ok(FavoriteWork {
            id: work.id,
            title: title.to_string(),
            poster_path: work.poster_path,
            taste_graph_id,
            authors: work.authors,
            categories: work.categories,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{providers::TasteGraphEntity, TasteGraphId};
    use crate::services::providers::MockTasteGraphProvider;

    fn new_favorite(title: &str, year: Option<i32>) -> NewFavorite {
        NewFavorite {
            id: "438631".to_string(),
            title: title.to_string(),
            year,
            poster_path: Some("/dune.jpg".to_string()),
            authors: Vec::new(),
            categories: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_resolves_first_entity() {
        let mut taste_graph = MockTasteGraphProvider::new();
        taste_graph
            .expect_search()
            .withf(|title, year, category, limit| {
                title == "Dune" && *year == Some(2021) && *category == Category::Film && *limit == 2
            })
            .times(1)
            .returning(|_, _, _, _| {
                Ok(vec![TasteGraphEntity {
                    id: TasteGraphId::parse("urn:entity:movie:X"),
                    name: "Dune".to_string(),
                    tmdb_id: Some(438631),
                    genres: vec!["Science Fiction".to_string()],
                    keywords: vec!["desert".to_string()],
                }])
            });

        let resolver = FavoriteResolver::new(Arc::new(taste_graph));
        let favorite = resolver
            .resolve_favorite(Category::Film, new_favorite(" Dune ", Some(2021)))
            .await
            .unwrap();

        assert_eq!(favorite.title, "Dune");
        assert_eq!(favorite.taste_graph_id.as_deref(), Some("X"));
        assert_eq!(
            favorite.metadata,
            Some(FavoriteMetadata {
                genres: vec!["Science Fiction".to_string()],
                keywords: vec!["desert".to_string()],
            })
        );
        assert_eq!(favorite.poster_path.as_deref(), Some("/dune.jpg"));
    }

    #[tokio::test]
    async fn test_lookup_failure_degrades_to_no_id() {
        let mut taste_graph = MockTasteGraphProvider::new();
        taste_graph
            .expect_search()
            .returning(|_, _, _, _| Err(AppError::MissingApiKey("Qloo")));

        let resolver = FavoriteResolver::new(Arc::new(taste_graph));
        let favorite = resolver
            .resolve_favorite(Category::Book, new_favorite("Dune", None))
            .await
            .unwrap();

        assert_eq!(favorite.taste_graph_id, None);
        assert_eq!(favorite.metadata, None);
        assert_eq!(favorite.id, "438631");
    }

    #[tokio::test]
    async fn test_blank_title_is_rejected() {
        let mut taste_graph = MockTasteGraphProvider::new();
        taste_graph.expect_search().never();

        let resolver = FavoriteResolver::new(Arc::new(taste_graph));
        let result = resolver
            .resolve_favorite(Category::Film, new_favorite("   ", None))
            .await;

        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_new_favorite_accepts_numeric_id_and_string_year() {
        let json = r#"{"id": 94605, "title": "Arcane", "year": "2021", "posterPath": "/a.jpg"}"#;
        let work: NewFavorite = serde_json::from_str(json).unwrap();
        assert_eq!(work.id, "94605");
        assert_eq!(work.year, Some(2021));

        let work: NewFavorite = serde_json::from_str(r#"{"id": "b", "title": "Dune"}"#).unwrap();
        assert_eq!(work.year, None);
    }
}
