//! Qloo taste-graph provider
//!
//! API Flow:
//! 1. Favorite resolution: `/search` → entity id + genre/keyword tags
//! 2. Recommendation: `/v2/insights` seeded with the collected entity ids
//!
//! Entity ids travel without their `urn:entity:<type>:` namespace; the type is
//! sent separately as `filter.type` / `types`.

use crate::{
    error::AppResult,
    models::{
        providers::{QlooEntity, QlooInsightsResponse, QlooSearchResponse, TasteGraphEntity},
        Candidate, CandidateId, Category, TasteGraphId,
    },
    services::providers::{
        build_http_client, ensure_success, read_json, require_key, warn_if_missing_key,
        TasteGraphProvider,
    },
};
use reqwest::Client as HttpClient;
use std::time::Duration;

const PROVIDER: &str = "Qloo";

/// Entity type URN for a category
pub fn entity_type(category: Category) -> &'static str {
    match category {
        Category::Film => "urn:entity:movie",
        Category::Book => "urn:entity:book",
        Category::TvShow => "urn:entity:tv_show",
    }
}

/// Well-known titles used when every other source came back empty
const CURATED_FILMS: [&str; 6] = [
    "Spirited Away",
    "The Grand Budapest Hotel",
    "Parasite",
    "Amélie",
    "The Intouchables",
    "Interstellar",
];
const CURATED_BOOKS: [&str; 6] = [
    "The Little Prince",
    "1984",
    "Dune",
    "The Stranger",
    "One Hundred Years of Solitude",
    "The Name of the Wind",
];
const CURATED_TV_SHOWS: [&str; 6] = [
    "Fleabag",
    "Arcane",
    "Chernobyl",
    "The Office",
    "Lupin",
    "Breaking Bad",
];

/// Built-in last-resort candidates for a category, in preference order
///
/// Callers filter out the group's favorites before taking what they need.
pub fn static_fallback(category: Category) -> Vec<Candidate> {
    let titles: &[&str] = match category {
        Category::Film => &CURATED_FILMS,
        Category::Book => &CURATED_BOOKS,
        Category::TvShow => &CURATED_TV_SHOWS,
    };

    titles
        .iter()
        .enumerate()
        .map(|(index, title)| {
            Candidate::new(
                CandidateId::Curated(format!("{}-{}", category, index)),
                *title,
            )
        })
        .collect()
}

#[derive(Clone)]
pub struct QlooClient {
    http_client: HttpClient,
    api_key: Option<String>,
    api_url: String,
}

impl QlooClient {
    pub fn new(api_key: Option<String>, api_url: String, timeout: Duration) -> AppResult<Self> {
        warn_if_missing_key(&api_key, PROVIDER);

        Ok(Self {
            http_client: build_http_client(timeout)?,
            api_key,
            api_url,
        })
    }

    fn normalize(entities: Vec<QlooEntity>) -> Vec<TasteGraphEntity> {
        entities
            .into_iter()
            .filter_map(QlooEntity::into_entity)
            .collect()
    }
}

/// Search text sent to Qloo: the title, followed by the year when known
fn search_query(title: &str, year: Option<i32>) -> String {
    match year {
        Some(year) => format!("{} {}", title.trim(), year),
        None => title.trim().to_string(),
    }
}

#[async_trait::async_trait]
impl TasteGraphProvider for QlooClient {
    async fn recommend(
        &self,
        ids: Vec<TasteGraphId>,
        category: Category,
        take: usize,
    ) -> AppResult<Vec<TasteGraphEntity>> {
        let api_key = require_key(&self.api_key, PROVIDER)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let entities = ids
            .iter()
            .map(TasteGraphId::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let take = take.to_string();

        let url = format!("{}/v2/insights", self.api_url);
        let response = self
            .http_client
            .get(&url)
            .header("X-Api-Key", api_key)
            .header("Accept", "application/json")
            .query(&[
                ("signal.interests.entities", entities.as_str()),
                ("filter.type", entity_type(category)),
                ("take", take.as_str()),
            ])
            .send()
            .await?;

        let response = ensure_success(response, PROVIDER).await?;
        let insights: QlooInsightsResponse = read_json(response, PROVIDER).await?;
        let recommendations =
            Self::normalize(insights.results.map(|r| r.entities).unwrap_or_default());

        tracing::info!(
            seeds = ids.len(),
            category = %category,
            results = recommendations.len(),
            provider = "qloo",
            "Taste-graph recommendations fetched"
        );

        Ok(recommendations)
    }

    async fn search(
        &self,
        title: &str,
        year: Option<i32>,
        category: Category,
        limit: usize,
    ) -> AppResult<Vec<TasteGraphEntity>> {
        let api_key = require_key(&self.api_key, PROVIDER)?;
        if title.trim().is_empty() {
            return Ok(Vec::new());
        }

        let query = search_query(title, year);
        let limit = limit.to_string();

        let url = format!("{}/search", self.api_url);
        let response = self
            .http_client
            .get(&url)
            .header("X-Api-Key", api_key)
            .header("Accept", "application/json")
            .query(&[
                ("query", query.as_str()),
                ("types", entity_type(category)),
                ("take", limit.as_str()),
            ])
            .send()
            .await?;

        let response = ensure_success(response, PROVIDER).await?;
        let search: QlooSearchResponse = read_json(response, PROVIDER).await?;
        let entities = Self::normalize(search.results);

        tracing::debug!(
            query = %query,
            category = %category,
            results = entities.len(),
            provider = "qloo",
            "Taste-graph search completed"
        );

        Ok(entities)
    }
}
