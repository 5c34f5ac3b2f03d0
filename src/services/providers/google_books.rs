//! Google Books metadata provider

use crate::{
    cached,
    db::{Cache, CacheKey},
    error::AppResult,
    models::providers::{BookWork, GoogleBooksResponse},
    services::providers::{
        build_http_client, ensure_success, read_json, require_key, warn_if_missing_key,
        BookMetadataProvider,
    },
};
use reqwest::Client as HttpClient;
use std::time::Duration;

const PROVIDER: &str = "Google Books";
const SEARCH_CACHE_TTL: u64 = 86400; // 1 day

/// The API caps `maxResults` at 40
const MAX_RESULTS: usize = 40;

/// `langRestrict` takes a bare ISO 639-1 code (`fr`, not `fr-FR`)
fn language_restriction(language: &str) -> String {
    language
        .split(['-', '_'])
        .next()
        .unwrap_or(language)
        .trim()
        .to_lowercase()
}

#[derive(Clone)]
pub struct GoogleBooksClient {
    http_client: HttpClient,
    api_key: Option<String>,
    api_url: String,
    cache: Option<Cache>,
}

impl GoogleBooksClient {
    pub fn new(
        api_key: Option<String>,
        api_url: String,
        cache: Option<Cache>,
        timeout: Duration,
    ) -> AppResult<Self> {
        warn_if_missing_key(&api_key, PROVIDER);

        Ok(Self {
            http_client: build_http_client(timeout)?,
            api_key,
            api_url,
            cache,
        })
    }

    async fn fetch_volumes(&self, query: &str, limit: usize, language: &str) -> AppResult<Vec<BookWork>> {
        let api_key = require_key(&self.api_key, PROVIDER)?;

        let max_results = limit.clamp(1, MAX_RESULTS).to_string();
        let lang = language_restriction(language);

        let url = format!("{}/volumes", self.api_url);
        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("q", query),
                ("maxResults", max_results.as_str()),
                ("langRestrict", lang.as_str()),
                ("key", api_key),
            ])
            .send()
            .await?;

        let response = ensure_success(response, PROVIDER).await?;
        let body: GoogleBooksResponse = read_json(response, PROVIDER).await?;
        let books: Vec<BookWork> = body.items.into_iter().map(BookWork::from).collect();

        tracing::info!(
            query = %query,
            results = books.len(),
            provider = "google_books",
            "Book search completed"
        );

        Ok(books)
    }
}

#[async_trait::async_trait]
impl BookMetadataProvider for GoogleBooksClient {
    async fn search(&self, query: &str, limit: usize, language: &str) -> AppResult<Vec<BookWork>> {
        require_key(&self.api_key, PROVIDER)?;
        if query.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let key = CacheKey::BookSearch(query.to_string(), limit, language.to_string());
        cached!(self.cache.as_ref(), key, SEARCH_CACHE_TTL, async move {
            self.fetch_volumes(query, limit, language).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::AppError, services::providers::test_support::spawn_stub};
    use axum::{extract::Query, routing::get, Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    fn client(api_key: Option<&str>, api_url: String) -> GoogleBooksClient {
        GoogleBooksClient::new(
            api_key.map(str::to_string),
            api_url,
            None,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_language_restriction() {
        assert_eq!(language_restriction("fr"), "fr");
        assert_eq!(language_restriction("fr-FR"), "fr");
        assert_eq!(language_restriction("EN_us"), "en");
    }

    #[tokio::test]
    async fn test_missing_key_short_circuits() {
        let client = client(None, "http://127.0.0.1:1".to_string());
        let result = client.search("popular", 5, "en").await;
        assert!(matches!(result, Err(AppError::MissingApiKey("Google Books"))));
    }

    #[tokio::test]
    async fn test_search_volumes() {
        let router = Router::new().route(
            "/volumes",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(params["q"], "intitle:\"Dune\"");
                assert_eq!(params["maxResults"], "1");
                assert_eq!(params["langRestrict"], "fr");
                assert_eq!(params["key"], "secret");

                Json(json!({"items": [
                    {"id": "B1", "volumeInfo": {
                        "title": "Dune",
                        "authors": ["Frank Herbert"],
                        "description": "Arrakis.",
                        "imageLinks": {"thumbnail": "http://books.google.com/cover.jpg"}
                    }}
                ]}))
            }),
        );
        let base_url = spawn_stub(router).await;
        let client = client(Some("secret"), base_url);

        let books = client.search("intitle:\"Dune\"", 1, "fr-FR").await.unwrap();

        assert_eq!(books.len(), 1);
        assert_eq!(books[0].id, "B1");
        assert_eq!(books[0].authors, vec!["Frank Herbert"]);
        assert_eq!(
            books[0].cover_url.as_deref(),
            Some("https://books.google.com/cover.jpg")
        );
    }

    #[tokio::test]
    async fn test_no_items_is_empty() {
        let router = Router::new().route(
            "/volumes",
            get(|| async { Json(json!({"kind": "books#volumes", "totalItems": 0})) }),
        );
        let base_url = spawn_stub(router).await;
        let client = client(Some("secret"), base_url);

        let books = client.search("subject:nothing", 5, "en").await.unwrap();
        assert!(books.is_empty());
    }
}
