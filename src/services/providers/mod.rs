//! External data provider abstraction
//!
//! One trait per kind of collaborator the aggregator talks to. Implementations
//! are stateless HTTP wrappers built once at startup and shared as
//! `Arc<dyn Trait>`. They report failures as `AppError` and never retry or
//! substitute data; choosing the next fallback tier is the caller's job.

use crate::{
    error::{AppError, AppResult},
    models::{
        providers::{BookWork, ScreenKind, ScreenWork, TasteGraphEntity},
        Category, ChatTurn, TasteGraphId,
    },
};
use reqwest::{Client as HttpClient, Response};
use std::time::Duration;

pub mod gemini;
pub mod google_books;
pub mod qloo;
pub mod tmdb;

/// Taste-graph recommendations and entity lookup
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TasteGraphProvider: Send + Sync {
    /// Ranked works similar to the given entities, restricted to `category`
    async fn recommend(
        &self,
        ids: Vec<TasteGraphId>,
        category: Category,
        take: usize,
    ) -> AppResult<Vec<TasteGraphEntity>>;

    /// Free-text lookup of entities by title (and release year when known)
    async fn search(
        &self,
        title: &str,
        year: Option<i32>,
        category: Category,
        limit: usize,
    ) -> AppResult<Vec<TasteGraphEntity>>;
}

/// Film and TV show metadata
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ScreenMetadataProvider: Send + Sync {
    async fn search(
        &self,
        kind: ScreenKind,
        query: &str,
        language: &str,
    ) -> AppResult<Vec<ScreenWork>>;

    async fn details(&self, kind: ScreenKind, id: u64, language: &str) -> AppResult<ScreenWork>;

    /// "More like this" for a single work
    async fn recommendations(
        &self,
        kind: ScreenKind,
        id: u64,
        limit: usize,
        language: &str,
    ) -> AppResult<Vec<ScreenWork>>;
}

/// Book metadata
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait BookMetadataProvider: Send + Sync {
    /// Search volumes; `query` accepts provider operators such as `intitle:`
    async fn search(&self, query: &str, limit: usize, language: &str) -> AppResult<Vec<BookWork>>;
}

/// A text generation request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub turns: Vec<ChatTurn>,
    /// Ask the model to answer with a JSON document
    pub json_output: bool,
}

impl GenerationRequest {
    /// Single-prompt request with free-text output
    pub fn prompt(text: impl Into<String>) -> Self {
        Self {
            turns: vec![ChatTurn::user(text)],
            json_output: false,
        }
    }
}

/// Large language model text generation
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> AppResult<String>;
}

/// Logs a provider failure and substitutes an empty result
pub(crate) fn or_degrade<T: Default>(result: AppResult<T>, step: &str) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            if e.is_missing_key() {
                tracing::debug!(step, error = %e, "Provider not configured, skipping");
            } else {
                tracing::warn!(step, error = %e, "Provider call failed, degrading");
            }
            T::default()
        }
    }
}

/// Builds the HTTP client shared by a provider's requests
pub(crate) fn build_http_client(timeout: Duration) -> AppResult<HttpClient> {
    Ok(HttpClient::builder().timeout(timeout).build()?)
}

/// Logs a missing key once, at construction time
pub(crate) fn warn_if_missing_key(api_key: &Option<String>, provider: &'static str) {
    if api_key.as_deref().map_or(true, |key| key.trim().is_empty()) {
        tracing::warn!(
            provider = provider,
            "API key not configured; calls will return no results"
        );
    }
}

pub(crate) fn require_key<'a>(
    api_key: &'a Option<String>,
    provider: &'static str,
) -> AppResult<&'a str> {
    api_key
        .as_deref()
        .filter(|key| !key.trim().is_empty())
        .ok_or(AppError::MissingApiKey(provider))
}

/// Turns a non-2xx response into `ExternalApi`
pub(crate) async fn ensure_success(response: Response, provider: &str) -> AppResult<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(AppError::ExternalApi(format!(
        "{} API returned status {}: {}",
        provider, status, body
    )))
}

/// Deserializes a JSON body, reporting shape mismatches as `ExternalApi`
pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    response: Response,
    provider: &str,
) -> AppResult<T> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| {
        tracing::error!(error = %e, provider = provider, "Failed to deserialize provider response");
        AppError::ExternalApi(format!("Failed to parse {} response: {}", provider, e))
    })
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_key() {
        assert_eq!(require_key(&Some("k".to_string()), "TMDb").unwrap(), "k");
        assert!(matches!(
            require_key(&None, "TMDb"),
            Err(AppError::MissingApiKey("TMDb"))
        ));
        assert!(matches!(
            require_key(&Some("  ".to_string()), "Qloo"),
            Err(AppError::MissingApiKey("Qloo"))
        ));
    }

    #[test]
    fn test_generation_request_prompt() {
        let request = GenerationRequest::prompt("Hello");
        assert_eq!(request.turns, vec![ChatTurn::user("Hello")]);
        assert!(!request.json_output);
    }
}
