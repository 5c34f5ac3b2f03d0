//! TMDb metadata provider for films and TV shows
//!
//! Both collections share the same endpoint layout (`/search/{kind}`,
//! `/{kind}/{id}`, `/{kind}/{id}/recommendations`) and differ only in field
//! names, which `TmdbMovie` / `TmdbTvShow` normalize into `ScreenWork`.

use crate::{
    cached,
    db::{Cache, CacheKey},
    error::AppResult,
    models::providers::{ScreenKind, ScreenWork, TmdbMovie, TmdbPage, TmdbTvShow},
    services::providers::{
        build_http_client, ensure_success, read_json, require_key, warn_if_missing_key,
        ScreenMetadataProvider,
    },
};
use reqwest::{Client as HttpClient, Response};
use std::time::Duration;

const PROVIDER: &str = "TMDb";
const SEARCH_CACHE_TTL: u64 = 3600; // 1 hour
const DETAILS_CACHE_TTL: u64 = 604800; // 1 week

const IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p/w500";

/// Full poster URL for a TMDb poster path
pub fn poster_url(poster_path: Option<&str>) -> Option<String> {
    let path = poster_path.map(str::trim).filter(|path| !path.is_empty())?;
    if path.starts_with("http://") || path.starts_with("https://") {
        return Some(path.to_string());
    }

    if path.starts_with('/') {
        Some(format!("{}{}", IMAGE_BASE_URL, path))
    } else {
        Some(format!("{}/{}", IMAGE_BASE_URL, path))
    }
}

#[derive(Clone)]
pub struct TmdbClient {
    http_client: HttpClient,
    api_key: Option<String>,
    api_url: String,
    cache: Option<Cache>,
}

impl TmdbClient {
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

    async fn get(&self, path: &str, language: &str, params: &[(&str, &str)]) -> AppResult<Response> {
        let api_key = require_key(&self.api_key, PROVIDER)?;

        let url = format!("{}{}", self.api_url, path);
        let response = self
            .http_client
            .get(&url)
            .query(&[("api_key", api_key), ("language", language)])
            .query(params)
            .send()
            .await?;

        ensure_success(response, PROVIDER).await
    }

    /// Reads a paged result list in the shape of the given collection
    async fn read_page(kind: ScreenKind, response: Response) -> AppResult<Vec<ScreenWork>> {
        let works: Vec<ScreenWork> = match kind {
            ScreenKind::Movie => read_json::<TmdbPage<TmdbMovie>>(response, PROVIDER)
                .await?
                .results
                .into_iter()
                .map(ScreenWork::from)
                .collect(),
            ScreenKind::Tv => read_json::<TmdbPage<TmdbTvShow>>(response, PROVIDER)
                .await?
                .results
                .into_iter()
                .map(ScreenWork::from)
                .collect(),
        };
        Ok(works)
    }

    async fn fetch_search(
        &self,
        kind: ScreenKind,
        query: &str,
        language: &str,
    ) -> AppResult<Vec<ScreenWork>> {
        let path = format!("/search/{}", kind.path());
        let response = self
            .get(&path, language, &[("query", query), ("include_adult", "false")])
            .await?;
        let works = Self::read_page(kind, response).await?;

        tracing::info!(
            query = %query,
            kind = kind.path(),
            results = works.len(),
            provider = "tmdb",
            "Metadata search completed"
        );

        Ok(works)
    }

    async fn fetch_details(&self, kind: ScreenKind, id: u64, language: &str) -> AppResult<ScreenWork> {
        let path = format!("/{}/{}", kind.path(), id);
        let response = self.get(&path, language, &[]).await?;

        let work = match kind {
            ScreenKind::Movie => ScreenWork::from(read_json::<TmdbMovie>(response, PROVIDER).await?),
            ScreenKind::Tv => ScreenWork::from(read_json::<TmdbTvShow>(response, PROVIDER).await?),
        };

        tracing::debug!(id, kind = kind.path(), provider = "tmdb", "Fetched details");
        Ok(work)
    }
}

#[async_trait::async_trait]
impl ScreenMetadataProvider for TmdbClient {
    async fn search(
        &self,
        kind: ScreenKind,
        query: &str,
        language: &str,
    ) -> AppResult<Vec<ScreenWork>> {
        require_key(&self.api_key, PROVIDER)?;
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let key = CacheKey::ScreenSearch(kind, query.to_string(), language.to_string());
        cached!(self.cache.as_ref(), key, SEARCH_CACHE_TTL, async move {
            self.fetch_search(kind, query, language).await
        })
    }

    async fn details(&self, kind: ScreenKind, id: u64, language: &str) -> AppResult<ScreenWork> {
        require_key(&self.api_key, PROVIDER)?;

        let key = CacheKey::ScreenDetails(kind, id, language.to_string());
        cached!(self.cache.as_ref(), key, DETAILS_CACHE_TTL, async move {
            self.fetch_details(kind, id, language).await
        })
    }

    async fn recommendations(
        &self,
        kind: ScreenKind,
        id: u64,
        limit: usize,
        language: &str,
    ) -> AppResult<Vec<ScreenWork>> {
        let path = format!("/{}/{}/recommendations", kind.path(), id);
        let response = self.get(&path, language, &[("page", "1")]).await?;

        let mut works = Self::read_page(kind, response).await?;
        works.truncate(limit);

        tracing::info!(
            seed = id,
            kind = kind.path(),
            results = works.len(),
            provider = "tmdb",
            "Similar works fetched"
        );

        Ok(works)
    }
}
