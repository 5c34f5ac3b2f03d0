use serde::Deserialize;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// PostgreSQL connection URL; without it history lives in memory
    #[serde(default)]
    pub database_url: Option<String>,

    /// Redis connection URL; without it metadata lookups are not cached
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Qloo taste-graph API key
    #[serde(default)]
    pub qloo_api_key: Option<String>,

    #[serde(default = "default_qloo_api_url")]
    pub qloo_api_url: String,

    /// TMDb API key (films and TV shows)
    #[serde(default)]
    pub tmdb_api_key: Option<String>,

    #[serde(default = "default_tmdb_api_url")]
    pub tmdb_api_url: String,

    /// Google Books API key
    #[serde(default)]
    pub google_books_api_key: Option<String>,

    #[serde(default = "default_google_books_api_url")]
    pub google_books_api_url: String,

    /// Gemini text generation API key
    #[serde(default)]
    pub gemini_api_key: Option<String>,

    #[serde(default = "default_gemini_api_url")]
    pub gemini_api_url: String,

    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    /// Number of recommendations returned per aggregation
    #[serde(default = "default_recommendation_count")]
    pub recommendation_count: usize,

    /// Number of candidates requested from the taste graph before sampling
    #[serde(default = "default_candidate_pool_size")]
    pub candidate_pool_size: usize,

    /// Timeout applied to every outbound HTTP request
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_qloo_api_url() -> String {
    "https://hackathon.api.qloo.com".to_string()
}

fn default_tmdb_api_url() -> String {
    "https://api.themoviedb.org/3".to_string()
}

fn default_google_books_api_url() -> String {
    "https://www.googleapis.com/books/v1".to_string()
}

fn default_gemini_api_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_gemini_model() -> String {
    "gemini-1.5-flash-latest".to_string()
}

fn default_recommendation_count() -> usize {
    3
}

fn default_candidate_pool_size() -> usize {
    10
}

fn default_http_timeout_secs() -> u64 {
    15
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
