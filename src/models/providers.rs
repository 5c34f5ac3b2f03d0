use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Category, TasteGraphId};

// ============================================================================
// Normalized provider shapes
// ============================================================================

/// A work returned by the taste graph
#[derive(Debug, Clone, PartialEq)]
pub struct TasteGraphEntity {
    pub id: Option<TasteGraphId>,
    pub name: String,
    pub tmdb_id: Option<u64>,
    pub genres: Vec<String>,
    pub keywords: Vec<String>,
}

/// TMDb collection a screen work lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScreenKind {
    Movie,
    Tv,
}

impl ScreenKind {
    /// Maps a category onto TMDb; books have no screen counterpart
    pub fn for_category(category: Category) -> Option<Self> {
        match category {
            Category::Film => Some(ScreenKind::Movie),
            Category::TvShow => Some(ScreenKind::Tv),
            Category::Book => None,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            ScreenKind::Movie => "movie",
            ScreenKind::Tv => "tv",
        }
    }
}

/// Film or TV show metadata, whichever TMDb collection it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenWork {
    pub id: u64,
    pub title: String,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    /// `YYYY-MM-DD`, possibly empty for unreleased works
    pub release_date: Option<String>,
}

impl ScreenWork {
    pub fn release_year(&self) -> Option<String> {
        self.release_date
            .as_deref()
            .and_then(|date| date.split('-').next())
            .filter(|year| !year.is_empty())
            .map(str::to_string)
    }
}

/// Book metadata from Google Books
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookWork {
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub categories: Vec<String>,
}

// ============================================================================
// Qloo API Types
// ============================================================================

/// Response of `GET /v2/insights`
#[derive(Debug, Deserialize)]
pub struct QlooInsightsResponse {
    #[serde(default)]
    pub results: Option<QlooInsightsResults>,
}

#[derive(Debug, Deserialize)]
pub struct QlooInsightsResults {
    #[serde(default)]
    pub entities: Vec<QlooEntity>,
}

/// Response of `GET /search`
#[derive(Debug, Deserialize)]
pub struct QlooSearchResponse {
    #[serde(default)]
    pub results: Vec<QlooEntity>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QlooEntity {
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub properties: QlooProperties,
    #[serde(default)]
    pub external: Option<QlooExternal>,
    #[serde(default)]
    pub tags: Vec<QlooTag>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QlooProperties {
    #[serde(default)]
    pub genres: Vec<QlooTag>,
    #[serde(default)]
    pub keywords: Vec<QlooTag>,
    #[serde(default)]
    pub external: Option<QlooExternal>,
}

/// Named tag; the API sometimes sends a bare string instead of an object
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum QlooTag {
    Named {
        name: String,
        #[serde(default, rename = "type")]
        tag_type: Option<String>,
    },
    Bare(String),
}

impl QlooTag {
    pub fn name(&self) -> &str {
        match self {
            QlooTag::Named { name, .. } => name,
            QlooTag::Bare(name) => name,
        }
    }

    fn is_genre(&self) -> bool {
        match self {
            QlooTag::Named {
                tag_type: Some(kind),
                ..
            } => kind.contains(":genre"),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QlooExternal {
    #[serde(default)]
    pub tmdb: Vec<QlooExternalRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QlooExternalRef {
    /// Sent as a number or a numeric string depending on the endpoint
    pub id: Value,
}

impl QlooExternalRef {
    fn as_tmdb_id(&self) -> Option<u64> {
        match &self.id {
            Value::Number(number) => number.as_u64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }
}

impl QlooEntity {
    /// Converts into the normalized shape; nameless entities are dropped
    pub fn into_entity(self) -> Option<TasteGraphEntity> {
        let name = self.name.filter(|name| !name.trim().is_empty())?;

        let external = self.properties.external.as_ref().or(self.external.as_ref());
        let tmdb_id = external
            .and_then(|external| external.tmdb.first())
            .and_then(QlooExternalRef::as_tmdb_id);

        let mut genres: Vec<String> = self
            .properties
            .genres
            .iter()
            .map(|tag| tag.name().to_string())
            .collect();
        genres.extend(
            self.tags
                .iter()
                .filter(|tag| tag.is_genre())
                .map(|tag| tag.name().to_string()),
        );

        let keywords = self
            .properties
            .keywords
            .iter()
            .map(|tag| tag.name().to_string())
            .collect();

        Some(TasteGraphEntity {
            id: self.entity_id.as_deref().and_then(TasteGraphId::parse),
            name,
            tmdb_id,
            genres,
            keywords,
        })
    }
}

// ============================================================================
// TMDb API Types
// ============================================================================

/// Paged result list shared by search and recommendation endpoints
#[derive(Debug, Deserialize)]
pub struct TmdbPage<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbMovie {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbTvShow {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub first_air_date: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

impl From<TmdbMovie> for ScreenWork {
    fn from(movie: TmdbMovie) -> Self {
        ScreenWork {
            id: movie.id,
            title: movie.title,
            overview: non_blank(movie.overview),
            poster_path: non_blank(movie.poster_path),
            release_date: non_blank(movie.release_date),
        }
    }
}

impl From<TmdbTvShow> for ScreenWork {
    fn from(show: TmdbTvShow) -> Self {
        ScreenWork {
            id: show.id,
            title: show.name,
            overview: non_blank(show.overview),
            poster_path: non_blank(show.poster_path),
            release_date: non_blank(show.first_air_date),
        }
    }
}

// ============================================================================
// Google Books API Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct GoogleBooksResponse {
    #[serde(default)]
    pub items: Vec<GoogleBooksVolume>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleBooksVolume {
    pub id: String,
    #[serde(default)]
    pub volume_info: GoogleBooksVolumeInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleBooksVolumeInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_links: Option<GoogleBooksImageLinks>,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct GoogleBooksImageLinks {
    #[serde(default)]
    pub thumbnail: Option<String>,
}

const UNKNOWN_BOOK_TITLE: &str = "Unknown title";

impl From<GoogleBooksVolume> for BookWork {
    fn from(volume: GoogleBooksVolume) -> Self {
        let info = volume.volume_info;
        let cover_url = info
            .image_links
            .and_then(|links| links.thumbnail)
            .map(|url| match url.strip_prefix("http://") {
                Some(rest) => format!("https://{}", rest),
                None => url,
            });

        BookWork {
            id: volume.id,
            title: non_blank(info.title).unwrap_or_else(|| UNKNOWN_BOOK_TITLE.to_string()),
            authors: info.authors,
            description: non_blank(info.description),
            cover_url,
            categories: info.categories,
        }
    }
}

// ============================================================================
// Gemini API Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiPart {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiGenerationConfig {
    pub response_mime_type: String,
}

#[derive(Debug, Deserialize)]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
pub struct GeminiCandidate {
    #[serde(default)]
    pub content: Option<GeminiContent>,
}

impl GeminiResponse {
    /// Text of the first candidate, parts concatenated
    pub fn first_text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content.parts.iter().map(|part| part.text.as_str()).collect();
        let text = text.trim();
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }
}
