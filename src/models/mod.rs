use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::{fmt::Display, str::FromStr};
use uuid::Uuid;

pub mod providers;

// ============================================================================
// Categories and identifiers
// ============================================================================

/// Kind of cultural work a group is choosing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Film,
    Book,
    TvShow,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Film => "film",
            Category::Book => "book",
            Category::TvShow => "tvShow",
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "film" => Ok(Category::Film),
            "book" => Ok(Category::Book),
            "tvShow" => Ok(Category::TvShow),
            other => Err(format!("Unknown category: {}", other)),
        }
    }
}

/// Identifier of an entity in the taste graph
///
/// Always held in raw form. Clients sometimes store ids with the provider's
/// `urn:entity:<type>:` namespace prepended; `parse` strips it so both forms
/// compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TasteGraphId(String);

const TASTE_GRAPH_NAMESPACE: &str = "urn:entity:";

impl TasteGraphId {
    /// Normalizes a raw or namespaced identifier. Blank values yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        let raw = match trimmed.strip_prefix(TASTE_GRAPH_NAMESPACE) {
            // urn:entity:<type>:<id>
            Some(rest) => rest.split_once(':').map(|(_, id)| id).unwrap_or(""),
            None => trimmed,
        };

        let raw = raw.trim();
        if raw.is_empty() {
            None
        } else {
            Some(Self(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TasteGraphId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Accepts provider ids sent either as JSON numbers (TMDb) or strings (Google Books)
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(u64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Number(number) => number.to_string(),
    })
}

/// Accepts a release year as a number or a numeric string; anything else
/// (including an empty string) reads as unknown
pub(crate) fn lenient_year<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawYear {
        Number(i32),
        Text(String),
    }

    Ok(match Option::<RawYear>::deserialize(deserializer)? {
        Some(RawYear::Number(year)) => Some(year),
        Some(RawYear::Text(text)) => text.trim().parse().ok(),
        None => None,
    })
}

// ============================================================================
// Participant preferences
// ============================================================================

/// Tags attached to a favorite when it was resolved against the taste graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteMetadata {
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// A work a participant has marked as a favorite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteWork {
    /// Metadata provider id (TMDb id for films/TV, volume id for books)
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub title: String,
    #[serde(default, alias = "coverUrl")]
    pub poster_path: Option<String>,
    /// Missing when the taste-graph lookup failed at favorite time
    #[serde(default, alias = "externalTasteGraphId")]
    pub taste_graph_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<FavoriteMetadata>,
}

impl FavoriteWork {
    pub fn taste_graph_id(&self) -> Option<TasteGraphId> {
        self.taste_graph_id.as_deref().and_then(TasteGraphId::parse)
    }
}

/// Snapshot of one participant's tastes, passed into a single aggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantPreferences {
    pub name: String,
    #[serde(default)]
    pub films: Vec<FavoriteWork>,
    #[serde(default)]
    pub books: Vec<FavoriteWork>,
    #[serde(default)]
    pub tv_shows: Vec<FavoriteWork>,
}

impl ParticipantPreferences {
    pub fn favorites(&self, category: Category) -> &[FavoriteWork] {
        match category {
            Category::Film => &self.films,
            Category::Book => &self.books,
            Category::TvShow => &self.tv_shows,
        }
    }
}

// ============================================================================
// Candidates and recommendations
// ============================================================================

/// Where a candidate's identity comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateId {
    TasteGraph(TasteGraphId),
    /// Id issued by the category's metadata provider
    Metadata(String),
    /// Entry of the built-in list
    Curated(String),
    /// The provider returned the work without an identifier
    Unresolved,
}

/// A work proposed by the aggregator before enrichment
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: CandidateId,
    pub title: String,
    /// TMDb id cross-referenced by the taste graph
    pub tmdb_id: Option<u64>,
}

impl Candidate {
    pub fn new(id: CandidateId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            tmdb_id: None,
        }
    }
}

/// A recommendation ready to be shown on the vote screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedRecommendation {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub category: Category,
    pub description: String,
    pub poster_url: Option<String>,
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_year: Option<String>,
}

// ============================================================================
// Conversation
// ============================================================================

/// Language user-facing text is written in
///
/// French when the requested language starts with `fr`, English otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locale {
    En,
    Fr,
}

impl Locale {
    pub fn from_language(language: &str) -> Self {
        if language.trim().to_lowercase().starts_with("fr") {
            Locale::Fr
        } else {
            Locale::En
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

/// One turn of the conversation with the assistant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }
}

// ============================================================================
// History
// ============================================================================

/// A past group decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEvent {
    pub id: Uuid,
    pub date: DateTime<Utc>,
    pub category: Category,
    pub participants: Vec<String>,
    pub chosen_item: EnrichedRecommendation,
}

impl HistoryEvent {
    /// Stamps a new history entry with a fresh id and the current time
    pub fn record(
        category: Category,
        participants: Vec<String>,
        chosen_item: EnrichedRecommendation,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            date: Utc::now(),
            category,
            participants,
            chosen_item,
        }
    }
}
