//! Recommendation aggregation
//!
//! Turns a group's favorites into a short list of enriched recommendations:
//!
//! 1. Taste graph: one `recommend` call seeded with every participant's ids
//! 2. Fallback tier: metadata-provider searches (see [`fallback`])
//! 3. Static list when both came back empty
//!
//! Each selected candidate is then enriched concurrently with display
//! metadata and a generated explanation. Provider failures degrade to the
//! next tier and never fail the whole call.

use futures::future::join_all;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::{
    collections::HashSet,
    sync::{Arc, Mutex, PoisonError},
};
use uuid::Uuid;

use crate::{
    db::RecommendationStore,
    error::{AppError, AppResult},
    models::{
        providers::{ScreenKind, TasteGraphEntity},
        Candidate, CandidateId, Category, EnrichedRecommendation, Locale, ParticipantPreferences,
        TasteGraphId,
    },
    services::providers::{
        or_degrade, qloo::static_fallback, tmdb::poster_url, BookMetadataProvider,
        GenerationRequest, ScreenMetadataProvider, TasteGraphProvider, TextGenerator,
    },
};

pub mod fallback;
pub mod prompts;

#[derive(Debug, Clone, Copy)]
pub struct RecommendationSettings {
    /// Target length of the returned list
    pub count: usize,
    /// Candidates requested from the taste graph before filtering
    pub candidate_pool: usize,
}

impl Default for RecommendationSettings {
    fn default() -> Self {
        Self {
            count: 3,
            candidate_pool: 10,
        }
    }
}

/// Case-insensitive title key used for deduplication
fn title_key(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Favorite ids and titles that must not be recommended back, plus the
/// titles already selected
struct Exclusions {
    favorite_ids: HashSet<String>,
    seeds: HashSet<TasteGraphId>,
    titles: HashSet<String>,
}

impl Exclusions {
    fn new(participants: &[ParticipantPreferences], category: Category) -> Self {
        let favorites = move || participants.iter().flat_map(move |p| p.favorites(category));

        Self {
            favorite_ids: favorites().map(|work| work.id.trim().to_string()).collect(),
            seeds: favorites().filter_map(|work| work.taste_graph_id()).collect(),
            titles: favorites().map(|work| title_key(&work.title)).collect(),
        }
    }

    fn is_excluded(&self, candidate: &Candidate) -> bool {
        let excluded_id = match &candidate.id {
            CandidateId::TasteGraph(id) => self.seeds.contains(id),
            CandidateId::Metadata(id) => self.favorite_ids.contains(id),
            CandidateId::Curated(_) | CandidateId::Unresolved => false,
        };

        excluded_id || self.titles.contains(&title_key(&candidate.title))
    }

    /// Drops excluded candidates and repeated titles, keeping order
    fn filter(&self, candidates: Vec<Candidate>) -> Vec<Candidate> {
        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .filter(|candidate| {
                !self.is_excluded(candidate) && seen.insert(title_key(&candidate.title))
            })
            .collect()
    }

    fn reserve(&mut self, candidates: &[Candidate]) {
        self.titles
            .extend(candidates.iter().map(|candidate| title_key(&candidate.title)));
    }
}

impl From<TasteGraphEntity> for Candidate {
    fn from(entity: TasteGraphEntity) -> Self {
        Candidate {
            id: entity
                .id
                .map(CandidateId::TasteGraph)
                .unwrap_or(CandidateId::Unresolved),
            title: entity.name,
            tmdb_id: entity.tmdb_id,
        }
    }
}

/// Display metadata resolved for a candidate
struct ResolvedMetadata {
    id: String,
    description: Option<String>,
    poster_url: Option<String>,
    release_year: Option<String>,
}

/// Everything enrichment needs about the request
struct EnrichmentContext<'a> {
    participants: &'a [ParticipantPreferences],
    names: Vec<String>,
    category: Category,
    language: &'a str,
    locale: Locale,
}

pub struct RecommendationService {
    taste_graph: Arc<dyn TasteGraphProvider>,
    screens: Arc<dyn ScreenMetadataProvider>,
    books: Arc<dyn BookMetadataProvider>,
    text: Arc<dyn TextGenerator>,
    settings: RecommendationSettings,
    rng: Mutex<StdRng>,
}

impl RecommendationService {
    pub fn new(
        taste_graph: Arc<dyn TasteGraphProvider>,
        screens: Arc<dyn ScreenMetadataProvider>,
        books: Arc<dyn BookMetadataProvider>,
        text: Arc<dyn TextGenerator>,
        settings: RecommendationSettings,
    ) -> Self {
        Self {
            taste_graph,
            screens,
            books,
            text,
            settings,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Replaces the random source, e.g. with a seeded one
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    /// Runs `f` with the random source; never hold the guard across an await
    fn with_rng_locked<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut rng)
    }

    fn sample<T>(&self, mut items: Vec<T>, count: usize) -> Vec<T> {
        self.with_rng_locked(|rng| items.shuffle(rng));
        items.truncate(count);
        items
    }

    /// Up to `count` enriched recommendations for the group
    ///
    /// Never fails: every provider error degrades to the next tier, and the
    /// list may be shorter than the target but never contains the same title
    /// twice.
    pub async fn generate_recommendations(
        &self,
        participants: &[ParticipantPreferences],
        category: Category,
        language: &str,
    ) -> Vec<EnrichedRecommendation> {
        let target = self.settings.count;
        let mut exclusions = Exclusions::new(participants, category);

        let mut selected = self
            .taste_graph_candidates(participants, category, &mut exclusions)
            .await;

        if selected.len() < target {
            let plan = self.with_rng_locked(|rng| fallback::plan(participants, category, rng));
            let found = fallback::run(
                &plan,
                category,
                language,
                self.screens.as_ref(),
                self.books.as_ref(),
            )
            .await;

            let additional = self.sample(exclusions.filter(found), target - selected.len());
            tracing::info!(
                category = %category,
                plan = ?plan,
                added = additional.len(),
                "Fallback tier completed"
            );
            exclusions.reserve(&additional);
            selected.extend(additional);
        }

        if selected.is_empty() {
            tracing::info!(category = %category, "No provider candidates, using static list");
            selected = exclusions
                .filter(static_fallback(category))
                .into_iter()
                .take(target)
                .collect();
        }

        let context = EnrichmentContext {
            participants,
            names: participants.iter().map(|p| p.name.clone()).collect(),
            category,
            language,
            locale: Locale::from_language(language),
        };

        let enriched: Vec<EnrichedRecommendation> = join_all(
            selected
                .iter()
                .map(|candidate| self.enrich(candidate, &context)),
        )
        .await
        .into_iter()
        .flatten()
        .collect();

        tracing::info!(
            category = %category,
            participants = participants.len(),
            count = enriched.len(),
            "Recommendations generated"
        );

        enriched
    }

    /// Generates recommendations and stores them for an event
    ///
    /// Store failures are returned, unlike provider failures.
    pub async fn generate_and_store_recommendations(
        &self,
        event_id: Uuid,
        participants: &[ParticipantPreferences],
        category: Category,
        language: &str,
        store: &dyn RecommendationStore,
    ) -> AppResult<Vec<EnrichedRecommendation>> {
        let recommendations = self
            .generate_recommendations(participants, category, language)
            .await;

        store
            .store_recommendations_for_event(event_id, &recommendations)
            .await?;

        Ok(recommendations)
    }

    /// Taste-graph identifiers of the favorites in `category`, first-seen order
    fn collect_seeds(participants: &[ParticipantPreferences], category: Category) -> Vec<TasteGraphId> {
        let mut seeds: Vec<TasteGraphId> = Vec::new();
        for id in participants
            .iter()
            .flat_map(|p| p.favorites(category))
            .filter_map(|work| work.taste_graph_id())
        {
            if !seeds.contains(&id) {
                seeds.push(id);
            }
        }
        seeds
    }

    async fn taste_graph_candidates(
        &self,
        participants: &[ParticipantPreferences],
        category: Category,
        exclusions: &mut Exclusions,
    ) -> Vec<Candidate> {
        let seeds = Self::collect_seeds(participants, category);
        if seeds.is_empty() {
            tracing::info!(category = %category, "No taste-graph ids, skipping taste graph");
            return Vec::new();
        }

        let seed_count = seeds.len();
        let entities = or_degrade(
            self.taste_graph
                .recommend(seeds, category, self.settings.candidate_pool)
                .await,
            "taste graph",
        );

        let candidates = exclusions.filter(entities.into_iter().map(Candidate::from).collect());
        let selected = self.sample(candidates, self.settings.count);
        exclusions.reserve(&selected);

        tracing::info!(
            category = %category,
            seeds = seed_count,
            selected = selected.len(),
            "Taste-graph tier completed"
        );

        selected
    }

    async fn enrich(
        &self,
        candidate: &Candidate,
        context: &EnrichmentContext<'_>,
    ) -> Option<EnrichedRecommendation> {
        let metadata = self.resolve_metadata(candidate, context).await;

        let id = match (&metadata, &candidate.id) {
            (Some(metadata), _) => metadata.id.clone(),
            (None, CandidateId::TasteGraph(id)) => id.to_string(),
            (None, CandidateId::Metadata(id) | CandidateId::Curated(id)) => id.clone(),
            (None, CandidateId::Unresolved) => {
                tracing::debug!(title = %candidate.title, "Dropping unresolved candidate");
                return None;
            }
        };

        let explanation = self.explain(&candidate.title, context).await;
        let (description, poster_url, release_year) = match metadata {
            Some(metadata) => (
                metadata.description,
                metadata.poster_url,
                metadata.release_year,
            ),
            None => (None, None, None),
        };

        Some(EnrichedRecommendation {
            id,
            title: candidate.title.clone(),
            category: context.category,
            description: description
                .unwrap_or_else(|| prompts::generic_description(context.locale).to_string()),
            poster_url,
            explanation,
            release_year,
        })
    }

    async fn resolve_metadata(
        &self,
        candidate: &Candidate,
        context: &EnrichmentContext<'_>,
    ) -> Option<ResolvedMetadata> {
        let language = context.language;

        match ScreenKind::for_category(context.category) {
            Some(kind) => {
                let work = match candidate.tmdb_id {
                    Some(tmdb_id) => or_degrade(
                        self.screens
                            .details(kind, tmdb_id, language)
                            .await
                            .map(Some),
                        "metadata details",
                    ),
                    None => or_degrade(
                        self.screens.search(kind, &candidate.title, language).await,
                        "metadata search",
                    )
                    .into_iter()
                    .next(),
                }?;

                Some(ResolvedMetadata {
                    id: work.id.to_string(),
                    release_year: work.release_year(),
                    poster_url: poster_url(work.poster_path.as_deref()),
                    description: work.overview,
                })
            }
            None => {
                let query = format!("intitle:\"{}\"", candidate.title);
                let book = or_degrade(
                    self.books.search(&query, 1, language).await,
                    "book search",
                )
                .into_iter()
                .next()?;

                Some(ResolvedMetadata {
                    id: book.id,
                    description: book.description,
                    poster_url: book.cover_url,
                    release_year: None,
                })
            }
        }
    }

    async fn explain(&self, title: &str, context: &EnrichmentContext<'_>) -> String {
        let prompt =
            prompts::explanation_prompt(title, context.category, context.participants, context.locale);

        match self.text.generate(GenerationRequest::prompt(prompt)).await {
            Ok(text) => text,
            Err(e) => {
                log_explanation_failure(title, &e);
                prompts::fallback_explanation(&context.names, context.locale)
            }
        }
    }
}

fn log_explanation_failure(title: &str, error: &AppError) {
    if error.is_missing_key() {
        tracing::debug!(title, "Text generation not configured, using fallback explanation");
    } else {
        tracing::warn!(title, error = %error, "Explanation generation failed, using fallback");
    }
}
