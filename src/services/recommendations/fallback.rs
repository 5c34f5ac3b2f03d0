//! Fallback tier: metadata-provider searches used when the taste graph did
//! not produce enough candidates.
//!
//! Planning is synchronous and consumes randomness; execution only awaits.

use futures::future::join_all;
use rand::{seq::SliceRandom, Rng};

use crate::models::{
    providers::{BookWork, ScreenKind, ScreenWork},
    Candidate, CandidateId, Category, ParticipantPreferences,
};
use crate::services::providers::{or_degrade, BookMetadataProvider, ScreenMetadataProvider};

/// Maximum number of tag searches issued concurrently
const MAX_TAG_SEARCHES: usize = 3;
const POPULAR_QUERY: &str = "popular";
const SIMILAR_LIMIT: usize = 10;
const BOOK_SEARCH_LIMIT: usize = 10;
/// Author placeholders written by book clients when the volume has none
const UNKNOWN_AUTHORS: [&str; 2] = ["Auteur inconnu", "Unknown author"];

#[derive(Debug, Clone, PartialEq)]
pub enum FallbackPlan {
    /// One search per tag
    Tags(Vec<String>),
    /// TMDb "more like this" for one favorite
    SimilarTo(ScreenKind, u64),
    /// Books by one favorite author
    ByAuthor(String),
    Popular,
}

/// Genres and keywords of the favorites in `category`, plus subject
/// categories for books; trimmed and deduplicated in first-seen order
pub fn collect_tags(participants: &[ParticipantPreferences], category: Category) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();

    for work in participants.iter().flat_map(|p| p.favorites(category)) {
        let metadata = work.metadata.iter().flat_map(|m| m.genres.iter().chain(&m.keywords));
        let subjects = work
            .categories
            .iter()
            .filter(|_| category == Category::Book);

        for tag in metadata.chain(subjects) {
            let tag = tag.trim();
            if !tag.is_empty() && !tags.iter().any(|existing| existing == tag) {
                tags.push(tag.to_string());
            }
        }
    }

    tags
}

/// Picks the fallback strategy for a category
pub fn plan<R: Rng + ?Sized>(
    participants: &[ParticipantPreferences],
    category: Category,
    rng: &mut R,
) -> FallbackPlan {
    let tags = collect_tags(participants, category);
    if !tags.is_empty() {
        let picked = tags
            .choose_multiple(rng, MAX_TAG_SEARCHES)
            .cloned()
            .collect();
        return FallbackPlan::Tags(picked);
    }

    let favorites: Vec<_> = participants
        .iter()
        .flat_map(|p| p.favorites(category))
        .collect();

    match ScreenKind::for_category(category) {
        Some(kind) => {
            let ids: Vec<u64> = favorites
                .iter()
                .filter_map(|work| work.id.trim().parse().ok())
                .collect();

            ids.choose(rng)
                .map(|id| FallbackPlan::SimilarTo(kind, *id))
                .unwrap_or(FallbackPlan::Popular)
        }
        None => {
            let authors: Vec<&str> = favorites
                .iter()
                .flat_map(|work| work.authors.iter())
                .map(|author| author.trim())
                .filter(|author| {
                    !author.is_empty()
                        && !UNKNOWN_AUTHORS
                            .iter()
                            .any(|unknown| unknown.eq_ignore_ascii_case(author))
                })
                .collect();

            authors
                .choose(rng)
                .map(|author| FallbackPlan::ByAuthor(author.to_string()))
                .unwrap_or(FallbackPlan::Popular)
        }
    }
}

fn screen_candidate(work: ScreenWork) -> Candidate {
    Candidate {
        id: CandidateId::Metadata(work.id.to_string()),
        title: work.title,
        tmdb_id: Some(work.id),
    }
}

fn book_candidate(book: BookWork) -> Candidate {
    Candidate::new(CandidateId::Metadata(book.id), book.title)
}

/// Runs the metadata providers the plan calls for
///
/// Provider errors are logged and contribute no candidates.
pub async fn run(
    plan: &FallbackPlan,
    category: Category,
    language: &str,
    screens: &dyn ScreenMetadataProvider,
    books: &dyn BookMetadataProvider,
) -> Vec<Candidate> {
    match plan {
        FallbackPlan::Tags(tags) => {
            let searches = tags
                .iter()
                .map(|tag| search(tag, category, language, screens, books));
            join_all(searches).await.into_iter().flatten().collect()
        }
        FallbackPlan::SimilarTo(kind, id) => {
            let works = or_degrade(
                screens.recommendations(*kind, *id, SIMILAR_LIMIT, language).await,
                "similar works",
            );
            works.into_iter().map(screen_candidate).collect()
        }
        FallbackPlan::ByAuthor(author) => {
            let query = format!("inauthor:\"{}\"", author);
            let found = or_degrade(
                books.search(&query, BOOK_SEARCH_LIMIT, language).await,
                "author search",
            );
            found.into_iter().map(book_candidate).collect()
        }
        FallbackPlan::Popular => search(POPULAR_QUERY, category, language, screens, books).await,
    }
}

/// Free-text search against the category's metadata provider
async fn search(
    query: &str,
    category: Category,
    language: &str,
    screens: &dyn ScreenMetadataProvider,
    books: &dyn BookMetadataProvider,
) -> Vec<Candidate> {
    match ScreenKind::for_category(category) {
        Some(kind) => or_degrade(screens.search(kind, query, language).await, "metadata search")
            .into_iter()
            .map(screen_candidate)
            .collect(),
        None => or_degrade(
            books.search(query, BOOK_SEARCH_LIMIT, language).await,
            "book search",
        )
        .into_iter()
        .map(book_candidate)
        .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{FavoriteMetadata, FavoriteWork};
    use crate::services::providers::{MockBookMetadataProvider, MockScreenMetadataProvider};
    use rand::{rngs::StdRng, SeedableRng};

    fn favorite(id: &str, title: &str) -> FavoriteWork {
        FavoriteWork {
            id: id.to_string(),
            title: title.to_string(),
            poster_path: None,
            taste_graph_id: None,
            authors: Vec::new(),
            categories: Vec::new(),
            metadata: None,
        }
    }

    fn participant(name: &str) -> ParticipantPreferences {
        ParticipantPreferences {
            name: name.to_string(),
            films: Vec::new(),
            books: Vec::new(),
            tv_shows: Vec::new(),
        }
    }

    fn screen_work(id: u64, title: &str) -> ScreenWork {
        ScreenWork {
            id,
            title: title.to_string(),
            overview: None,
            poster_path: None,
            release_date: None,
        }
    }

    #[test]
    fn test_collect_tags_dedups_in_order() {
        let mut alice = participant("Alice");
        let mut dune = favorite("1", "Dune");
        dune.metadata = Some(FavoriteMetadata {
            genres: vec!["Science Fiction".to_string(), " ".to_string()],
            keywords: vec!["desert".to_string()],
        });
        dune.categories = vec!["Fiction".to_string()];
        alice.films = vec![dune.clone()];
        alice.books = vec![dune];

        let mut bob = participant("Bob");
        let mut arrival = favorite("2", "Arrival");
        arrival.metadata = Some(FavoriteMetadata {
            genres: vec!["Science Fiction".to_string(), "Drama".to_string()],
            keywords: Vec::new(),
        });
        bob.films = vec![arrival];

        let participants = vec![alice, bob];
        assert_eq!(
            collect_tags(&participants, Category::Film),
            vec!["Science Fiction", "desert", "Drama"]
        );
        // Books also contribute their subject categories
        assert_eq!(
            collect_tags(&participants, Category::Book),
            vec!["Science Fiction", "desert", "Fiction"]
        );
        assert!(collect_tags(&participants, Category::TvShow).is_empty());
    }

    #[test]
    fn test_plan_picks_at_most_three_distinct_tags() {
        let mut alice = participant("Alice");
        let mut work = favorite("1", "Dune");
        work.metadata = Some(FavoriteMetadata {
            genres: vec!["a", "b", "c", "d", "e"].into_iter().map(String::from).collect(),
            keywords: Vec::new(),
        });
        alice.tv_shows = vec![work];

        let mut rng = StdRng::seed_from_u64(7);
        match plan(&[alice], Category::TvShow, &mut rng) {
            FallbackPlan::Tags(tags) => {
                assert_eq!(tags.len(), 3);
                let mut unique = tags.clone();
                unique.sort();
                unique.dedup();
                assert_eq!(unique.len(), 3);
            }
            other => panic!("expected tag plan, got {:?}", other),
        }
    }

    #[test]
    fn test_plan_without_tags() {
        let mut rng = StdRng::seed_from_u64(1);

        let mut alice = participant("Alice");
        alice.films = vec![favorite("438631", "Dune")];
        assert_eq!(
            plan(&[alice.clone()], Category::Film, &mut rng),
            FallbackPlan::SimilarTo(ScreenKind::Movie, 438631)
        );

        let mut book = favorite("B1", "Dune");
        book.authors = vec!["Frank Herbert".to_string()];
        alice.books = vec![book];
        assert_eq!(
            plan(&[alice.clone()], Category::Book, &mut rng),
            FallbackPlan::ByAuthor("Frank Herbert".to_string())
        );

        // No favorites at all, or books without authors
        assert_eq!(plan(&[alice.clone()], Category::TvShow, &mut rng), FallbackPlan::Popular);
        alice.books = vec![favorite("B2", "Anonymous")];
        assert_eq!(plan(&[alice], Category::Book, &mut rng), FallbackPlan::Popular);
        assert_eq!(plan(&[], Category::Book, &mut rng), FallbackPlan::Popular);
    }

    #[test]
    fn test_plan_seeds_only_from_usable_favorites() {
        let mut alice = participant("Alice");
        alice.tv_shows = vec![
            favorite("not-a-tmdb-id", "Fleabag"),
            favorite(" 1396 ", "Breaking Bad"),
            favorite("", "Untitled"),
        ];
        let mut book = favorite("B1", "Le Petit Prince");
        book.authors = vec!["Auteur inconnu".to_string(), "  ".to_string()];
        let mut other = favorite("B2", "Vendredi");
        other.authors = vec!["Michel Tournier".to_string()];
        alice.books = vec![book, other];

        for seed in 0..16 {
            let mut rng = StdRng::seed_from_u64(seed);
            assert_eq!(
                plan(&[alice.clone()], Category::TvShow, &mut rng),
                FallbackPlan::SimilarTo(ScreenKind::Tv, 1396)
            );
            assert_eq!(
                plan(&[alice.clone()], Category::Book, &mut rng),
                FallbackPlan::ByAuthor("Michel Tournier".to_string())
            );
        }

        let mut unknown = favorite("B3", "Anonyme");
        unknown.authors = vec!["Auteur inconnu".to_string()];
        alice.books = vec![unknown];
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(plan(&[alice], Category::Book, &mut rng), FallbackPlan::Popular);
    }

    #[tokio::test]
    async fn test_run_tag_searches_skip_failures() {
        let mut screens = MockScreenMetadataProvider::new();
        screens
            .expect_search()
            .times(2)
            .returning(|_, query, _| match query {
                "Drama" => Ok(vec![screen_work(1, "Aftersun")]),
                _ => Err(AppError::ExternalApi("TMDb API returned status 500".to_string())),
            });
        let books = MockBookMetadataProvider::new();

        let plan = FallbackPlan::Tags(vec!["Drama".to_string(), "Horror".to_string()]);
        let candidates = run(&plan, Category::Film, "en", &screens, &books).await;

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].title, "Aftersun");
        assert_eq!(candidates[0].id, CandidateId::Metadata("1".to_string()));
        assert_eq!(candidates[0].tmdb_id, Some(1));
    }

    #[tokio::test]
    async fn test_run_author_search() {
        let screens = MockScreenMetadataProvider::new();
        let mut books = MockBookMetadataProvider::new();
        books
            .expect_search()
            .withf(|query, limit, language| {
                query == "inauthor:\"Ursula K. Le Guin\"" && *limit == 10 && language == "fr"
            })
            .times(1)
            .returning(|_, _, _| {
                Ok(vec![BookWork {
                    id: "ED1".to_string(),
                    title: "Earthsea".to_string(),
                    authors: vec!["Ursula K. Le Guin".to_string()],
                    description: None,
                    cover_url: None,
                    categories: Vec::new(),
                }])
            });

        let plan = FallbackPlan::ByAuthor("Ursula K. Le Guin".to_string());
        let candidates = run(&plan, Category::Book, "fr", &screens, &books).await;

        assert_eq!(candidates, vec![Candidate::new(CandidateId::Metadata("ED1".to_string()), "Earthsea")]);
    }
}
