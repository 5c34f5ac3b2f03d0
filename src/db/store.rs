//! Persistence for recommendation sets and group history
//!
//! The PostgreSQL store writes recommendation sets through the
//! `store_recommendations_for_event` SQL function so the schema behind it can
//! evolve independently. The in-memory store backs local runs without a
//! database.

use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgPool, Row};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Category, EnrichedRecommendation, HistoryEvent},
};

#[async_trait::async_trait]
pub trait RecommendationStore: Send + Sync {
    /// Replaces the recommendation set stored for an event
    async fn store_recommendations_for_event(
        &self,
        event_id: Uuid,
        recommendations: &[EnrichedRecommendation],
    ) -> AppResult<()>;

    /// Stored recommendation set for an event, in display order
    ///
    /// Returns `NotFound` when nothing was stored for the event. A stored
    /// empty set is returned as an empty list.
    async fn event_recommendations(&self, event_id: Uuid) -> AppResult<Vec<EnrichedRecommendation>>;

    async fn add_history_event(&self, event: &HistoryEvent) -> AppResult<()>;

    /// History, newest first
    async fn history(&self) -> AppResult<Vec<HistoryEvent>>;

    async fn clear_history(&self) -> AppResult<()>;

    /// Store name for logging
    fn name(&self) -> &'static str;
}

// ============================================================================
// PostgreSQL
// ============================================================================

pub struct PgRecommendationStore {
    pool: PgPool,
}

impl PgRecommendationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse_category(value: &str) -> AppResult<Category> {
    value.parse().map_err(AppError::Internal)
}

#[async_trait::async_trait]
impl RecommendationStore for PgRecommendationStore {
    async fn store_recommendations_for_event(
        &self,
        event_id: Uuid,
        recommendations: &[EnrichedRecommendation],
    ) -> AppResult<()> {
        sqlx::query("SELECT store_recommendations_for_event($1, $2)")
            .bind(event_id)
            .bind(Json(recommendations))
            .execute(&self.pool)
            .await?;

        tracing::info!(
            event_id = %event_id,
            count = recommendations.len(),
            "Stored event recommendations"
        );

        Ok(())
    }

    async fn event_recommendations(&self, event_id: Uuid) -> AppResult<Vec<EnrichedRecommendation>> {
        let (stored,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM recommendation_sets WHERE event_id = $1)")
                .bind(event_id)
                .fetch_one(&self.pool)
                .await?;

        if !stored {
            return Err(AppError::NotFound(format!(
                "No recommendations stored for event {}",
                event_id
            )));
        }

        let rows = sqlx::query(
            r#"
            SELECT external_id, title, category, description, poster_url, explanation, release_year
            FROM event_recommendations
            WHERE event_id = $1
            ORDER BY position
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> AppResult<EnrichedRecommendation> {
                let category: String = row.try_get("category")?;
                Ok(EnrichedRecommendation {
                    id: row.try_get("external_id")?,
                    title: row.try_get("title")?,
                    category: parse_category(&category)?,
                    description: row.try_get("description")?,
                    poster_url: row.try_get("poster_url")?,
                    explanation: row.try_get("explanation")?,
                    release_year: row.try_get("release_year")?,
                })
            })
            .collect()
    }

    async fn add_history_event(&self, event: &HistoryEvent) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO history_events (id, occurred_at, category, participants, chosen_item)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(event.id)
        .bind(event.date)
        .bind(event.category.as_str())
        .bind(&event.participants)
        .bind(Json(&event.chosen_item))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn history(&self) -> AppResult<Vec<HistoryEvent>> {
        let rows: Vec<(
            Uuid,
            DateTime<Utc>,
            String,
            Vec<String>,
            Json<EnrichedRecommendation>,
        )> = sqlx::query_as(
            r#"
            SELECT id, occurred_at, category, participants, chosen_item
            FROM history_events
            ORDER BY occurred_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, date, category, participants, chosen_item)| -> AppResult<HistoryEvent> {
                Ok(HistoryEvent {
                    id,
                    date,
                    category: parse_category(&category)?,
                    participants,
                    chosen_item: chosen_item.0,
                })
            })
            .collect()
    }

    async fn clear_history(&self) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM history_events")
            .execute(&self.pool)
            .await?;

        tracing::info!(removed = result.rows_affected(), "History cleared");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// Process-local store; contents are lost on restart
#[derive(Default)]
pub struct InMemoryStore {
    events: RwLock<HashMap<Uuid, Vec<EnrichedRecommendation>>>,
    history: RwLock<Vec<HistoryEvent>>,
}

#[async_trait::async_trait]
impl RecommendationStore for InMemoryStore {
    async fn store_recommendations_for_event(
        &self,
        event_id: Uuid,
        recommendations: &[EnrichedRecommendation],
    ) -> AppResult<()> {
        self.events
            .write()
            .await
            .insert(event_id, recommendations.to_vec());
        Ok(())
    }

    async fn event_recommendations(&self, event_id: Uuid) -> AppResult<Vec<EnrichedRecommendation>> {
        self.events
            .read()
            .await
            .get(&event_id)
            .cloned()
            .ok_or_else(|| {
                AppError::NotFound(format!("No recommendations stored for event {}", event_id))
            })
    }

    async fn add_history_event(&self, event: &HistoryEvent) -> AppResult<()> {
        self.history.write().await.push(event.clone());
        Ok(())
    }

    async fn history(&self) -> AppResult<Vec<HistoryEvent>> {
        let mut events = self.history.read().await.clone();
        events.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(events)
    }

    async fn clear_history(&self) -> AppResult<()> {
        self.history.write().await.clear();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn recommendation(title: &str) -> EnrichedRecommendation {
        EnrichedRecommendation {
            id: format!("id-{}", title),
            title: title.to_string(),
            category: Category::Book,
            description: "A classic.".to_string(),
            poster_url: None,
            explanation: "Everyone will love it.".to_string(),
            release_year: None,
        }
    }

    #[tokio::test]
    async fn test_event_recommendations_roundtrip() {
        let store = InMemoryStore::default();
        let event_id = Uuid::new_v4();
        let stored = vec![recommendation("1984"), recommendation("Dune")];

        store
            .store_recommendations_for_event(event_id, &stored)
            .await
            .unwrap();

        assert_eq!(store.event_recommendations(event_id).await.unwrap(), stored);
    }

    #[tokio::test]
    async fn test_storing_again_replaces_the_set() {
        let store = InMemoryStore::default();
        let event_id = Uuid::new_v4();

        store
            .store_recommendations_for_event(event_id, &[recommendation("1984")])
            .await
            .unwrap();
        store
            .store_recommendations_for_event(event_id, &[recommendation("Dune")])
            .await
            .unwrap();

        let stored = store.event_recommendations(event_id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].title, "Dune");
    }

    #[tokio::test]
    async fn test_stored_empty_set_is_not_missing() {
        let store = InMemoryStore::default();
        let event_id = Uuid::new_v4();

        store
            .store_recommendations_for_event(event_id, &[])
            .await
            .unwrap();

        assert_eq!(store.event_recommendations(event_id).await.unwrap(), Vec::new());
    }

    #[tokio::test]
    async fn test_unknown_event_is_not_found() {
        let store = InMemoryStore::default();
        let result = store.event_recommendations(Uuid::new_v4()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_history_is_newest_first_and_clearable() {
        let store = InMemoryStore::default();

        let mut older = HistoryEvent::record(
            Category::Book,
            vec!["Alice".to_string()],
            recommendation("1984"),
        );
        older.date = older.date - Duration::days(2);
        let newer = HistoryEvent::record(
            Category::Book,
            vec!["Alice".to_string(), "Bob".to_string()],
            recommendation("Dune"),
        );

        store.add_history_event(&older).await.unwrap();
        store.add_history_event(&newer).await.unwrap();

        let history = store.history().await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].chosen_item.title, "Dune");
        assert_eq!(history[1].chosen_item.title, "1984");

        tokio_test::assert_ok!(store.clear_history().await);
        assert!(store.history().await.unwrap().is_empty());
    }
}
