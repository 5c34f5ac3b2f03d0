//! Conversational preference assistant
//!
//! Turns a free-text answer ("something like Dune but funnier") into
//! keywords and taste-graph ids, asking a follow-up question when the answer
//! is too vague to act on.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{lenient_year, Category, ChatTurn, Locale, TasteGraphId},
    services::{
        providers::{or_degrade, GenerationRequest, TasteGraphProvider, TextGenerator},
        recommendations::prompts::category_label,
    },
};

/// Entities requested per search term; only the first is used
const SEARCH_LIMIT: usize = 2;

/// What the assistant understood from the latest input
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interpretation {
    pub extracted_keywords: Vec<String>,
    pub taste_graph_ids: Vec<TasteGraphId>,
    pub clarification_needed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_question: Option<String>,
}

/// JSON document the model is instructed to answer with
#[derive(Debug, Deserialize)]
struct ModelReply {
    #[serde(default)]
    extracted_keywords: Vec<String>,
    #[serde(default, alias = "qloo_search_terms")]
    search_terms: Vec<SearchTerm>,
    #[serde(default)]
    clarification_needed: bool,
    #[serde(default)]
    next_question: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchTerm {
    query: String,
    #[serde(default, deserialize_with = "lenient_year")]
    year: Option<i32>,
}

fn default_question(locale: Locale) -> &'static str {
    match locale {
        Locale::En => "Could you tell me more about that?",
        Locale::Fr => "Pourriez-vous m'en dire plus ?",
    }
}

fn trouble_question(locale: Locale) -> &'static str {
    match locale {
        Locale::En => {
            "I'm having a little trouble understanding. Shall we proceed with what I have, or would you like to start over?"
        }
        Locale::Fr => {
            "J'ai eu un peu de mal à comprendre. Voulez-vous continuer avec ce que j'ai, ou préféreriez-vous recommencer ?"
        }
    }
}

fn instructions(category: Category, participant_names: &[String], locale: Locale) -> String {
    let label = category_label(category, locale);
    let names = participant_names.join(", ");

    match locale {
        Locale::En => format!(
            r#"You are Kurius, a cultural assistant. The user is refining a recommendation for a {label} for a group including: {names}.
Based on the conversation so far:
1. Extract 3-5 keywords or specific titles (movies, books, TV shows) from the latest user input that reflect their preferences for a {label}. Be very precise.
2. For each extracted title, guess the original release year when applicable.
3. Decide whether the input clearly indicates a specific kind of {label} (e.g. "dark thriller", "light comedy") or whether more clarification is needed.
4. If clarification is needed, write a single, precise follow-up question in next_question.
5. Respond in JSON only, with no other text.

Expected JSON format:
{{
  "extracted_keywords": ["keyword1", "title of a work"],
  "search_terms": [{{"query": "title of a work", "year": "YYYY"}}, {{"query": "another title"}}],
  "clarification_needed": false,
  "next_question": "required when clarification_needed is true"
}}"#
        ),
        Locale::Fr => format!(
            r#"Tu es Kurius, un assistant culturel. L'utilisateur affine une recommandation de {label} pour un groupe incluant : {names}.
En te basant sur la conversation jusqu'ici :
1. Extrais 3 à 5 mots-clés ou titres précis (films, livres, séries) de la dernière saisie de l'utilisateur qui reflètent ses préférences pour un(e) {label}. Sois très précis.
2. Pour chaque titre extrait, devine l'année de sortie originale si applicable.
3. Détermine si la saisie indique clairement un type précis de {label} (ex : "thriller sombre", "comédie légère") ou si une clarification est nécessaire.
4. Si une clarification est nécessaire, formule une seule question de suivi précise dans next_question.
5. Réponds uniquement en JSON, sans aucun autre texte.

Format JSON attendu :
{{
  "extracted_keywords": ["mot-clé1", "titre d'une œuvre"],
  "search_terms": [{{"query": "titre d'une œuvre", "year": "AAAA"}}, {{"query": "un autre titre"}}],
  "clarification_needed": false,
  "next_question": "obligatoire si clarification_needed est true"
}}"#
        ),
    }
}

/// Strips the Markdown code fence models sometimes wrap JSON in
pub(crate) fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|inner| inner.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

pub struct PreferenceAssistant {
    text: Arc<dyn TextGenerator>,
    taste_graph: Arc<dyn TasteGraphProvider>,
}

impl PreferenceAssistant {
    pub fn new(text: Arc<dyn TextGenerator>, taste_graph: Arc<dyn TasteGraphProvider>) -> Self {
        Self { text, taste_graph }
    }

    /// Interprets the latest input of a conversation
    ///
    /// Only a blank input is an error. When the model fails or answers with
    /// something unparseable, an empty interpretation carrying an apologetic
    /// question is returned instead.
    pub async fn interpret(
        &self,
        input: &str,
        category: Category,
        participant_names: &[String],
        language: &str,
        history: &[ChatTurn],
    ) -> AppResult<Interpretation> {
        let input = input.trim();
        if input.is_empty() {
            return Err(AppError::InvalidInput("Input must not be empty".to_string()));
        }

        let locale = Locale::from_language(language);

        let mut turns = Vec::with_capacity(history.len() + 2);
        turns.push(ChatTurn::user(instructions(category, participant_names, locale)));
        turns.extend(history.iter().cloned());
        turns.push(ChatTurn::user(format!("Latest user input: \"{}\"", input)));

        let reply = match self.ask(turns).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, category = %category, "Could not interpret user input");
                return Ok(Interpretation {
                    next_question: Some(trouble_question(locale).to_string()),
                    ..Interpretation::default()
                });
            }
        };

        let taste_graph_ids = self.resolve_terms(&reply.search_terms, category).await;

        let next_question = match reply.next_question.filter(|q| !q.trim().is_empty()) {
            None if reply.clarification_needed => Some(default_question(locale).to_string()),
            question => question,
        };

        tracing::info!(
            category = %category,
            keywords = reply.extracted_keywords.len(),
            terms = reply.search_terms.len(),
            resolved = taste_graph_ids.len(),
            clarification_needed = reply.clarification_needed,
            "User input interpreted"
        );

        Ok(Interpretation {
            extracted_keywords: reply.extracted_keywords,
            taste_graph_ids,
            clarification_needed: reply.clarification_needed,
            next_question,
        })
    }

    async fn ask(&self, turns: Vec<ChatTurn>) -> AppResult<ModelReply> {
        let text = self
            .text
            .generate(GenerationRequest {
                turns,
                json_output: true,
            })
            .await?;

        serde_json::from_str(strip_code_fence(&text))
            .map_err(|e| AppError::ExternalApi(format!("Unparseable assistant reply: {}", e)))
    }

    /// First taste-graph id per search term, deduplicated
    async fn resolve_terms(&self, terms: &[SearchTerm], category: Category) -> Vec<TasteGraphId> {
        let lookups = terms
            .iter()
            .filter(|term| !term.query.trim().is_empty())
            .map(|term| async move {
                or_degrade(
                    self.taste_graph
                        .search(&term.query, term.year, category, SEARCH_LIMIT)
                        .await,
                    "assistant term lookup",
                )
                .into_iter()
                .next()
                .and_then(|entity| entity.id)
            });

        let mut ids: Vec<TasteGraphId> = Vec::new();
        for id in join_all(lookups).await.into_iter().flatten() {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{providers::TasteGraphEntity, ChatRole};
    use crate::services::providers::{MockTasteGraphProvider, MockTextGenerator};

    fn entity(id: &str) -> TasteGraphEntity {
        TasteGraphEntity {
            id: TasteGraphId::parse(id),
            name: id.to_string(),
            tmdb_id: None,
            genres: Vec::new(),
            keywords: Vec::new(),
        }
    }

    fn names() -> Vec<String> {
        vec!["Alice".to_string(), "Bob".to_string()]
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  {} "), "{}");
    }

    #[tokio::test]
    async fn test_interpret_resolves_search_terms() {
        let mut text = MockTextGenerator::new();
        text.expect_generate()
            .withf(|request| {
                request.json_output
                    && request.turns.len() == 4
                    && request.turns[0].text.contains("Alice, Bob")
                    && request.turns.iter().map(|turn| turn.role).collect::<Vec<_>>()
                        == vec![ChatRole::User, ChatRole::User, ChatRole::Model, ChatRole::User]
                    && request.turns[1].text == "Hi"
                    && request.turns[3].text == "Latest user input: \"Like Dune, but funnier\""
            })
            .times(1)
            .returning(|_| {
                Ok(r#"```json
                {
                    "extracted_keywords": ["science fiction", "comedy", "Dune"],
                    "qloo_search_terms": [{"query": "Dune", "year": "2021"}, {"query": "Galaxy Quest", "year": 1999}],
                    "clarification_needed": false
                }
                ```"#
                    .to_string())
            });

        let mut taste_graph = MockTasteGraphProvider::new();
        taste_graph
            .expect_search()
            .withf(|query, year, category, limit| {
                *category == Category::Film
                    && *limit == 2
                    && ((query == "Dune" && *year == Some(2021))
                        || (query == "Galaxy Quest" && *year == Some(1999)))
            })
            .times(2)
            .returning(|query, _, _, _| match query {
                "Dune" => Ok(vec![entity("urn:entity:movie:D"), entity("D2")]),
                _ => Ok(vec![entity("G")]),
            });

        let assistant = PreferenceAssistant::new(Arc::new(text), Arc::new(taste_graph));
        let history = vec![
            ChatTurn::user("Hi"),
            ChatTurn {
                role: ChatRole::Model,
                text: "What do you feel like?".to_string(),
            },
        ];

        let interpretation = assistant
            .interpret("Like Dune, but funnier", Category::Film, &names(), "en", &history)
            .await
            .unwrap();

        assert_eq!(
            interpretation.extracted_keywords,
            vec!["science fiction", "comedy", "Dune"]
        );
        assert_eq!(
            interpretation
                .taste_graph_ids
                .iter()
                .map(TasteGraphId::as_str)
                .collect::<Vec<_>>(),
            vec!["D", "G"]
        );
        assert!(!interpretation.clarification_needed);
        assert_eq!(interpretation.next_question, None);
    }

    #[tokio::test]
    async fn test_clarification_gets_default_question() {
        let mut text = MockTextGenerator::new();
        text.expect_generate().returning(|_| {
            Ok(r#"{"extracted_keywords": [], "search_terms": [], "clarification_needed": true}"#
                .to_string())
        });
        let mut taste_graph = MockTasteGraphProvider::new();
        taste_graph.expect_search().never();

        let assistant = PreferenceAssistant::new(Arc::new(text), Arc::new(taste_graph));
        let interpretation = assistant
            .interpret("je sais pas", Category::Book, &names(), "fr", &[])
            .await
            .unwrap();

        assert!(interpretation.clarification_needed);
        assert_eq!(
            interpretation.next_question.as_deref(),
            Some("Pourriez-vous m'en dire plus ?")
        );
    }

    #[tokio::test]
    async fn test_generator_failure_returns_trouble_question() {
        let mut text = MockTextGenerator::new();
        text.expect_generate()
            .returning(|_| Err(AppError::MissingApiKey("Gemini")));
        let taste_graph = MockTasteGraphProvider::new();

        let assistant = PreferenceAssistant::new(Arc::new(text), Arc::new(taste_graph));
        let interpretation = assistant
            .interpret("Something cozy", Category::TvShow, &names(), "en", &[])
            .await
            .unwrap();

        assert!(interpretation.extracted_keywords.is_empty());
        assert!(interpretation.taste_graph_ids.is_empty());
        assert!(!interpretation.clarification_needed);
        assert!(interpretation
            .next_question
            .unwrap()
            .starts_with("I'm having a little trouble understanding."));
    }

    #[tokio::test]
    async fn test_unparseable_reply_returns_trouble_question() {
        let mut text = MockTextGenerator::new();
        text.expect_generate()
            .returning(|_| Ok("Sure! Here are some ideas.".to_string()));
        let taste_graph = MockTasteGraphProvider::new();

        let assistant = PreferenceAssistant::new(Arc::new(text), Arc::new(taste_graph));
        let interpretation = assistant
            .interpret("Something cozy", Category::TvShow, &names(), "fr", &[])
            .await
            .unwrap();

        assert!(interpretation
            .next_question
            .unwrap()
            .starts_with("J'ai eu un peu de mal à comprendre."));
    }

    #[tokio::test]
    async fn test_blank_input_is_rejected() {
        let mut text = MockTextGenerator::new();
        text.expect_generate().never();
        let assistant =
            PreferenceAssistant::new(Arc::new(text), Arc::new(MockTasteGraphProvider::new()));

        let result = assistant
            .interpret("  ", Category::Film, &names(), "en", &[])
            .await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }
}
