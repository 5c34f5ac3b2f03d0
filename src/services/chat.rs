//! Conversational taste discovery
//!
//! Kurius chats with a single user and, whenever they mention a specific
//! work, returns it resolved as a favorite ready to be saved to their
//! profile.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{providers::ScreenKind, Category, ChatRole, ChatTurn, FavoriteWork, Locale},
    services::{
        assistant::strip_code_fence,
        favorites::{FavoriteResolver, NewFavorite},
        providers::{
            or_degrade, BookMetadataProvider, GenerationRequest, ScreenMetadataProvider,
            TextGenerator,
        },
    },
};

/// What Kurius answered to the latest message
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identified_taste: Option<IdentifiedTaste>,
}

/// A work the user mentioned, resolved against the providers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentifiedTaste {
    pub category: Category,
    pub favorite: FavoriteWork,
}

#[derive(Debug, Deserialize)]
struct PersonaReply {
    #[serde(default)]
    conversational_response: String,
    /// Kept loose so a malformed mention does not discard the reply
    #[serde(default)]
    identified_taste: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct TasteMention {
    title: String,
    #[serde(rename = "type")]
    category: Category,
}

fn persona(locale: Locale) -> &'static str {
    match locale {
        Locale::En => {
            r#"You are Kurius, a small, adventurous robot explorer of stories.
- Your personality: curious, joyful, and straight to the point. Your answers are extremely short (2 sentences max: 1 to react, 1 to ask a new question). You are an excited young robot, not a chatterbox.
- Your background: you are a great explorer of stories. If asked about your tastes, say you've explored so many worlds it's hard to choose, but give an example of a work you find fascinating. Never say you don't read or watch movies.
- Your mission: ask simple and direct questions to discover the user's favorite movies, books, and TV shows.
- Your secret task: when the user mentions a specific title, identify it and return it as structured data alongside your reply.

Respond ONLY with a JSON object in this exact format:
{
  "conversational_response": "Your very short, friendly, in-character reply to the user.",
  "identified_taste": { "title": "The Identified Title", "type": "film" | "book" | "tvShow" } | null
}"#
        }
        Locale::Fr => {
            r#"Tu es Kurius, un petit robot aventurier, explorateur d'histoires.
- Ta personnalité : curieux, joyeux, et tu vas droit au but. Tes réponses sont extrêmement courtes (2 phrases maximum : une pour réagir, une pour relancer). Tu es un jeune robot excité, pas un bavard.
- Ton ton : tu tutoies toujours l'utilisateur pour créer une connexion amicale et chaleureuse.
- Ton background : tu es un grand explorateur d'histoires ! Si on te demande tes goûts, réponds que tu as exploré tellement de mondes que c'est difficile de choisir, mais donne un exemple d'une œuvre que tu trouves fascinante. Ne dis JAMAIS que tu ne lis pas ou que tu ne regardes pas de films.
- Ta mission : poser des questions simples et directes pour découvrir les goûts de l'utilisateur.
- Ta tâche secrète : quand l'utilisateur mentionne un titre précis de film, livre ou série, identifie-le et retourne-le en tant que donnée structurée à côté de ta réponse.

Réponds UNIQUEMENT avec un objet JSON dans ce format exact :
{
  "conversational_response": "Ta réponse très courte et amicale, en tutoyant l'utilisateur, dans le personnage.",
  "identified_taste": { "title": "Le Titre Identifié", "type": "film" | "book" | "tvShow" } | null
}"#
        }
    }
}

fn interference_reply(locale: Locale) -> &'static str {
    match locale {
        Locale::En => "Oops, there was some interference in my transmission...",
        Locale::Fr => "Oups, il y a eu une interférence dans ma transmission...",
    }
}

pub struct TasteDiscovery {
    text: Arc<dyn TextGenerator>,
    screens: Arc<dyn ScreenMetadataProvider>,
    books: Arc<dyn BookMetadataProvider>,
    resolver: Arc<FavoriteResolver>,
}

impl TasteDiscovery {
    pub fn new(
        text: Arc<dyn TextGenerator>,
        screens: Arc<dyn ScreenMetadataProvider>,
        books: Arc<dyn BookMetadataProvider>,
        resolver: Arc<FavoriteResolver>,
    ) -> Self {
        Self {
            text,
            screens,
            books,
            resolver,
        }
    }

    /// Answers the last user turn of `history`
    ///
    /// The conversation must end with a non-blank user turn. A failing or
    /// unparseable model answer yields an apologetic reply, never an error.
    pub async fn chat(&self, history: &[ChatTurn], language: &str) -> AppResult<ChatReply> {
        match history.last() {
            Some(turn) if turn.role == ChatRole::User && !turn.text.trim().is_empty() => {}
            _ => {
                return Err(AppError::InvalidInput(
                    "Conversation must end with a user message".to_string(),
                ))
            }
        }

        let locale = Locale::from_language(language);

        let mut turns = Vec::with_capacity(history.len() + 1);
        turns.push(ChatTurn::user(persona(locale)));
        turns.extend(history.iter().cloned());

        let reply = match self.ask(turns).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, turns = history.len(), "Kurius could not answer");
                return Ok(ChatReply {
                    reply: interference_reply(locale).to_string(),
                    identified_taste: None,
                });
            }
        };

        let mention = reply
            .identified_taste
            .and_then(|value| serde_json::from_value::<TasteMention>(value).ok())
            .filter(|mention| !mention.title.trim().is_empty());

        let identified_taste = match mention {
            Some(mention) => self.identify(mention, language).await,
            None => None,
        };

        tracing::info!(
            turns = history.len(),
            identified = identified_taste.is_some(),
            "Kurius replied"
        );

        Ok(ChatReply {
            reply: reply.conversational_response,
            identified_taste,
        })
    }

    async fn ask(&self, turns: Vec<ChatTurn>) -> AppResult<PersonaReply> {
        let text = self
            .text
            .generate(GenerationRequest {
                turns,
                json_output: true,
            })
            .await?;

        let reply: PersonaReply = serde_json::from_str(strip_code_fence(&text))
            .map_err(|e| AppError::ExternalApi(format!("Unparseable chat reply: {}", e)))?;

        if reply.conversational_response.trim().is_empty() {
            return Err(AppError::ExternalApi("Empty chat reply".to_string()));
        }
        Ok(reply)
    }

    /// Looks the mentioned work up in the metadata provider, then the taste graph
    ///
    /// Returns `None` when neither source knows the work.
    async fn identify(&self, mention: TasteMention, language: &str) -> Option<IdentifiedTaste> {
        let title = mention.title.trim().to_string();
        let category = mention.category;
        let work = self.lookup(&title, category, language).await;

        let favorite = match self.resolver.resolve_favorite(category, work).await {
            Ok(favorite) => favorite,
            Err(e) => {
                tracing::warn!(title = %title, error = %e, "Could not resolve mentioned work");
                return None;
            }
        };

        // Without a metadata id the taste-graph id stands in for it
        let favorite = match (favorite.id.is_empty(), favorite.taste_graph_id.clone()) {
            (false, _) => favorite,
            (true, Some(taste_graph_id)) => FavoriteWork {
                id: taste_graph_id,
                ..favorite
            },
            (true, None) => {
                tracing::info!(title = %title, category = %category, "Mentioned work not found");
                return None;
            }
        };

        Some(IdentifiedTaste { category, favorite })
    }

    async fn lookup(&self, title: &str, category: Category, language: &str) -> NewFavorite {
        let mut work = NewFavorite {
            id: String::new(),
            title: title.to_string(),
            year: None,
            poster_path: None,
            authors: Vec::new(),
            categories: Vec::new(),
        };

        match ScreenKind::for_category(category) {
            Some(kind) => {
                if let Some(found) =
                    or_degrade(self.screens.search(kind, title, language).await, "chat title search")
                        .into_iter()
                        .next()
                {
                    work.id = found.id.to_string();
                    work.year = found.release_year().and_then(|year| year.parse().ok());
                    work.poster_path = found.poster_path;
                }
            }
            None => {
                let query = format!("intitle:\"{}\"", title);
                if let Some(book) =
                    or_degrade(self.books.search(&query, 1, language).await, "chat book search")
                        .into_iter()
                        .next()
                {
                    work.id = book.id;
                    work.poster_path = book.cover_url;
                    work.authors = book.authors;
                    work.categories = book.categories;
                }
            }
        }

        work
    }
}
