use axum::{extract::State, Json};
use serde::Deserialize;

use crate::{
    error::AppResult,
    middleware::RequestId,
    models::{Category, ChatTurn},
    services::{ChatReply, Interpretation},
};

use super::{default_language, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpretRequest {
    pub input: String,
    pub category: Category,
    #[serde(default)]
    pub participant_names: Vec<String>,
    #[serde(default = "default_language")]
    pub language: String,
    /// Earlier turns of the conversation, oldest first
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

/// Interprets the latest message of a preference conversation
pub async fn interpret(
    State(state): State<AppState>,
    request_id: RequestId,
    Json(request): Json<InterpretRequest>,
) -> AppResult<Json<Interpretation>> {
    tracing::debug!(
        request_id = %request_id,
        category = %request.category,
        turns = request.history.len(),
        "Interpreting user input"
    );

    let interpretation = state
        .assistant
        .interpret(
            &request.input,
            request.category,
            &request.participant_names,
            &request.language,
            &request.history,
        )
        .await?;

    Ok(Json(interpretation))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(alias = "conversationHistory")]
    pub history: Vec<ChatTurn>,
    #[serde(default = "default_language", alias = "userLanguage")]
    pub language: String,
}

/// Kurius' answer to the last message of a conversation
pub async fn chat(
    State(state): State<AppState>,
    request_id: RequestId,
    Json(request): Json<ChatRequest>,
) -> AppResult<Json<ChatReply>> {
    tracing::debug!(
        request_id = %request_id,
        turns = request.history.len(),
        language = %request.language,
        "Chatting with Kurius"
    );

    let reply = state.chat.chat(&request.history, &request.language).await?;
    Ok(Json(reply))
}
