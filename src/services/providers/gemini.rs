//! Gemini text generation

use crate::{
    error::{AppError, AppResult},
    models::{
        providers::{GeminiContent, GeminiGenerationConfig, GeminiPart, GeminiRequest, GeminiResponse},
        ChatRole, ChatTurn,
    },
    services::providers::{
        build_http_client, ensure_success, read_json, require_key, warn_if_missing_key,
        GenerationRequest, TextGenerator,
    },
};
use reqwest::Client as HttpClient;
use std::time::Duration;

const PROVIDER: &str = "Gemini";
const JSON_MIME_TYPE: &str = "application/json";

#[derive(Clone)]
pub struct GeminiClient {
    http_client: HttpClient,
    api_key: Option<String>,
    api_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(
        api_key: Option<String>,
        api_url: String,
        model: String,
        timeout: Duration,
    ) -> AppResult<Self> {
        warn_if_missing_key(&api_key, PROVIDER);

        Ok(Self {
            http_client: build_http_client(timeout)?,
            api_key,
            api_url,
            model,
        })
    }
}

fn to_content(turn: &ChatTurn) -> GeminiContent {
    let role = match turn.role {
        ChatRole::User => "user",
        ChatRole::Model => "model",
    };

    GeminiContent {
        role: Some(role.to_string()),
        parts: vec![GeminiPart {
            text: turn.text.clone(),
        }],
    }
}

impl From<&GenerationRequest> for GeminiRequest {
    fn from(request: &GenerationRequest) -> Self {
        GeminiRequest {
            contents: request.turns.iter().map(to_content).collect(),
            generation_config: request.json_output.then(|| GeminiGenerationConfig {
                response_mime_type: JSON_MIME_TYPE.to_string(),
            }),
        }
    }
}

#[async_trait::async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, request: GenerationRequest) -> AppResult<String> {
        let api_key = require_key(&self.api_key, PROVIDER)?;
        if request.turns.is_empty() {
            return Err(AppError::InvalidInput(
                "Generation request has no content".to_string(),
            ));
        }

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_url, self.model
        );
        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&GeminiRequest::from(&request))
            .send()
            .await?;

        let response = ensure_success(response, PROVIDER).await?;
        let body: GeminiResponse = read_json(response, PROVIDER).await?;

        let text = body.first_text().ok_or_else(|| {
            AppError::ExternalApi("Gemini returned no candidate text".to_string())
        })?;

        tracing::debug!(
            model = %self.model,
            turns = request.turns.len(),
            json_output = request.json_output,
            chars = text.len(),
            "Text generated"
        );

        Ok(text)
    }
}
