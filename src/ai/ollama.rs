use super::AiBackend;
use crate::config::AiConfig;
use crate::model::AiError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const SYSTEM_PROMPT: &str = "You are a helpful assistant.";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    format: serde_json::Value,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f64,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ChatResponseMessage>,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Client for an Ollama-compatible `/api/chat` endpoint with structured output.
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(config: &AiConfig) -> Result<Self, AiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    fn answer_schema() -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "matched_tire": { "type": ["string", "null"], "description": "Matched tire model" },
                "similarity_score": { "type": "number" }
            },
            "required": ["matched_tire"]
        })
    }
}

/// Builds the matching prompt. Candidates are quoted verbatim so the model can copy one back.
pub fn build_prompt(query: &str, candidates: &[String]) -> String {
    let list = candidates
        .iter()
        .map(|candidate| format!("\"{}\"", candidate))
        .collect::<Vec<_>>()
        .join(",");

    format!(
        "Pick the tire model from the list below that a person would consider the same \
         product as the target, allowing for small spelling differences, missing hyphens or \
         spaces, trailing numbers and abbreviations. If nothing in the list is a plausible \
         match, answer null.\n\
         \n\
         Rules:\n\
         1. Answer only with a name copied exactly from the list. Never make up a model.\n\
         2. If the best match is weak or uncertain, answer null.\n\
         3. Reply in JSON.\n\
         \n\
         Target tire model: \"{}\"\n\
         \n\
         Available models:\n\
         [{}]\n",
        query, list
    )
}

#[async_trait::async_trait]
impl AiBackend for OllamaClient {
    async fn complete(&self, query: &str, candidates: &[String]) -> Result<String, AiError> {
        let url = format!("{}/api/chat", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: build_prompt(query, candidates),
                },
            ],
            stream: false,
            format: Self::answer_schema(),
            options: ChatOptions { temperature: 0.0 },
        };

        debug!("Asking {} about '{}' ({} candidates)", self.model, query, candidates.len());
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| if e.is_timeout() { AiError::Timeout } else { AiError::Http(e) })?;

        let status = response.status();
        if !status.is_success() {
            warn!("AI backend responded [{}]", status);
            return Err(AiError::Status(status.as_u16()));
        }

        let body: ChatResponse = response.json().await?;
        body.message
            .map(|message| message.content)
            .ok_or(AiError::EmptyResponse)
    }
}
