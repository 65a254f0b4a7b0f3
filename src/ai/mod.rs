// AI module: last-resort model matching through a language model.

pub mod fallback;
pub mod ollama;

pub use fallback::{AiFallback, AiVerdict};
pub use ollama::OllamaClient;

use crate::model::AiError;
use serde::Deserialize;
use tracing::debug;

/// A chat backend that picks one name out of a candidate list.
/// Returns the raw message body; validation happens in [`parse_answer`].
#[async_trait::async_trait]
pub trait AiBackend: Send + Sync {
    async fn complete(&self, query: &str, candidates: &[String]) -> Result<String, AiError>;
}

/// Accepted answer shapes: `{matched_tire, similarity_score?}` or `{name, score}`.
/// The name field must be present, even if null.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
enum AiAnswer {
    Matched {
        #[serde(deserialize_with = "Option::deserialize")]
        matched_tire: Option<String>,
        #[serde(default)]
        similarity_score: Option<f64>,
    },
    Scored {
        #[serde(deserialize_with = "Option::deserialize")]
        name: Option<String>,
        score: f64,
    },
}

/// Validates a raw answer and returns the suggested name, if any.
pub fn parse_answer(body: &str) -> Result<Option<String>, AiError> {
    let answer: AiAnswer =
        serde_json::from_str(body.trim()).map_err(|e| AiError::Schema(e.to_string()))?;
    let (name, score) = match answer {
        AiAnswer::Matched {
            matched_tire,
            similarity_score,
        } => (matched_tire, similarity_score),
        AiAnswer::Scored { name, score } => (name, Some(score)),
    };
    debug!("AI answer {:?} (score {:?})", name, score);
    Ok(name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty()))
}
