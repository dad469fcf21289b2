use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    config::GenerationConfig,
    prompts::{self, FallbackReason},
};

const MAX_NEW_TOKENS: u32 = 120;
const TEMPERATURE: f32 = 0.7;

#[derive(Debug, Serialize)]
struct GenerationRequest {
    inputs: String,
    parameters: GenerationParameters,
}

#[derive(Debug, Serialize)]
struct GenerationParameters {
    max_new_tokens: u32,
    temperature: f32,
    do_sample: bool,
}

#[derive(Debug, thiserror::Error)]
enum GenerationError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream returned {0}")]
    Status(reqwest::StatusCode),
    #[error("unexpected response: {0}")]
    Unexpected(String),
}

impl GenerationError {
    fn fallback_reason(&self) -> FallbackReason {
        match self {
            GenerationError::Transport(_) | GenerationError::Status(_) => {
                FallbackReason::Unavailable
            }
            GenerationError::Unexpected(_) => FallbackReason::Unexpected,
        }
    }
}

/// Client for the hosted text-generation API.
#[derive(Clone)]
pub struct ReplyGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl ReplyGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/models/{}", config.api_base, config.model),
            api_key: config.api_key.clone(),
        })
    }

    /// Produces a Jarvis-style reply. Never fails: upstream problems degrade
    /// to a rule-based or canned reply.
    pub async fn generate_reply(&self, text: &str) -> String {
        match self.request_completion(text).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(%err, "generation failed, using fallback reply");
                prompts::fallback_reply(text, err.fallback_reason())
            }
        }
    }

    async fn request_completion(&self, text: &str) -> Result<String, GenerationError> {
        let payload = GenerationRequest {
            inputs: prompts::build_prompt(text),
            parameters: GenerationParameters {
                max_new_tokens: MAX_NEW_TOKENS,
                temperature: TEMPERATURE,
                do_sample: true,
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenerationError::Status(status));
        }

        let raw = response.text().await?;
        let data: Value = serde_json::from_str(&raw)
            .map_err(|err| GenerationError::Unexpected(format!("invalid json: {err}")))?;

        let generated = data
            .as_array()
            .and_then(|outputs| outputs.first())
            .and_then(|first| first.get("generated_text"))
            .and_then(Value::as_str)
            .ok_or_else(|| GenerationError::Unexpected(truncate(&raw, 200)))?;

        let reply = prompts::extract_reply(generated)
            .ok_or_else(|| GenerationError::Unexpected("empty generated_text".into()))?;

        debug!(chars = reply.len(), "generation succeeded");
        Ok(reply)
    }
}

fn truncate(raw: &str, max: usize) -> String {
    raw.chars().take(max).collect()
}
