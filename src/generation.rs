//! Generation service clients.
//!
//! Defines the [`Generator`] trait and concrete implementations:
//! - **[`DisabledGenerator`]**: fails every call; used for dry runs and
//!   when no provider is configured.
//! - **[`OpenAIGenerator`]**: calls an OpenAI-compatible
//!   `POST {base_url}/chat/completions` endpoint with a single user message.
//!
//! # Retry Strategy
//!
//! [`generate_with_retry`] wraps any generator with exponential backoff:
//! - transport errors, HTTP 429 and 5xx, malformed payloads → retry
//! - other HTTP 4xx, disabled provider → fail immediately
//! - backoff doubles from `base_delay` up to `max_delay`
//! - a cancelled token stops further attempts, including during a backoff wait

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::GenerationConfig;
use crate::error::GenerationError;

#[async_trait]
pub trait Generator: Send + Sync {
    /// Model identifier recorded in the documentation output.
    fn model_name(&self) -> &str;

    /// Send one prompt and return the generated text.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

// ============ Disabled Generator ============

pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        Err(GenerationError::Disabled)
    }
}

// ============ OpenAI Generator ============

/// Chat-completions client. Requires `OPENAI_API_KEY` in the environment.
pub struct OpenAIGenerator {
    model: String,
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = match std::env::var("OPENAI_API_KEY") {
            Ok(key) if !key.is_empty() => key,
            _ => bail!("OPENAI_API_KEY environment variable not set"),
        };

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            client,
        })
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;
        parse_chat_response(&json)
    }
}

/// Extract `choices[0].message.content` from a chat-completions response.
fn parse_chat_response(json: &serde_json::Value) -> Result<String, GenerationError> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| GenerationError::Malformed("missing choices[0].message.content".into()))
}

/// Create the [`Generator`] named by `generation.provider`.
///
/// | Config Value | Generator |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledGenerator`] |
/// | `"openai"` | [`OpenAIGenerator`] |
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        "openai" => Ok(Arc::new(OpenAIGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

// ============ Retry ============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: config.backoff(),
            max_delay: config.backoff() * 32,
        }
    }

    /// Delay before attempt `attempt` (1-based; attempt 1 has none).
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let factor = 1u32 << (attempt - 2).min(16);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Definitive failure after retries, with the number of requests issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryFailure {
    pub error: GenerationError,
    pub attempts: u32,
}

pub async fn generate_with_retry(
    generator: &dyn Generator,
    prompt: &str,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<String, RetryFailure> {
    let mut attempts = 0;

    loop {
        let delay = policy.delay_before(attempts + 1);
        if !delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => {}
            }
        }
        if cancel.is_cancelled() {
            return Err(RetryFailure {
                error: GenerationError::Cancelled,
                attempts,
            });
        }

        attempts += 1;
        match generator.generate(prompt).await {
            Ok(text) => return Ok(text),
            Err(error) if error.is_retryable() && attempts < policy.max_attempts => {
                debug!(attempt = attempts, error = %error, "generation attempt failed, retrying");
            }
            Err(error) => {
                warn!(attempts, error = %error, "generation failed");
                return Err(RetryFailure { error, attempts });
            }
        }
    }
}
