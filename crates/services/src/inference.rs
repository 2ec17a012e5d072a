//! Client for the text-generation endpoint.

use std::env;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::InferenceError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "mistral";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InferenceConfig {
    pub base_url: String,
    pub model: String,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            model: DEFAULT_MODEL.into(),
        }
    }
}

impl InferenceConfig {
    /// Reads `TUTOR_AI_BASE_URL` and `TUTOR_AI_MODEL`, falling back to a local server.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let base_url = env::var("TUTOR_AI_BASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.base_url);
        let model = env::var("TUTOR_AI_MODEL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.model);
        Self { base_url, model }
    }
}

/// Anything that turns a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for `prompt`.
    ///
    /// # Errors
    ///
    /// Returns `InferenceError` if the model cannot be reached or answers with nothing.
    async fn generate(&self, prompt: &str) -> Result<String, InferenceError>;
}

/// HTTP client for a `/api/generate` style endpoint.
#[derive(Clone)]
pub struct InferenceClient {
    client: Client,
    config: InferenceConfig,
}

impl InferenceClient {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(InferenceConfig::from_env())
    }

    #[must_use]
    pub fn new(config: InferenceConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }
}

#[async_trait]
impl TextGenerator for InferenceClient {
    async fn generate(&self, prompt: &str) -> Result<String, InferenceError> {
        let url = format!("{}/api/generate", self.config.base_url.trim_end_matches('/'));
        let payload = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
        };

        debug!(model = %self.config.model, prompt_len = prompt.len(), "sending prompt");
        let response = self.client.post(url).json(&payload).send().await?;

        if !response.status().is_success() {
            return Err(InferenceError::HttpStatus(response.status()));
        }

        let body: GenerateResponse = response.json().await?;
        let text = body
            .response
            .filter(|text| !text.trim().is_empty())
            .ok_or(InferenceError::EmptyResponse)?;

        Ok(text.trim().to_string())
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}
