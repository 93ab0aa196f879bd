//! Gemini generation provider using the `generateContent` REST endpoint.
//!
//! This module is only available when the `gemini` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::{RagError, Result};
use crate::generation::GenerationProvider;

const PROVIDER: &str = "Gemini";

/// The default Generative Language API root.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// The default generation model.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Connection settings for the Gemini API.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// Sent as the `x-goog-api-key` header.
    pub api_key: String,
    /// Model name without the `models/` prefix.
    pub model: String,
    /// API root, without a trailing slash.
    pub base_url: String,
}

impl GeminiConfig {
    /// Create a config for `gemini-2.0-flash`.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Read `GEMINI_API_KEY` and an optional `GEMINI_MODEL`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| {
            RagError::ConfigError("GEMINI_API_KEY environment variable not set".to_string())
        })?;
        let mut config = Self::new(api_key);
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            config.model = model;
        }
        Ok(config)
    }

    /// Use a different model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn generate_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

/// A [`GenerationProvider`] backed by Gemini `generateContent`.
///
/// # Example
///
/// ```rust,ignore
/// use rma_rag::gemini::{GeminiConfig, GeminiGenerationProvider};
///
/// let provider = GeminiGenerationProvider::new(GeminiConfig::from_env()?)?;
/// let text = provider.complete("Explain triangulation in one paragraph.").await?;
/// ```
pub struct GeminiGenerationProvider {
    client: reqwest::Client,
    config: GeminiConfig,
    temperature: Option<f32>,
}

impl GeminiGenerationProvider {
    /// Create a provider from `config`.
    pub fn new(config: GeminiConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(RagError::ConfigError("Gemini API key must not be empty".to_string()));
        }
        Ok(Self { client: reqwest::Client::new(), config, temperature: None })
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn failure(message: String) -> RagError {
        RagError::GenerationError { provider: PROVIDER.to_string(), message }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [RequestPart<'a>; 1],
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Join the text parts of the first candidate.
fn candidate_text(response: GenerateContentResponse) -> Option<String> {
    let candidate = response.candidates.into_iter().next()?;
    if let Some(reason) = candidate.finish_reason.as_deref().filter(|r| *r != "STOP") {
        warn!(provider = PROVIDER, finish_reason = reason, "generation did not finish normally");
    }
    let text: String =
        candidate.content?.parts.into_iter().filter_map(|part| part.text).collect();
    Some(text)
}

#[async_trait]
impl GenerationProvider for GeminiGenerationProvider {
    async fn complete(&self, prompt: &str) -> Result<String> {
        debug!(provider = PROVIDER, model = %self.config.model, prompt_len = prompt.len(), "generateContent");

        let body = GenerateContentRequest {
            contents: [Content { role: "user", parts: [RequestPart { text: prompt }] }],
            generation_config: self.temperature.map(|temperature| GenerationConfig { temperature }),
        };
        let response = self
            .client
            .post(self.config.generate_url())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "request failed");
                Self::failure(format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail =
                serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body);
            error!(provider = PROVIDER, %status, "API error");
            return Err(Self::failure(format!("API returned {status}: {detail}")));
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            Self::failure(format!("failed to parse response: {e}"))
        })?;
        candidate_text(parsed).ok_or_else(|| Self::failure("response contained no candidates".to_string()))
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}
