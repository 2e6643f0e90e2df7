//! Language-model provider implementations.
//!
//! | Config Value | Provider | Endpoint | Credentials |
//! |-------------|----------|----------|-------------|
//! | `"gemini"` | [`GeminiModel`] | `models/{model}:generateContent` | `GOOGLE_API_KEY` |
//! | `"openai"` | [`OpenAiChatModel`] | `/v1/chat/completions` | `OPENAI_API_KEY` |
//! | `"ollama"` | [`OllamaModel`] | `/api/generate` | none |
//!
//! Each call is single-turn and bounded by `llm.timeout_secs`. There are no
//! retries here: a failed or timed-out call is a [`RagError::Synthesis`] and
//! the engine decides what to do next.

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use pdfqa_core::generation::{CompletionRequest, LanguageModel};
use pdfqa_core::{RagError, Result};

use crate::config::LlmConfig;

/// Create the [`LanguageModel`] named by `config.provider`.
pub fn create_language_model(config: &LlmConfig) -> anyhow::Result<Arc<dyn LanguageModel>> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .context("failed to build LLM HTTP client")?;

    match config.provider.as_str() {
        "gemini" => {
            let api_key = std::env::var("GOOGLE_API_KEY")
                .context("GOOGLE_API_KEY environment variable not set")?;
            Ok(Arc::new(GeminiModel::new(client, config, api_key)))
        }
        "openai" => {
            let api_key = std::env::var("OPENAI_API_KEY")
                .context("OPENAI_API_KEY environment variable not set")?;
            Ok(Arc::new(OpenAiChatModel::new(client, config, api_key)))
        }
        "ollama" => Ok(Arc::new(OllamaModel::new(client, config))),
        other => bail!("Unknown llm provider: {}", other),
    }
}

/// Send a JSON body and decode the JSON reply, mapping every failure to
/// [`RagError::Synthesis`].
async fn send_json<T: for<'de> Deserialize<'de>>(
    request: reqwest::RequestBuilder,
    service: &str,
) -> Result<T> {
    let resp = request.send().await.map_err(|e| {
        if e.is_timeout() {
            RagError::synthesis(format!("{} request timed out", service))
        } else {
            RagError::synthesis(format!("failed to call {}: {}", service, e))
        }
    })?;
    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp
            .text()
            .await
            .unwrap_or_else(|_| "<body unavailable>".to_string());
        return Err(RagError::synthesis(format!(
            "{} returned {}: {}",
            service, status, text
        )));
    }
    resp.json()
        .await
        .map_err(|e| RagError::synthesis(format!("failed to parse {} response: {}", service, e)))
}

// ============ Gemini ============

/// Google Gemini via the Generative Language REST API.
pub struct GeminiModel {
    client: reqwest::Client,
    api_key: String,
    model: String,
    url: String,
}

impl GeminiModel {
    pub fn new(client: reqwest::Client, config: &LlmConfig, api_key: String) -> Self {
        let base = config
            .url
            .clone()
            .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string());
        // accept both "gemini-2.5-flash" and "models/gemini-2.5-flash"
        let model = config.model.trim_start_matches("models/").to_string();
        let url = format!(
            "{}/models/{}:generateContent",
            base.trim_end_matches('/'),
            model
        );
        Self {
            client,
            api_key,
            model,
            url,
        }
    }
}

#[derive(Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    role: &'a str,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: String,
}

impl GeminiResponse {
    /// Text of the first candidate, parts concatenated.
    fn into_text(self) -> Result<String> {
        let content = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .ok_or_else(|| RagError::synthesis("Gemini returned no candidates"))?;
        Ok(content.parts.into_iter().map(|p| p.text).collect())
    }
}

#[async_trait]
impl LanguageModel for GeminiModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String> {
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user",
                parts: vec![GeminiPart {
                    text: request.prompt,
                }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: request.temperature,
            },
        };
        let resp: GeminiResponse = send_json(
            self.client
                .post(&self.url)
                .header("x-goog-api-key", self.api_key.trim())
                .json(&body),
            "Gemini",
        )
        .await?;
        resp.into_text()
    }
}

// ============ OpenAI ============

/// OpenAI (or any OpenAI-compatible) chat completions.
pub struct OpenAiChatModel {
    client: reqwest::Client,
    api_key: String,
    model: String,
    url: String,
}

impl OpenAiChatModel {
    pub fn new(client: reqwest::Client, config: &LlmConfig, api_key: String) -> Self {
        let base = config
            .url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com".to_string());
        Self {
            client,
            api_key,
            model: config.model.clone(),
            url: format!("{}/v1/chat/completions", base.trim_end_matches('/')),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            temperature: request.temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: request.prompt,
            }],
        };
        let resp: ChatResponse = send_json(
            self.client
                .post(&self.url)
                .bearer_auth(self.api_key.trim())
                .json(&body),
            "OpenAI",
        )
        .await?;
        resp.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| RagError::synthesis("OpenAI returned no choices"))
    }
}

// ============ Ollama ============

/// A local Ollama model via `/api/generate` (non-streaming).
pub struct OllamaModel {
    client: reqwest::Client,
    model: String,
    url: String,
}

impl OllamaModel {
    pub fn new(client: reqwest::Client, config: &LlmConfig) -> Self {
        let base = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());
        Self {
            client,
            model: config.model.clone(),
            url: format!("{}/api/generate", base.trim_end_matches('/')),
        }
    }
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
}

#[async_trait]
impl LanguageModel for OllamaModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String> {
        let body = OllamaRequest {
            model: &self.model,
            prompt: request.prompt,
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
            },
        };
        let resp: OllamaResponse =
            send_json(self.client.post(&self.url).json(&body), "Ollama").await?;
        Ok(resp.response)
    }
}
