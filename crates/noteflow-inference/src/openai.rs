//! OpenAI-compatible model client backend.
//!
//! One HTTP backend serves all four semantic operations, each against its
//! own configured model name. The chat completions API is used throughout;
//! OCR sends the image as a base64 data URL content part.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use tracing::{debug, info, warn};

use noteflow_core::{defaults, detect_image_type, Error, Result, SummaryArtifact};

use crate::client::{CallContext, ModelClient, SummaryTemplate, TagProposal};
use crate::prompts::{self, PromptRegistry};
use crate::retry::{retry_call, CallError, RetryPolicy};

/// Configuration for the OpenAI-compatible backend.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Base URL of the chat completions endpoint.
    pub endpoint_url: String,
    /// Bearer token (optional for local endpoints).
    pub api_key: Option<String>,
    /// Vision model used for OCR.
    pub ocr_model: String,
    /// Text model used for correction passes.
    pub correction_model: String,
    /// Text model used for all summarization templates.
    pub summary_model: String,
    /// Text model used for tag generation.
    pub tag_model: String,
    /// Per-operation latency budgets.
    pub ocr_timeout: Duration,
    pub correction_timeout: Duration,
    pub summary_timeout: Duration,
    pub tag_timeout: Duration,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint_url: defaults::MODEL_ENDPOINT_URL.to_string(),
            api_key: None,
            ocr_model: defaults::OCR_MODEL.to_string(),
            correction_model: defaults::CORRECTION_MODEL.to_string(),
            summary_model: defaults::SUMMARY_MODEL.to_string(),
            tag_model: defaults::TAG_MODEL.to_string(),
            ocr_timeout: Duration::from_secs(defaults::OCR_TIMEOUT_SECS),
            correction_timeout: Duration::from_secs(defaults::CORRECTION_TIMEOUT_SECS),
            summary_timeout: Duration::from_secs(defaults::SUMMARY_TIMEOUT_SECS),
            tag_timeout: Duration::from_secs(defaults::TAG_TIMEOUT_SECS),
        }
    }
}

impl ModelConfig {
    /// Build from environment variables, falling back to defaults.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `MODEL_ENDPOINT_URL` | PPInfra OpenAI-compatible endpoint |
    /// | `MODEL_API_KEY` | none |
    /// | `OCR_MODEL_NAME` | qwen/qwen2.5-vl-72b-instruct |
    /// | `CORRECTION_MODEL_NAME` | deepseek/deepseek-v3 |
    /// | `SUMMARY_MODEL_NAME` | moonshotai/kimi-k2-instruct |
    /// | `TAG_MODEL_NAME` | moonshotai/kimi-k2-instruct |
    pub fn from_env() -> Self {
        let base = Self::default();
        Self {
            endpoint_url: std::env::var("MODEL_ENDPOINT_URL").unwrap_or(base.endpoint_url),
            api_key: std::env::var("MODEL_API_KEY").ok().filter(|k| !k.is_empty()),
            ocr_model: std::env::var("OCR_MODEL_NAME").unwrap_or(base.ocr_model),
            correction_model: std::env::var("CORRECTION_MODEL_NAME")
                .unwrap_or(base.correction_model),
            summary_model: std::env::var("SUMMARY_MODEL_NAME").unwrap_or(base.summary_model),
            tag_model: std::env::var("TAG_MODEL_NAME").unwrap_or(base.tag_model),
            ..base
        }
    }
}

/// OpenAI-compatible model client with retry and per-operation budgets.
pub struct OpenAiModelClient {
    client: Client,
    config: ModelConfig,
    prompts: PromptRegistry,
    retry: RetryPolicy,
}

impl OpenAiModelClient {
    /// Create a client with the given configuration.
    pub fn new(config: ModelConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        info!(
            endpoint = %config.endpoint_url,
            ocr = %config.ocr_model,
            correction = %config.correction_model,
            summary = %config.summary_model,
            "initializing model client"
        );

        Ok(Self {
            client,
            config,
            prompts: PromptRegistry::new(),
            retry: RetryPolicy::from_env(),
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ModelConfig::from_env())
    }

    /// Current configuration.
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Replace the retry policy (mainly for tests).
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// One chat completions attempt. Classification of failures:
    /// network errors, 429 and 5xx are transient; other statuses permanent.
    async fn chat(
        &self,
        model: &str,
        system: &str,
        user_content: JsonValue,
        timeout: Duration,
        json_mode: bool,
    ) -> std::result::Result<String, CallError> {
        let mut messages = Vec::new();
        if !system.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: JsonValue::String(system.to_string()),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: user_content,
        });

        let mut body = json!({
            "model": model,
            "messages": messages,
            "stream": false,
        });
        if json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }

        let url = format!(
            "{}/chat/completions",
            self.config.endpoint_url.trim_end_matches('/')
        );
        let mut request = self.client.post(&url).timeout(timeout).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| CallError::Transient(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            let rendered = format!("model returned {}: {}", status, message);
            return if status.as_u16() == 429 || status.is_server_error() {
                Err(CallError::Transient(rendered))
            } else {
                Err(CallError::Permanent(rendered))
            };
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| CallError::Permanent(format!("failed to parse response: {}", e)))?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .ok_or_else(|| CallError::Permanent("response contained no choices".to_string()))
    }
}

#[async_trait]
impl ModelClient for OpenAiModelClient {
    async fn ocr(&self, ctx: &CallContext, image: &[u8], prompt: Option<&str>) -> Result<String> {
        let image_type = detect_image_type(image)
            .ok_or_else(|| Error::InvalidInput("unsupported image type".to_string()))?;
        let data_url = format!(
            "data:{};base64,{}",
            image_type.mime(),
            base64::engine::general_purpose::STANDARD.encode(image)
        );

        let default_prompt;
        let prompt = match prompt {
            Some(p) => p,
            None => {
                default_prompt = self.prompts.render(prompts::OCR, &[])?;
                &default_prompt
            }
        };

        let content = json!([
            {"type": "text", "text": prompt},
            {"type": "image_url", "image_url": {"url": data_url}},
        ]);

        debug!(model = %self.config.ocr_model, image_bytes = image.len(), "starting OCR");
        let text = retry_call(&self.retry, ctx, "ocr", || {
            self.chat(
                &self.config.ocr_model,
                "",
                content.clone(),
                self.config.ocr_timeout,
                false,
            )
        })
        .await?;

        if text.trim().is_empty() {
            return Err(Error::ModelUnavailable(
                "OCR produced no text".to_string(),
            ));
        }
        Ok(text)
    }

    async fn correct(&self, ctx: &CallContext, text: &str) -> Result<String> {
        let prompt = self.prompts.render(prompts::CORRECTION, &[("text", text)])?;
        debug!(model = %self.config.correction_model, prompt_len = prompt.len(), "starting correction");
        retry_call(&self.retry, ctx, "correct", || {
            self.chat(
                &self.config.correction_model,
                "You are a meticulous proofreader of recognized text.",
                JsonValue::String(prompt.clone()),
                self.config.correction_timeout,
                false,
            )
        })
        .await
    }

    async fn summarize(
        &self,
        ctx: &CallContext,
        text: &str,
        template: SummaryTemplate,
    ) -> Result<SummaryArtifact> {
        let var = match template {
            SummaryTemplate::Comprehensive => ("summaries", text),
            _ => ("content", text),
        };
        let prompt = self.prompts.render(template.template_name(), &[var])?;

        debug!(
            model = %self.config.summary_model,
            template = template.template_name(),
            prompt_len = prompt.len(),
            "starting summarization"
        );
        let raw = retry_call(&self.retry, ctx, "summarize", || {
            self.chat(
                &self.config.summary_model,
                "You organize study notes into structured summaries.",
                JsonValue::String(prompt.clone()),
                self.config.summary_timeout,
                true,
            )
        })
        .await?;

        Ok(parse_summary_response(&raw))
    }

    async fn generate_tags(
        &self,
        ctx: &CallContext,
        summary: &str,
        knowledge_text: &str,
        existing: &[String],
    ) -> Result<TagProposal> {
        let existing_joined = existing.join(", ");
        let prompt = self.prompts.render(
            prompts::TAG_GENERATION,
            &[
                ("summary", summary),
                ("knowledge", knowledge_text),
                ("existing_tags", &existing_joined),
            ],
        )?;

        debug!(model = %self.config.tag_model, existing = existing.len(), "starting tag generation");
        let raw = retry_call(&self.retry, ctx, "generate_tags", || {
            self.chat(
                &self.config.tag_model,
                "You label content with precise tags. Reply with JSON only.",
                JsonValue::String(prompt.clone()),
                self.config.tag_timeout,
                true,
            )
        })
        .await?;

        serde_json::from_str(strip_code_fences(&raw))
            .map_err(|e| Error::Serialization(format!("tag response was not valid JSON: {}", e)))
    }
}

/// Parse a summarization response, falling back to heuristics when the
/// model ignored the JSON instruction.
fn parse_summary_response(raw: &str) -> SummaryArtifact {
    let candidate = strip_code_fences(raw);
    if let Ok(artifact) = serde_json::from_str::<SummaryArtifact>(candidate) {
        if !artifact.content_markdown.trim().is_empty() {
            return artifact;
        }
    }

    warn!(response_len = raw.len(), "summary response was not structured JSON, using fallback parse");

    // Title heuristic: first non-empty line that is not a Markdown heading,
    // clipped to 50 characters.
    let title = raw
        .lines()
        .take(3)
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.chars().take(50).collect())
        .unwrap_or_else(|| "Note summary".to_string());

    SummaryArtifact {
        title,
        topic: "general".to_string(),
        content_markdown: raw.trim().to_string(),
        keywords: Vec::new(),
    }
}

/// Strip a Markdown code fence wrapper, if present.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    if let Some(inner) = trimmed.strip_prefix("```") {
        let inner = inner.strip_prefix("json").unwrap_or(inner);
        if let Some(end) = inner.rfind("```") {
            return inner[..end].trim();
        }
    }
    trimmed
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: JsonValue,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}
