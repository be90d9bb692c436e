//! Ollama Local LLM Provider
//!
//! Runs the intelligence stages against a locally hosted model in JSON mode.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::{
    LlmProvider, LlmResponse, ProviderConfig, ResponseMetadata, TokenUsage, exchange, http_client,
    prompt_utils,
};
use crate::ai::json::extract_json_from_response;
use crate::types::{Result, TopicError};

const PROVIDER: &str = "ollama";
const DEFAULT_API_BASE: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "llama3:latest";

#[derive(Debug)]
pub struct OllamaProvider {
    api_base: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let api_base = endpoint(config.api_base.as_deref().unwrap_or(DEFAULT_API_BASE))?;
        Ok(Self {
            api_base,
            model: config.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: config.temperature,
            client: http_client(config.timeout_secs)?,
        })
    }

    fn build_request<'a>(&'a self, prompt: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            format: "json",
            options: Options {
                temperature: self.temperature,
            },
        }
    }

    /// Whether `name` from the tag list is the configured model
    fn is_configured_model(&self, name: &str) -> bool {
        name == self.model || name.starts_with(self.model.trim_end_matches(":latest"))
    }
}

/// Only http/https endpoints are accepted; non-local hosts are logged
fn endpoint(raw: &str) -> Result<String> {
    let url = url::Url::parse(raw)
        .map_err(|e| TopicError::Config(format!("Invalid Ollama endpoint '{}': {}", raw, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(TopicError::Config(format!(
            "Ollama endpoint must be http or https, got {}",
            url.scheme()
        )));
    }

    if let Some(host) = url.host_str()
        && !matches!(host, "localhost" | "127.0.0.1" | "::1" | "[::1]")
    {
        warn!(host, "Ollama endpoint is not local; chat messages will leave this machine");
    }

    Ok(url.as_str().trim_end_matches('/').to_string())
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn generate(&self, prompt: &str, schema: &Value) -> Result<LlmResponse> {
        debug!(model = %self.model, "Ollama generate request");

        let full_prompt = prompt_utils::build_schema_prompt(prompt, schema);
        let request = self
            .client
            .post(format!("{}/api/generate", self.api_base))
            .json(&self.build_request(&full_prompt));
        let (body, timing): (GenerateResponse, _) = exchange(PROVIDER, request).await?;

        Ok(LlmResponse::with_metrics(
            extract_json_from_response(&body.response)?,
            TokenUsage::from_ollama(
                body.prompt_eval_count.unwrap_or(0),
                body.eval_count.unwrap_or(0),
            ),
            timing,
            ResponseMetadata::new(PROVIDER, &self.model),
        ))
    }

    fn name(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }

    /// Reachable and the configured model has been pulled
    async fn health_check(&self) -> Result<bool> {
        let request = self.client.get(format!("{}/api/tags", self.api_base));
        let tags: TagList = match exchange(PROVIDER, request).await {
            Ok((tags, _)) => tags,
            Err(e) => {
                warn!(error = %e, "Ollama health check failed");
                return Ok(false);
            }
        };

        let pulled = tags.models.iter().any(|m| self.is_configured_model(&m.name));
        if !pulled {
            warn!(model = %self.model, "Ollama is running but the model is not pulled");
        }
        Ok(pulled)
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'static str,
    options: Options,
}

#[derive(Serialize)]
struct Options {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Deserialize)]
struct TagList {
    models: Vec<Tag>,
}

#[derive(Deserialize)]
struct Tag {
    name: String,
}
