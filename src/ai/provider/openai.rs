//! OpenAI API Provider
//!
//! LLM provider using the Chat Completions API in JSON mode. Works with any
//! OpenAI-compatible endpoint via `api_base`.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::{LlmProvider, LlmResponse, ProviderConfig, ResponseMetadata, TokenUsage, exchange, http_client};
use crate::ai::json::extract_json_from_response;
use crate::types::{Result, TopicError};

const PROVIDER: &str = "openai";
const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const SYSTEM_PREAMBLE: &str =
    "You analyze team chat conversations for software and project teams.";

pub struct OpenAiProvider {
    api_key: SecretString,
    api_base: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
            .map(SecretString::from)
            .ok_or_else(|| {
                TopicError::Config(
                    "No OpenAI API key: set OPENAI_API_KEY or llm.api_key".to_string(),
                )
            })?;

        Ok(Self {
            api_key,
            api_base: config
                .api_base
                .as_deref()
                .unwrap_or(DEFAULT_API_BASE)
                .trim_end_matches('/')
                .to_string(),
            model: config.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client: http_client(config.timeout_secs)?,
        })
    }

    /// System turn carrying the response contract
    fn system_turn(schema: &Value) -> String {
        if schema.is_null() {
            return format!("{} Answer with a single JSON object.", SYSTEM_PREAMBLE);
        }
        format!(
            "{} Answer with a single JSON object matching this schema and nothing else:\n{}",
            SYSTEM_PREAMBLE, schema
        )
    }

    fn build_request<'a>(&'a self, system: &'a str, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: [
                Turn { role: "system", content: system },
                Turn { role: "user", content: prompt },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: JsonMode { kind: "json_object" },
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn generate(&self, prompt: &str, schema: &Value) -> Result<LlmResponse> {
        debug!(model = %self.model, "Chat completion request");

        let system = Self::system_turn(schema);
        let request = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(self.api_key.expose_secret())
            .json(&self.build_request(&system, prompt));
        let (body, timing): (ChatResponse, _) = exchange(PROVIDER, request).await?;

        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| TopicError::LlmApi("Chat completion carried no content".to_string()))?;

        Ok(LlmResponse::with_metrics(
            extract_json_from_response(&text)?,
            body.usage
                .map(|u| TokenUsage::from_openai(u.prompt_tokens, u.completion_tokens))
                .unwrap_or_default(),
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

    async fn health_check(&self) -> Result<bool> {
        let probe = self
            .client
            .get(format!("{}/models", self.api_base))
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await;

        let reachable = matches!(&probe, Ok(resp) if resp.status().is_success());
        if !reachable {
            match probe {
                Ok(resp) => warn!(status = %resp.status(), "OpenAI health check rejected"),
                Err(e) => warn!(error = %e, "OpenAI health check failed"),
            }
        }
        Ok(reachable)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [Turn<'a>; 2],
    temperature: f32,
    max_tokens: usize,
    response_format: JsonMode,
}

#[derive(Serialize)]
struct Turn<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct JsonMode {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider() -> OpenAiProvider {
        OpenAiProvider::new(ProviderConfig {
            api_key: Some("sk-test".to_string()),
            api_base: Some("http://localhost:9999/v1/".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_api_base_trailing_slash_trimmed() {
        assert_eq!(provider().api_base, "http://localhost:9999/v1");
    }

    #[test]
    fn test_debug_redacts_key() {
        assert!(!format!("{:?}", provider()).contains("sk-test"));
    }

    #[test]
    fn test_request_uses_json_mode_and_schema() {
        let schema = json!({"type": "object", "required": ["topics"]});
        let system = OpenAiProvider::system_turn(&schema);
        let p = provider();
        let body = serde_json::to_value(p.build_request(&system, "find topics")).unwrap();

        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "find topics");
        assert!(body["messages"][0]["content"].as_str().unwrap().contains("\"topics\""));
    }

    #[test]
    fn test_response_body_parsing() {
        let raw = r#"{"choices":[{"message":{"content":"{\"summary\":\"ok\"}"}}],"usage":{"prompt_tokens":12,"completion_tokens":3}}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.usage.unwrap().prompt_tokens, 12);
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("{\"summary\":\"ok\"}")
        );
    }
}
