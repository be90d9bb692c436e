//! Text Intelligence
//!
//! The three language operations the analysis needs: topic classification,
//! summarization and ticket suggestion. `LlmTextIntelligence` implements them
//! over any [`LlmProvider`] and enforces the response contracts strictly: a
//! provider error or a payload of the wrong shape becomes the stage's own
//! error, never a default value.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use crate::ai::metrics::SharedMetrics;
use crate::ai::prompt::PromptTemplates;
use crate::ai::provider::{LlmResponse, SharedProvider};
use crate::types::{Result, TopicError, json_string, json_string_array};

// =============================================================================
// Contract Types
// =============================================================================

/// Optional framing passed along with a summarization request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryContext {
    pub topic: Option<String>,
    pub day_label: Option<String>,
    pub channel_name: Option<String>,
    pub date_range: Option<String>,
}

impl SummaryContext {
    /// Context for a single (topic, day) cell
    pub fn for_cell(topic: impl Into<String>, day_label: impl Into<String>) -> Self {
        Self {
            topic: Some(topic.into()),
            day_label: Some(day_label.into()),
            ..Default::default()
        }
    }
}

/// Raw suggestion as returned by the provider. An empty `suggestion` means
/// no ticket is warranted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketSuggestion {
    pub suggestion: String,
    pub reason: String,
}

impl TicketSuggestion {
    pub fn is_empty(&self) -> bool {
        self.suggestion.trim().is_empty()
    }
}

/// Language operations consumed by topic discovery and the cell pipeline
#[async_trait]
pub trait TextIntelligence: Send + Sync {
    /// Candidate topic labels for a corpus of `author: text` lines
    async fn classify_topics(&self, messages: &[String]) -> Result<Vec<String>>;

    /// Prose summary of the messages
    async fn summarize(&self, messages: &[String], context: &SummaryContext) -> Result<String>;

    /// Ticket suggestion for a topic's messages
    async fn suggest_ticket(&self, topic: &str, messages: &[String]) -> Result<TicketSuggestion>;
}

pub type SharedIntelligence = Arc<dyn TextIntelligence>;

// =============================================================================
// LLM-backed Implementation
// =============================================================================

const STAGE_CLASSIFY: &str = "classify";
const STAGE_SUMMARIZE: &str = "summarize";
const STAGE_SUGGEST: &str = "suggest";

pub struct LlmTextIntelligence {
    provider: SharedProvider,
    metrics: SharedMetrics,
    max_topics: usize,
}

impl LlmTextIntelligence {
    pub fn new(provider: SharedProvider, metrics: SharedMetrics, max_topics: usize) -> Self {
        Self {
            provider,
            metrics,
            max_topics,
        }
    }

    /// Issue one provider call, attributing any failure to `wrap`
    async fn call(
        &self,
        stage: &'static str,
        prompt: &str,
        schema: &Value,
        wrap: fn(String) -> TopicError,
    ) -> Result<LlmResponse> {
        debug!(stage, prompt_chars = prompt.len(), "Calling provider");
        match self.provider.generate(prompt, schema).await {
            Ok(response) => {
                self.metrics.record_response(stage, &response);
                Ok(response)
            }
            Err(e) => {
                self.metrics.record_failure(stage);
                warn!(stage, error = %e, "Provider call failed");
                Err(e.attribute(wrap))
            }
        }
    }

    fn violation(&self, stage: &'static str, wrap: fn(String) -> TopicError, msg: &str) -> TopicError {
        self.metrics.record_failure(stage);
        warn!(stage, "Provider response violated contract: {}", msg);
        wrap(msg.to_string())
    }
}

#[async_trait]
impl TextIntelligence for LlmTextIntelligence {
    #[instrument(skip_all, fields(messages = messages.len()))]
    async fn classify_topics(&self, messages: &[String]) -> Result<Vec<String>> {
        let schema = json!({
            "type": "object",
            "properties": {"topics": {"type": "array", "items": {"type": "string"}}},
            "required": ["topics"]
        });
        let prompt = PromptTemplates::classify_topics(messages, self.max_topics);
        let response = self
            .call(STAGE_CLASSIFY, &prompt, &schema, TopicError::ClassificationFailed)
            .await?;

        json_string_array(&response.content, "topics").ok_or_else(|| {
            self.violation(
                STAGE_CLASSIFY,
                TopicError::ClassificationFailed,
                "response is not an object with a `topics` array of strings",
            )
        })
    }

    #[instrument(skip_all, fields(messages = messages.len(), topic = ?context.topic))]
    async fn summarize(&self, messages: &[String], context: &SummaryContext) -> Result<String> {
        let schema = json!({
            "type": "object",
            "properties": {"summary": {"type": "string"}},
            "required": ["summary"]
        });
        let prompt = PromptTemplates::summarize(
            messages,
            context.topic.as_deref(),
            context.day_label.as_deref(),
            context.channel_name.as_deref(),
            context.date_range.as_deref(),
        );
        let response = self
            .call(STAGE_SUMMARIZE, &prompt, &schema, TopicError::SummarizationFailed)
            .await?;

        match json_string(&response.content, "summary") {
            Some(summary) if !summary.trim().is_empty() => Ok(summary.trim().to_string()),
            Some(_) => Err(self.violation(
                STAGE_SUMMARIZE,
                TopicError::SummarizationFailed,
                "summary is empty",
            )),
            None => Err(self.violation(
                STAGE_SUMMARIZE,
                TopicError::SummarizationFailed,
                "response is not an object with a `summary` string",
            )),
        }
    }

    #[instrument(skip_all, fields(messages = messages.len(), topic = %topic))]
    async fn suggest_ticket(&self, topic: &str, messages: &[String]) -> Result<TicketSuggestion> {
        let schema = json!({
            "type": "object",
            "properties": {
                "suggestion": {"type": "string"},
                "reason": {"type": "string"}
            },
            "required": ["suggestion", "reason"]
        });
        let prompt = PromptTemplates::suggest_ticket(topic, messages);
        let response = self
            .call(STAGE_SUGGEST, &prompt, &schema, TopicError::SuggestionFailed)
            .await?;

        let Some(suggestion) = json_string(&response.content, "suggestion") else {
            return Err(self.violation(
                STAGE_SUGGEST,
                TopicError::SuggestionFailed,
                "response is not an object with a `suggestion` string",
            ));
        };

        // A "no ticket" answer may omit the reason; a real suggestion may not
        let reason = match response.content.get("reason") {
            Some(Value::String(r)) => r.trim().to_string(),
            None | Some(Value::Null) if suggestion.trim().is_empty() => String::new(),
            _ => {
                return Err(self.violation(
                    STAGE_SUGGEST,
                    TopicError::SuggestionFailed,
                    "`reason` must be a string",
                ));
            }
        };

        Ok(TicketSuggestion {
            suggestion: suggestion.trim().to_string(),
            reason,
        })
    }
}
