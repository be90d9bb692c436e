//! AI Integration Layer
//!
//! LLM providers, the text-intelligence contract built on top of them, and
//! the caller-side helpers (timeouts, usage metrics) around provider calls.

pub mod intelligence;
pub mod json;
pub mod metrics;
pub mod prompt;
pub mod provider;
pub mod timeout;

pub use intelligence::{
    LlmTextIntelligence, SharedIntelligence, SummaryContext, TextIntelligence, TicketSuggestion,
};
pub use json::extract_json_from_response;
pub use metrics::{SharedMetrics, StageMetrics, UsageMetrics, UsageSummary, create_shared_metrics};
pub use prompt::{PromptBuilder, PromptTemplates};
pub use provider::{
    LlmProvider, LlmResponse, ProviderConfig, ResponseMetadata, ResponseTiming, SharedProvider,
    TokenUsage, create_provider,
};
pub use timeout::with_timeout;
