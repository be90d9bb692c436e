//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Secrets (`llm.api_key`, `source.token`) are never serialized back out and are
//! redacted in debug output.

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::ai::provider::ProviderConfig;
use crate::constants::{analysis, network, source};
use crate::types::{Result, TopicError};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// LLM provider settings
    pub llm: LlmConfig,

    /// Message source settings
    pub source: SourceConfig,

    /// Topic analysis settings
    pub analysis: AnalysisConfig,

    /// HTTP server settings
    pub server: ServerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            llm: LlmConfig::default(),
            source: SourceConfig::default(),
            analysis: AnalysisConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `TopicError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(TopicError::Config(format!(
                "LLM temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            )));
        }

        if self.llm.timeout_secs == 0 {
            return Err(TopicError::Config(
                "LLM timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.source.timeout_secs == 0 {
            return Err(TopicError::Config(
                "source.timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.source.window_days == 0 {
            return Err(TopicError::Config(
                "source.window_days must be greater than 0".to_string(),
            ));
        }

        // Offsets beyond ±24h are rejected by chrono
        if self.source.reference_offset().is_none() {
            return Err(TopicError::Config(format!(
                "source.utc_offset_minutes out of range: {}",
                self.source.utc_offset_minutes
            )));
        }

        if self.source.page_limit == 0 || self.source.page_limit > 1000 {
            return Err(TopicError::Config(format!(
                "source.page_limit must be in 1..=1000, got {}",
                self.source.page_limit
            )));
        }

        if self.analysis.max_topics == 0 {
            return Err(TopicError::Config(
                "analysis.max_topics must be greater than 0".to_string(),
            ));
        }

        if self.analysis.insight_timeout_secs == 0 {
            return Err(TopicError::Config(
                "analysis.insight_timeout_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// LLM Configuration
// =============================================================================

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name ("openai")
    pub provider: String,

    /// Model name
    pub model: String,

    /// Custom API base (OpenAI-compatible endpoints)
    pub api_base: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Temperature for LLM generation
    pub temperature: f32,

    /// Maximum tokens to generate
    pub max_tokens: usize,

    /// API key; falls back to OPENAI_API_KEY
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_base: None,
            timeout_secs: network::DEFAULT_TIMEOUT_SECS,
            temperature: 0.2,
            max_tokens: 1024,
            api_key: None,
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl LlmConfig {
    pub fn to_provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            provider: self.provider.clone(),
            model: Some(self.model.clone()),
            timeout_secs: self.timeout_secs,
            temperature: self.temperature,
            api_key: self.api_key.clone(),
            api_base: self.api_base.clone(),
            max_tokens: self.max_tokens,
        }
    }
}

// =============================================================================
// Message Source Configuration
// =============================================================================

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Chat platform Web API base
    pub api_base: String,

    /// Window length when no start date is given
    pub window_days: u32,

    /// Fixed reference offset used for calendar-day bucketing
    pub utc_offset_minutes: i32,

    /// Page size for paginated listing calls
    pub page_limit: u32,

    /// Upper bound on pages followed per call
    pub max_pages: u32,

    /// HTTP timeout for one Web API request (seconds)
    pub timeout_secs: u64,

    /// Resolve author IDs to display names
    pub resolve_names: bool,

    /// Identity whose credential is used when none is supplied
    pub user_id: String,

    /// Access token seeded into the credential store; falls back to SLACK_BOT_TOKEN
    #[serde(skip_serializing)]
    pub token: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_base: source::DEFAULT_API_BASE.to_string(),
            window_days: source::DEFAULT_WINDOW_DAYS,
            utc_offset_minutes: 0,
            page_limit: source::DEFAULT_PAGE_LIMIT,
            max_pages: source::DEFAULT_MAX_PAGES,
            timeout_secs: source::DEFAULT_TIMEOUT_SECS,
            resolve_names: false,
            user_id: source::DEFAULT_USER_ID.to_string(),
            token: None,
        }
    }
}

impl std::fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceConfig")
            .field("api_base", &self.api_base)
            .field("window_days", &self.window_days)
            .field("utc_offset_minutes", &self.utc_offset_minutes)
            .field("page_limit", &self.page_limit)
            .field("max_pages", &self.max_pages)
            .field("timeout_secs", &self.timeout_secs)
            .field("resolve_names", &self.resolve_names)
            .field("user_id", &self.user_id)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl SourceConfig {
    pub fn reference_offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes.checked_mul(60)?)
    }

    /// Token from config, then from the environment
    pub fn resolved_token(&self) -> Option<String> {
        self.token
            .clone()
            .or_else(|| std::env::var("SLACK_BOT_TOKEN").ok())
            .filter(|t| !t.trim().is_empty())
    }
}

// =============================================================================
// Analysis Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Upper bound on topics kept after discovery
    pub max_topics: usize,

    /// Caller-side timeout around one cell insight pipeline
    pub insight_timeout_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_topics: analysis::DEFAULT_MAX_TOPICS,
            insight_timeout_secs: network::DEFAULT_INSIGHT_TIMEOUT_SECS,
        }
    }
}

// =============================================================================
// Server Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address, e.g. "127.0.0.1:3000"
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: network::DEFAULT_BIND.to_string(),
        }
    }
}
