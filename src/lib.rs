//! topicpulse - Topic-Volume Analysis for Chat Channels
//!
//! Pulls a channel's messages for a date window, discovers what people are
//! talking about, and charts each topic's share of the conversation per day
//! with day-over-day trends. Any (topic, day) cell can be drilled into for a
//! summary and a suggested ticket.
//!
//! ## Pipeline
//!
//! ```text
//! MessageSource ─▶ MessageStoreAdapter ─▶ TopicDiscovery ─▶ VolumeAggregator
//!   (Slack)          filter + bucket        one LLM call      intensity matrix
//!                                                                   │
//!                                  AnalysisSession ─▶ CellPipeline ◀┘
//!                                   cache + cells     summary + ticket
//! ```
//!
//! ## Modules
//!
//! - [`source`]: message sources, credential store, day bucketing
//! - [`ai`]: LLM providers, prompts, the text-intelligence contract
//! - [`analysis`]: topic discovery, aggregation, cell insights, sessions
//! - [`server`]: HTTP API
//! - [`config`]: layered configuration

pub mod ai;
pub mod analysis;
pub mod cli;
pub mod config;
pub mod constants;
pub mod server;
pub mod source;
pub mod types;

#[cfg(test)]
mod testing;

// =============================================================================
// Core Re-exports
// =============================================================================

pub use config::{Config, ConfigLoader};
pub use types::{ErrorKind, Result, ResultExt, TopicError};

pub use ai::{
    LlmProvider, LlmResponse, LlmTextIntelligence, SharedIntelligence, SharedMetrics,
    TextIntelligence, with_timeout,
};
pub use analysis::{
    AnalysisSession, CellInsight, CellPhase, SessionState, TopicDiscovery, VolumeAggregator,
};
pub use source::{CredentialStore, InMemoryCredentialStore, MessageSource, MessageStoreAdapter};
pub use types::{AnalysisMatrix, DayBucket, Message, Topic};
