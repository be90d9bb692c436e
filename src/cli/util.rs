//! CLI Common Utilities
//!
//! Shared wiring for commands that talk to the message source or the provider.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, TimeDelta, Utc};

use crate::ai::{LlmTextIntelligence, SharedIntelligence, SharedMetrics, create_provider, create_shared_metrics};
use crate::analysis::AnalysisSession;
use crate::config::{Config, ConfigLoader};
use crate::source::{InMemoryCredentialStore, MessageStoreAdapter, SlackSource};
use crate::types::{Result, UserId, parse_instant};

/// Everything a command needs, built once from the resolved configuration
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub metrics: SharedMetrics,
    pub intelligence: SharedIntelligence,
    pub credentials: Arc<InMemoryCredentialStore>,
    pub adapter: Arc<MessageStoreAdapter>,
    pub provider_name: String,
}

impl AppContext {
    /// Load configuration (optionally from an explicit file) and wire the
    /// provider, source and credential store
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => ConfigLoader::load_with_file(path)?,
            None => ConfigLoader::load()?,
        };
        Self::from_config(config)
    }

    pub fn from_config(config: Config) -> Result<Self> {
        let provider = create_provider(&config.llm.to_provider_config())?;
        let provider_name = format!("{} ({})", provider.name(), provider.model());
        let metrics = create_shared_metrics();
        let intelligence: SharedIntelligence = Arc::new(LlmTextIntelligence::new(
            provider,
            metrics.clone(),
            config.analysis.max_topics,
        ));

        let source = SlackSource::new(&config.source, Duration::from_secs(config.source.timeout_secs))?;
        let credentials = Arc::new(InMemoryCredentialStore::seeded(
            UserId::new(&config.source.user_id),
            config.source.resolved_token(),
        ));
        let adapter = MessageStoreAdapter::new(Arc::new(source), credentials.clone(), &config.source)?;

        Ok(Self {
            config: Arc::new(config),
            metrics,
            intelligence,
            credentials,
            adapter: Arc::new(adapter),
            provider_name,
        })
    }

    pub fn default_user(&self) -> UserId {
        UserId::new(&self.config.source.user_id)
    }

    pub fn insight_timeout(&self) -> Duration {
        Duration::from_secs(self.config.analysis.insight_timeout_secs)
    }

    /// Fresh analysis session for `user`
    pub fn session(&self, user: UserId) -> Arc<AnalysisSession> {
        Arc::new(AnalysisSession::new(
            user,
            self.adapter.clone(),
            self.intelligence.clone(),
            self.config.analysis.max_topics,
        ))
    }
}

/// Parse a CLI date bound. A bare `YYYY-MM-DD` end bound covers the whole
/// day in the reference offset.
pub fn parse_bound(raw: &str, offset: FixedOffset, end_of_day: bool) -> Result<DateTime<Utc>> {
    let instant = parse_instant(raw, offset)?;
    let bare_date = DateTime::parse_from_rfc3339(raw.trim()).is_err();
    if end_of_day && bare_date {
        Ok(instant + TimeDelta::days(1) - TimeDelta::microseconds(1))
    } else {
        Ok(instant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_parse_bound_date_in_offset() {
        let offset = FixedOffset::east_opt(9 * 3600).unwrap();
        let start = parse_bound("2024-03-01", offset, false).unwrap();
        assert_eq!(start.to_rfc3339(), "2024-02-29T15:00:00+00:00");

        let end = parse_bound("2024-03-01", offset, true).unwrap();
        assert_eq!(end.date_naive(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn test_parse_bound_rfc3339_and_garbage() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let t = parse_bound("2024-03-01T12:30:00Z", utc, false).unwrap();
        assert_eq!(t.to_rfc3339(), "2024-03-01T12:30:00+00:00");
        assert!(parse_bound("last week", utc, false).is_err());
    }

    #[test]
    fn test_context_from_default_config_with_key() {
        let mut config = Config::default();
        config.llm.api_key = Some("sk-test".to_string());
        config.source.token = Some("xoxb-test".to_string());

        let ctx = AppContext::from_config(config).unwrap();
        assert!(ctx.adapter.is_connected(&ctx.default_user()));
        assert!(ctx.provider_name.starts_with("openai"));
        assert_eq!(ctx.insight_timeout(), Duration::from_secs(120));
    }
}
