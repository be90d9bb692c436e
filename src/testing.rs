//! In-crate fakes shared by unit tests across modules.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use secrecy::SecretString;

use crate::ai::{SummaryContext, TextIntelligence, TicketSuggestion};
use crate::source::MessageSource;
use crate::types::{ChannelId, ChannelInfo, ErrorKind, RawMessage, Result, TopicError};

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

/// Human message as the source would return it
pub fn raw(user: &str, text: &str, when: DateTime<Utc>) -> RawMessage {
    RawMessage {
        user: Some(user.to_string()),
        text: Some(text.to_string()),
        ts: format!("{}.{:06}", when.timestamp(), when.timestamp_subsec_micros()),
        ..Default::default()
    }
}

fn error_for(kind: ErrorKind, detail: &str) -> TopicError {
    TopicError::from_kind(kind, detail)
}

// =============================================================================
// Fake Message Source
// =============================================================================

#[derive(Default)]
pub struct FakeSource {
    pub history: Vec<RawMessage>,
    pub channels: Vec<ChannelInfo>,
    pub names: HashMap<String, String>,
    pub fail_with: Option<ErrorKind>,
    pub fetches: AtomicUsize,
}

impl FakeSource {
    pub fn with_history(history: Vec<RawMessage>) -> Self {
        Self {
            history,
            ..Default::default()
        }
    }

    pub fn failing(kind: ErrorKind) -> Self {
        Self {
            fail_with: Some(kind),
            ..Default::default()
        }
    }
}

#[async_trait]
impl MessageSource for FakeSource {
    fn name(&self) -> &str {
        "fake"
    }

    async fn list_channels(&self, _credential: &SecretString) -> Result<Vec<ChannelInfo>> {
        if let Some(kind) = self.fail_with {
            return Err(error_for(kind, "list_channels"));
        }
        Ok(self.channels.clone())
    }

    async fn fetch_history(
        &self,
        _credential: &SecretString,
        _channel: &ChannelId,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<RawMessage>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(kind) = self.fail_with {
            return Err(error_for(kind, "fetch_history"));
        }
        Ok(self
            .history
            .iter()
            .filter(|m| m.timestamp().is_none_or(|ts| ts >= since && ts <= until))
            .cloned()
            .collect())
    }

    async fn user_name(&self, _credential: &SecretString, user: &str) -> Result<Option<String>> {
        Ok(self.names.get(user).cloned())
    }
}

// =============================================================================
// Fake Text Intelligence
// =============================================================================

/// Scripted intelligence with call counters and an optional delay on the cell calls
pub struct FakeIntelligence {
    pub topics: std::result::Result<Vec<String>, ErrorKind>,
    pub summary: std::result::Result<String, ErrorKind>,
    pub suggestion: std::result::Result<TicketSuggestion, ErrorKind>,
    pub delay: Duration,
    pub classify_calls: AtomicUsize,
    pub summarize_calls: AtomicUsize,
    pub suggest_calls: AtomicUsize,
    pub last_summarized: Mutex<Vec<String>>,
}

impl Default for FakeIntelligence {
    fn default() -> Self {
        Self {
            topics: Ok(Vec::new()),
            summary: Ok("summary".to_string()),
            suggestion: Ok(TicketSuggestion::default()),
            delay: Duration::ZERO,
            classify_calls: AtomicUsize::new(0),
            summarize_calls: AtomicUsize::new(0),
            suggest_calls: AtomicUsize::new(0),
            last_summarized: Mutex::new(Vec::new()),
        }
    }
}

impl FakeIntelligence {
    pub fn with_topics(topics: &[&str]) -> Self {
        Self {
            topics: Ok(topics.iter().map(|s| s.to_string()).collect()),
            ..Default::default()
        }
    }

    pub fn ticket(mut self, title: &str, reason: &str) -> Self {
        self.suggestion = Ok(TicketSuggestion {
            suggestion: title.to_string(),
            reason: reason.to_string(),
        });
        self
    }

    pub fn summary(mut self, summary: &str) -> Self {
        self.summary = Ok(summary.to_string());
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> (usize, usize, usize) {
        (
            self.classify_calls.load(Ordering::SeqCst),
            self.summarize_calls.load(Ordering::SeqCst),
            self.suggest_calls.load(Ordering::SeqCst),
        )
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl TextIntelligence for FakeIntelligence {
    async fn classify_topics(&self, _messages: &[String]) -> Result<Vec<String>> {
        self.classify_calls.fetch_add(1, Ordering::SeqCst);
        self.topics
            .clone()
            .map_err(|kind| error_for(kind, "classify"))
    }

    async fn summarize(&self, messages: &[String], _context: &SummaryContext) -> Result<String> {
        self.summarize_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_summarized.lock().unwrap() = messages.to_vec();
        self.pause().await;
        self.summary
            .clone()
            .map_err(|kind| error_for(kind, "summarize"))
    }

    async fn suggest_ticket(&self, _topic: &str, _messages: &[String]) -> Result<TicketSuggestion> {
        self.suggest_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.suggestion
            .clone()
            .map_err(|kind| error_for(kind, "suggest"))
    }
}
