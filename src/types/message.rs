//! Message-level domain types.
//!
//! `RawMessage` mirrors what a message source hands back; `Message` is the
//! filtered, immutable form the analysis works on.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A human-authored chat message. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub author: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ref: Option<String>,
}

impl Message {
    pub fn new(author: impl Into<String>, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
            timestamp,
            thread_ref: None,
        }
    }

    /// `author: text`, the line format sent to the text-intelligence provider
    pub fn as_corpus_line(&self) -> String {
        format!("{}: {}", self.author, self.text)
    }
}

/// All qualifying messages of one calendar day in the reference offset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayBucket {
    pub date: NaiveDate,
    pub messages: Vec<Message>,
}

impl DayBucket {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            messages: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Day label used in prompts and API payloads (`YYYY-MM-DD`)
    pub fn label(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

/// Raw message record as returned by a message source.
///
/// Timestamps use the source's `seconds.micros` string convention.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    pub ts: String,
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
}

/// Subtypes that are produced by the platform or integrations rather than people
const AUTOMATED_SUBTYPES: &[&str] = &[
    "bot_message",
    "channel_join",
    "channel_leave",
    "channel_topic",
    "channel_purpose",
    "channel_name",
    "channel_archive",
    "channel_unarchive",
    "pinned_item",
    "unpinned_item",
];

impl RawMessage {
    /// True when the record has no human author (bots, integrations, system events)
    pub fn is_automated(&self) -> bool {
        self.user.as_deref().is_none_or(|u| u.trim().is_empty())
            || self.bot_id.is_some()
            || self
                .subtype
                .as_deref()
                .is_some_and(|s| AUTOMATED_SUBTYPES.contains(&s))
    }

    pub fn has_text(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    /// Parse `ts` (`"1700000000.000200"`) into an instant
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let (secs, frac) = match self.ts.split_once('.') {
            Some((s, f)) => (s, f),
            None => (self.ts.as_str(), ""),
        };
        let secs: i64 = secs.parse().ok()?;
        let micros: u32 = if frac.is_empty() {
            0
        } else {
            // Right-pad or truncate to six digits
            let digits: String = frac.chars().chain(std::iter::repeat('0')).take(6).collect();
            digits.parse().ok()?
        };
        DateTime::from_timestamp(secs, micros * 1_000)
    }
}

/// Channel metadata as listed by a message source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
    pub is_private: bool,
    pub member_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn raw(user: Option<&str>, text: Option<&str>) -> RawMessage {
        RawMessage {
            user: user.map(String::from),
            text: text.map(String::from),
            ts: "1700000000.000200".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_timestamp_parsing() {
        let ts = raw(Some("U1"), Some("hi")).timestamp().unwrap();
        assert_eq!(ts.timestamp(), 1_700_000_000);
        assert_eq!(ts.nanosecond(), 200_000);
        assert_eq!(ts.year(), 2023);
    }

    #[test]
    fn test_timestamp_without_fraction() {
        let msg = RawMessage {
            ts: "1700000000".to_string(),
            ..Default::default()
        };
        assert_eq!(msg.timestamp().unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_timestamp_garbage() {
        let msg = RawMessage {
            ts: "yesterday".to_string(),
            ..Default::default()
        };
        assert!(msg.timestamp().is_none());
    }

    #[test]
    fn test_automated_detection() {
        assert!(!raw(Some("U1"), Some("hello")).is_automated());
        assert!(raw(None, Some("hello")).is_automated());

        let mut bot = raw(Some("U1"), Some("deploy finished"));
        bot.bot_id = Some("B01".to_string());
        assert!(bot.is_automated());

        let mut join = raw(Some("U1"), Some("<@U1> has joined the channel"));
        join.subtype = Some("channel_join".to_string());
        assert!(join.is_automated());

        let mut reply = raw(Some("U1"), Some("threaded"));
        reply.subtype = Some("thread_broadcast".to_string());
        assert!(!reply.is_automated());
    }

    #[test]
    fn test_has_text() {
        assert!(raw(Some("U1"), Some("x")).has_text());
        assert!(!raw(Some("U1"), Some("   ")).has_text());
        assert!(!raw(Some("U1"), None).has_text());
    }

    #[test]
    fn test_corpus_line() {
        let msg = Message::new("alice", "fix login bug", Utc::now());
        assert_eq!(msg.as_corpus_line(), "alice: fix login bug");
    }
}
