//! Message Store Adapter
//!
//! Fetches a channel window through a [`MessageSource`], drops automated and
//! empty messages, and buckets the rest by calendar day in a fixed reference
//! offset. Every message lands in exactly one bucket.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use futures::future::join_all;
use secrecy::SecretString;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::{CredentialStore, SharedSource};
use crate::config::SourceConfig;
use crate::types::{
    ChannelId, ChannelInfo, DayBucket, Message, RawMessage, Result, TopicError, UserId,
};

/// Filtered, bucketed messages of one channel window
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// All qualifying messages, ordered by timestamp
    pub messages: Vec<Message>,
    /// Populated dates only, ascending
    pub days: Vec<NaiveDate>,
    #[serde(skip)]
    pub buckets: Vec<DayBucket>,
}

impl MessageWindow {
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// `YYYY-MM-DD to YYYY-MM-DD` in the given offset
    pub fn range_label(&self, offset: FixedOffset) -> String {
        format!(
            "{} to {}",
            self.start.with_timezone(&offset).date_naive(),
            self.end.with_timezone(&offset).date_naive()
        )
    }
}

pub struct MessageStoreAdapter {
    source: SharedSource,
    credentials: Arc<dyn CredentialStore>,
    offset: FixedOffset,
    window_days: u32,
    resolve_names: bool,
}

impl MessageStoreAdapter {
    pub fn new(
        source: SharedSource,
        credentials: Arc<dyn CredentialStore>,
        config: &SourceConfig,
    ) -> Result<Self> {
        let offset = config.reference_offset().ok_or_else(|| {
            TopicError::Config(format!(
                "source.utc_offset_minutes out of range: {}",
                config.utc_offset_minutes
            ))
        })?;

        Ok(Self {
            source,
            credentials,
            offset,
            window_days: config.window_days,
            resolve_names: config.resolve_names,
        })
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    pub fn is_connected(&self, user: &UserId) -> bool {
        self.credentials.contains(user)
    }

    fn credential(&self, user: &UserId) -> Result<SecretString> {
        self.credentials.lookup(user).ok_or_else(|| {
            TopicError::NotAuthorized(format!("no message-source credential for user '{}'", user))
        })
    }

    /// Fill in defaults (`end` = now, `start` = `end` - window) and reject inverted ranges
    pub fn resolve_range(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let end = end.unwrap_or(now);
        let start = start.unwrap_or_else(|| end - Duration::days(self.window_days as i64));
        if start > end {
            return Err(TopicError::InvalidInput(format!(
                "start {} is after end {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        Ok((start, end))
    }

    pub async fn list_channels(&self, user: &UserId) -> Result<Vec<ChannelInfo>> {
        let credential = self.credential(user)?;
        self.source.list_channels(&credential).await
    }

    /// Fetch, filter and bucket one channel window
    #[instrument(skip(self), fields(source = self.source.name()))]
    pub async fn fetch_messages(
        &self,
        user: &UserId,
        channel: &ChannelId,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<MessageWindow> {
        let (start, end) = self.resolve_range(start, end, Utc::now())?;
        let credential = self.credential(user)?;

        let raw = self
            .source
            .fetch_history(&credential, channel, start, end)
            .await?;
        let fetched = raw.len();

        let mut messages = filter_messages(raw, start, end);
        if self.resolve_names {
            self.resolve_authors(&credential, &mut messages).await;
        }
        messages.sort_by_key(|m| m.timestamp);

        let buckets = bucket_by_day(messages.clone(), self.offset);
        let days = buckets.iter().map(|b| b.date).collect::<Vec<_>>();

        info!(
            "Fetched {} raw messages, kept {} across {} days",
            fetched,
            messages.len(),
            days.len()
        );

        Ok(MessageWindow {
            start,
            end,
            messages,
            days,
            buckets,
        })
    }

    /// Replace author IDs with display names; unresolved IDs are kept as is
    async fn resolve_authors(&self, credential: &SecretString, messages: &mut [Message]) {
        let mut authors: Vec<String> = messages.iter().map(|m| m.author.clone()).collect();
        authors.sort();
        authors.dedup();

        let lookups = authors.iter().map(|id| async move {
            match self.source.user_name(credential, id).await {
                Ok(Some(name)) => Some((id.clone(), name)),
                Ok(None) => None,
                Err(e) => {
                    warn!(user = %id, "Name lookup failed: {}", e);
                    None
                }
            }
        });
        let names: HashMap<String, String> = join_all(lookups).await.into_iter().flatten().collect();

        debug!("Resolved {}/{} author names", names.len(), authors.len());
        for message in messages.iter_mut() {
            if let Some(name) = names.get(&message.author) {
                message.author = name.clone();
            }
        }
    }
}

/// Keep human-authored, non-empty messages whose timestamp lies in `[start, end]`
pub fn filter_messages(raw: Vec<RawMessage>, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Message> {
    raw.into_iter()
        .filter(|r| !r.is_automated() && r.has_text())
        .filter_map(|r| {
            let Some(timestamp) = r.timestamp() else {
                warn!(ts = %r.ts, "Dropping message with unparsable timestamp");
                return None;
            };
            if timestamp < start || timestamp > end {
                return None;
            }
            let thread_ref = r.thread_ts.filter(|t| *t != r.ts);
            Some(Message {
                author: r.user.unwrap_or_default(),
                text: r.text.unwrap_or_default(),
                timestamp,
                thread_ref,
            })
        })
        .collect()
}

/// Group messages by calendar day in `offset`; buckets ascending, messages by timestamp
pub fn bucket_by_day(messages: Vec<Message>, offset: FixedOffset) -> Vec<DayBucket> {
    let mut by_day: BTreeMap<NaiveDate, Vec<Message>> = BTreeMap::new();
    for message in messages {
        let date = message.timestamp.with_timezone(&offset).date_naive();
        by_day.entry(date).or_default().push(message);
    }

    by_day
        .into_iter()
        .map(|(date, mut messages)| {
            messages.sort_by_key(|m| m.timestamp);
            DayBucket { date, messages }
        })
        .collect()
}
