//! Slack Web API source
//!
//! Uses `conversations.list`, `conversations.history` and `users.info` with
//! cursor pagination. Every Web API response carries an `ok` flag; `ok: false`
//! with an authentication error code is reported as `NotAuthorized`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::MessageSource;
use crate::config::SourceConfig;
use crate::types::{ChannelId, ChannelInfo, RawMessage, Result, ResultExt, TopicError};

/// Error codes meaning the token itself is unusable for the request
const AUTH_ERRORS: &[&str] = &[
    "not_authed",
    "invalid_auth",
    "token_revoked",
    "token_expired",
    "account_inactive",
    "missing_scope",
    "not_in_channel",
    "no_permission",
];

pub struct SlackSource {
    client: reqwest::Client,
    api_base: String,
    page_limit: u32,
    max_pages: u32,
    /// user ID -> display name
    names: DashMap<String, String>,
}

impl std::fmt::Debug for SlackSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackSource")
            .field("api_base", &self.api_base)
            .field("page_limit", &self.page_limit)
            .field("max_pages", &self.max_pages)
            .finish()
    }
}

impl SlackSource {
    pub fn new(config: &SourceConfig, timeout: Duration) -> Result<Self> {
        let api_base = url::Url::parse(&config.api_base)
            .map_err(|e| {
                TopicError::Config(format!("Invalid source.api_base '{}': {}", config.api_base, e))
            })?
            .as_str()
            .trim_end_matches('/')
            .to_string();

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .or_kind(TopicError::SourceUnavailable, "building HTTP client")?;

        Ok(Self {
            client,
            api_base,
            page_limit: config.page_limit,
            max_pages: config.max_pages.max(1),
            names: DashMap::new(),
        })
    }

    /// GET a Web API method and decode the success payload
    async fn call<T: DeserializeOwned>(
        &self,
        credential: &SecretString,
        method: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}/{}", self.api_base, method);
        debug!(method, "Calling Slack Web API");

        let response = self
            .client
            .get(&url)
            .bearer_auth(credential.expose_secret())
            .query(query)
            .send()
            .await
            .or_kind(TopicError::SourceUnavailable, method)?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(TopicError::NotAuthorized(format!("{}: HTTP {}", method, status)));
        }
        if !status.is_success() {
            return Err(TopicError::SourceUnavailable(format!("{}: HTTP {}", method, status)));
        }

        let body: Value = response
            .json()
            .await
            .or_kind(TopicError::SourceUnavailable, method)?;

        check_envelope(method, &body)?;
        serde_json::from_value(body).or_kind(TopicError::SourceUnavailable, method)
    }
}

/// Map `{"ok": false, "error": code}` onto the error taxonomy
fn check_envelope(method: &str, body: &Value) -> Result<()> {
    if body.get("ok").and_then(Value::as_bool) == Some(true) {
        return Ok(());
    }
    let code = body
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown_error");

    Err(if AUTH_ERRORS.contains(&code) {
        TopicError::NotAuthorized(format!("{}: {}", method, code))
    } else if code == "channel_not_found" {
        TopicError::NotFound(format!("{}: {}", method, code))
    } else {
        TopicError::SourceUnavailable(format!("{}: {}", method, code))
    })
}

/// Slack `ts` form: seconds with six fractional digits
fn format_ts(instant: DateTime<Utc>) -> String {
    format!(
        "{}.{:06}",
        instant.timestamp(),
        instant.timestamp_subsec_micros()
    )
}

fn next_cursor(meta: &Option<ResponseMetadata>) -> Option<String> {
    meta.as_ref()
        .and_then(|m| m.next_cursor.clone())
        .filter(|c| !c.is_empty())
}

#[async_trait]
impl MessageSource for SlackSource {
    fn name(&self) -> &str {
        "slack"
    }

    async fn list_channels(&self, credential: &SecretString) -> Result<Vec<ChannelInfo>> {
        let mut channels = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..self.max_pages {
            let mut query = vec![
                ("types", "public_channel,private_channel".to_string()),
                ("exclude_archived", "true".to_string()),
                ("limit", self.page_limit.to_string()),
            ];
            if let Some(c) = &cursor {
                query.push(("cursor", c.clone()));
            }

            let page: ChannelsPage = self.call(credential, "conversations.list", &query).await?;
            channels.extend(page.channels.into_iter().map(|c| ChannelInfo {
                id: c.id,
                name: c.name.unwrap_or_default(),
                is_private: c.is_private,
                member_count: c.num_members,
            }));

            cursor = next_cursor(&page.response_metadata);
            if cursor.is_none() {
                break;
            }
        }

        if cursor.is_some() {
            warn!("Channel listing truncated after {} pages", self.max_pages);
        }
        info!("Listed {} channels", channels.len());
        Ok(channels)
    }

    async fn fetch_history(
        &self,
        credential: &SecretString,
        channel: &ChannelId,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<RawMessage>> {
        let mut messages = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..self.max_pages {
            let mut query = vec![
                ("channel", channel.to_string()),
                ("oldest", format_ts(since)),
                ("latest", format_ts(until)),
                ("inclusive", "true".to_string()),
                ("limit", self.page_limit.to_string()),
            ];
            if let Some(c) = &cursor {
                query.push(("cursor", c.clone()));
            }

            let page: HistoryPage = self
                .call(credential, "conversations.history", &query)
                .await?;
            messages.extend(page.messages);

            cursor = next_cursor(&page.response_metadata);
            if !page.has_more || cursor.is_none() {
                cursor = None;
                break;
            }
        }

        // Callers treat the result as the complete window
        if cursor.is_some() {
            warn!(channel = %channel, pages = self.max_pages, "History exceeds the page limit");
            return Err(TopicError::SourceUnavailable(format!(
                "conversations.history: history truncated after {} pages",
                self.max_pages
            )));
        }
        debug!(channel = %channel, count = messages.len(), "Fetched raw history");
        Ok(messages)
    }

    async fn user_name(&self, credential: &SecretString, user: &str) -> Result<Option<String>> {
        if let Some(name) = self.names.get(user) {
            return Ok(Some(name.clone()));
        }

        let info: UserInfoPage = self
            .call(credential, "users.info", &[("user", user.to_string())])
            .await?;

        let profile = info.user.profile.unwrap_or_default();
        let name = [
            profile.display_name,
            info.user.real_name,
            profile.real_name,
            info.user.name,
        ]
        .into_iter()
        .flatten()
        .find(|n| !n.trim().is_empty());

        if let Some(name) = &name {
            self.names.insert(user.to_string(), name.clone());
        }
        Ok(name)
    }
}

// Response types

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChannelsPage {
    #[serde(default)]
    channels: Vec<SlackChannel>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct SlackChannel {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    is_private: bool,
    #[serde(default)]
    num_members: u32,
}

#[derive(Debug, Deserialize)]
struct HistoryPage {
    #[serde(default)]
    messages: Vec<RawMessage>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct UserInfoPage {
    user: SlackUser,
}

#[derive(Debug, Deserialize)]
struct SlackUser {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    real_name: Option<String>,
    #[serde(default)]
    profile: Option<SlackProfile>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackProfile {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    real_name: Option<String>,
}
