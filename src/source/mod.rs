//! Message Sources
//!
//! A `MessageSource` hands back raw channel history for a credential; the
//! [`adapter::MessageStoreAdapter`] turns that into filtered, day-bucketed
//! messages for analysis.

pub mod adapter;
pub mod credentials;
pub mod slack;

pub use adapter::{MessageStoreAdapter, MessageWindow, bucket_by_day};
pub use credentials::{CredentialStore, InMemoryCredentialStore};
pub use slack::SlackSource;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;

use crate::types::{ChannelId, ChannelInfo, RawMessage, Result};

/// Chat platform access. Pagination and transport live behind this trait.
///
/// Implementations report a rejected credential as `NotAuthorized` and
/// transport failures as `SourceUnavailable`. They never retry.
#[async_trait]
pub trait MessageSource: Send + Sync {
    fn name(&self) -> &str;

    /// Channels visible to the credential (public and private)
    async fn list_channels(&self, credential: &SecretString) -> Result<Vec<ChannelInfo>>;

    /// Raw history of `channel` with `since <= ts <= until`, in any order
    async fn fetch_history(
        &self,
        credential: &SecretString,
        channel: &ChannelId,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<RawMessage>>;

    /// Display name for an author ID, if the source can resolve it
    async fn user_name(&self, _credential: &SecretString, _user: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

pub type SharedSource = Arc<dyn MessageSource>;
