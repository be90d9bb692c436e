//! Credential lookup.
//!
//! The analysis core only ever reads credentials. How they get into the store
//! (startup config, an external authorization flow) is the owner's business.

use dashmap::DashMap;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::types::UserId;

/// Read-only view of per-user message-source credentials
pub trait CredentialStore: Send + Sync {
    fn lookup(&self, user: &UserId) -> Option<SecretString>;

    fn contains(&self, user: &UserId) -> bool {
        self.lookup(user).is_some()
    }
}

/// Concurrent in-memory store. Populated explicitly; never a global.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    tokens: DashMap<UserId, SecretString>,
}

impl std::fmt::Debug for InMemoryCredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCredentialStore")
            .field("users", &self.tokens.len())
            .finish()
    }
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with one token for `user`, if a token is given
    pub fn seeded(user: UserId, token: Option<String>) -> Self {
        let store = Self::new();
        if let Some(token) = token {
            store.insert(user, token);
        }
        store
    }

    /// Associate a token with a user, replacing any previous one. Blank tokens are ignored.
    pub fn insert(&self, user: UserId, token: impl Into<String>) {
        let token = token.into();
        if token.trim().is_empty() {
            return;
        }
        debug!(user = %user, "Storing credential");
        self.tokens.insert(user, SecretString::from(token));
    }

    pub fn remove(&self, user: &UserId) -> bool {
        self.tokens.remove(user).is_some()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn lookup(&self, user: &UserId) -> Option<SecretString> {
        self.tokens
            .get(user)
            .map(|t| SecretString::from(t.expose_secret().to_string()))
    }

    fn contains(&self, user: &UserId) -> bool {
        self.tokens.contains_key(user)
    }
}
