//! Global Constants
//!
//! Centralized constants for configuration and tuning.

/// Network and provider defaults
pub mod network {
    /// Default provider request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

    /// Default timeout applied by callers around a single cell pipeline (seconds)
    pub const DEFAULT_INSIGHT_TIMEOUT_SECS: u64 = 120;

    /// Default HTTP bind address
    pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
}

/// Message source defaults
pub mod source {
    /// Slack Web API base
    pub const DEFAULT_API_BASE: &str = "https://slack.com/api";

    /// Window length used when no start date is supplied
    pub const DEFAULT_WINDOW_DAYS: u32 = 7;

    /// Page size for history and channel listing
    pub const DEFAULT_PAGE_LIMIT: u32 = 100;

    /// Upper bound on pages followed per call
    pub const DEFAULT_MAX_PAGES: u32 = 50;

    /// HTTP timeout for one Web API request (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Identity used when no caller identity is supplied
    pub const DEFAULT_USER_ID: &str = "local";
}

/// Analysis tuning
pub mod analysis {
    /// Upper bound on the discovered topic vocabulary
    pub const DEFAULT_MAX_TOPICS: usize = 12;

    /// Maximum characters of a topic label kept after normalization
    pub const MAX_LABEL_CHARS: usize = 64;
}
