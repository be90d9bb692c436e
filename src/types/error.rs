//! Unified Error Type System
//!
//! Centralized error types for the whole crate.
//!
//! ## Taxonomy
//!
//! - **NotAuthorized**: missing or rejected credential (terminal, no retry)
//! - **SourceUnavailable**: message source transport failure (caller may retry the fetch)
//! - **ClassificationFailed / SummarizationFailed / SuggestionFailed**: provider
//!   error or contract violation, terminal per call
//!
//! A zero-message window or a zero-match cell is a valid state and never an error.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Error Kind
// =============================================================================

/// Cloneable projection of [`TopicError`] used in session state and API bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotAuthorized,
    SourceUnavailable,
    ClassificationFailed,
    SummarizationFailed,
    SuggestionFailed,
    InvalidInput,
    NotFound,
    Cancelled,
    Timeout,
    Config,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotAuthorized => "NOT_AUTHORIZED",
            Self::SourceUnavailable => "SOURCE_UNAVAILABLE",
            Self::ClassificationFailed => "CLASSIFICATION_FAILED",
            Self::SummarizationFailed => "SUMMARIZATION_FAILED",
            Self::SuggestionFailed => "SUGGESTION_FAILED",
            Self::InvalidInput => "INVALID_INPUT",
            Self::NotFound => "NOT_FOUND",
            Self::Cancelled => "CANCELLED",
            Self::Timeout => "TIMEOUT",
            Self::Config => "CONFIG",
            Self::Internal => "INTERNAL",
        };
        write!(f, "{}", s)
    }
}

impl ErrorKind {
    /// Whether the failure came from the text-intelligence provider
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            Self::ClassificationFailed | Self::SummarizationFailed | Self::SuggestionFailed
        )
    }

    /// Whether the caller may reasonably retry the whole operation
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SourceUnavailable | Self::Timeout | Self::Cancelled
        ) || self.is_provider_failure()
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum TopicError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Message Source Errors
    // -------------------------------------------------------------------------
    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Message source unavailable: {0}")]
    SourceUnavailable(String),

    // -------------------------------------------------------------------------
    // Text-Intelligence Errors
    // -------------------------------------------------------------------------
    /// Raw provider transport/API failure, before it is attributed to a stage
    #[error("LLM API error: {0}")]
    LlmApi(String),

    #[error("Topic classification failed: {0}")]
    ClassificationFailed(String),

    #[error("Summarization failed: {0}")]
    SummarizationFailed(String),

    #[error("Ticket suggestion failed: {0}")]
    SuggestionFailed(String),

    // -------------------------------------------------------------------------
    // Control Flow
    // -------------------------------------------------------------------------
    #[error("Timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    #[error("Cancelled: {0}")]
    Cancelled(String),

    // -------------------------------------------------------------------------
    // Domain Errors
    // -------------------------------------------------------------------------
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, TopicError>;

// =============================================================================
// Helper Functions
// =============================================================================

impl TopicError {
    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotAuthorized(_) => ErrorKind::NotAuthorized,
            Self::SourceUnavailable(_) => ErrorKind::SourceUnavailable,
            Self::ClassificationFailed(_) => ErrorKind::ClassificationFailed,
            Self::SummarizationFailed(_) => ErrorKind::SummarizationFailed,
            Self::SuggestionFailed(_) => ErrorKind::SuggestionFailed,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Cancelled(_) => ErrorKind::Cancelled,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Config(_) => ErrorKind::Config,
            Self::Io(_) | Self::Json(_) | Self::LlmApi(_) => ErrorKind::Internal,
        }
    }

    /// Rebuild an error from its projected kind, e.g. for a failure recorded in cell state
    pub fn from_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::NotAuthorized => Self::NotAuthorized(message),
            ErrorKind::SourceUnavailable => Self::SourceUnavailable(message),
            ErrorKind::ClassificationFailed => Self::ClassificationFailed(message),
            ErrorKind::SummarizationFailed => Self::SummarizationFailed(message),
            ErrorKind::SuggestionFailed => Self::SuggestionFailed(message),
            ErrorKind::InvalidInput => Self::InvalidInput(message),
            ErrorKind::NotFound => Self::NotFound(message),
            ErrorKind::Cancelled => Self::Cancelled(message),
            ErrorKind::Timeout => Self::timeout(message, Duration::ZERO),
            ErrorKind::Config => Self::Config(message),
            ErrorKind::Internal => Self::LlmApi(message),
        }
    }

    /// Message without the variant's display prefix; `from_kind(kind(), detail())`
    /// displays the same as the original
    pub fn detail(&self) -> String {
        match self {
            Self::NotAuthorized(m)
            | Self::SourceUnavailable(m)
            | Self::LlmApi(m)
            | Self::ClassificationFailed(m)
            | Self::SummarizationFailed(m)
            | Self::SuggestionFailed(m)
            | Self::Cancelled(m)
            | Self::InvalidInput(m)
            | Self::NotFound(m)
            | Self::Config(m) => m.clone(),
            Self::Timeout { operation, duration } => format!("{} ({:?})", operation, duration),
            Self::Io(e) => e.to_string(),
            Self::Json(e) => e.to_string(),
        }
    }

    /// Re-attribute a provider error to the stage that issued the call.
    ///
    /// Stage errors pass through unchanged; everything else is wrapped with `wrap`.
    pub fn attribute(self, wrap: fn(String) -> TopicError) -> Self {
        match self {
            Self::ClassificationFailed(_)
            | Self::SummarizationFailed(_)
            | Self::SuggestionFailed(_)
            | Self::Timeout { .. }
            | Self::Cancelled(_) => self,
            other => wrap(other.to_string()),
        }
    }
}

/// Context extension trait for mapping foreign errors into a taxonomy variant
pub trait ResultExt<T> {
    /// Wrap the error message with context using the given variant constructor
    fn or_kind<C: Into<String>>(self, wrap: fn(String) -> TopicError, context: C) -> Result<T>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ResultExt<T> for std::result::Result<T, E> {
    fn or_kind<C: Into<String>>(self, wrap: fn(String) -> TopicError, context: C) -> Result<T> {
        self.map_err(|e| wrap(format!("{}: {}", context.into(), e)))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::NotAuthorized.to_string(), "NOT_AUTHORIZED");
        assert_eq!(ErrorKind::SuggestionFailed.to_string(), "SUGGESTION_FAILED");
    }

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(
            TopicError::NotAuthorized("no token".into()).kind(),
            ErrorKind::NotAuthorized
        );
        assert_eq!(
            TopicError::timeout("summarize", Duration::from_secs(1)).kind(),
            ErrorKind::Timeout
        );
        assert_eq!(TopicError::LlmApi("boom".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_from_kind_roundtrips_kind() {
        for kind in [
            ErrorKind::NotAuthorized,
            ErrorKind::SummarizationFailed,
            ErrorKind::Timeout,
            ErrorKind::Cancelled,
        ] {
            assert_eq!(TopicError::from_kind(kind, "x").kind(), kind);
        }
    }

    #[test]
    fn test_detail_rebuilds_without_doubled_prefix() {
        let original = TopicError::SummarizationFailed("provider returned 503".into());
        let rebuilt = TopicError::from_kind(original.kind(), original.detail());
        assert_eq!(rebuilt.to_string(), original.to_string());
        assert_eq!(rebuilt.to_string(), "Summarization failed: provider returned 503");
    }

    #[test]
    fn test_retryable() {
        assert!(ErrorKind::SourceUnavailable.is_retryable());
        assert!(ErrorKind::SummarizationFailed.is_retryable());
        assert!(!ErrorKind::NotAuthorized.is_retryable());
        assert!(!ErrorKind::InvalidInput.is_retryable());
    }

    #[test]
    fn test_attribute_wraps_raw_provider_errors() {
        let err = TopicError::LlmApi("503 from upstream".into())
            .attribute(TopicError::SummarizationFailed);
        assert_eq!(err.kind(), ErrorKind::SummarizationFailed);
        assert!(err.to_string().contains("503 from upstream"));

        let kept = TopicError::SuggestionFailed("missing field".into())
            .attribute(TopicError::SummarizationFailed);
        assert_eq!(kept.kind(), ErrorKind::SuggestionFailed);
    }

    #[test]
    fn test_result_ext_or_kind() {
        let raw: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::other("connection reset"));
        let err = raw
            .or_kind(TopicError::SourceUnavailable, "fetching history")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
        assert_eq!(
            err.to_string(),
            "Message source unavailable: fetching history: connection reset"
        );
    }
}
