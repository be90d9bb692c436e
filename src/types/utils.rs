//! Shared utility functions.
//!
//! ## JSON Extraction Helpers
//!
//! Strict helpers for reading provider payloads out of `serde_json::Value`:
//! unlike lenient defaults, these return `None` when the shape is wrong so the
//! caller can surface a contract violation.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};

use crate::types::{Result, TopicError};

// =============================================================================
// JSON Value Extraction Helpers
// =============================================================================

/// Extract string from JSON value by key.
#[inline]
pub fn json_string(value: &serde_json::Value, key: &str) -> Option<String> {
    value.get(key)?.as_str().map(String::from)
}

/// Extract a string array by key.
///
/// Returns `None` if the key is missing, is not an array, or holds any
/// non-string element.
pub fn json_string_array(value: &serde_json::Value, key: &str) -> Option<Vec<String>> {
    value
        .get(key)?
        .as_array()?
        .iter()
        .map(|s| s.as_str().map(String::from))
        .collect()
}

// =============================================================================
// String Utilities
// =============================================================================

/// Truncate to at most `max` characters, appending an ellipsis when cut
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

// =============================================================================
// Date Parsing
// =============================================================================

/// Parse an RFC 3339 instant or a bare `YYYY-MM-DD` date.
///
/// Bare dates resolve to midnight in the given reference offset.
pub fn parse_instant(input: &str, offset: FixedOffset) -> Result<DateTime<Utc>> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(input, "%Y-%m-%d").map_err(|_| {
        TopicError::InvalidInput(format!(
            "'{}' is neither an RFC 3339 timestamp nor a YYYY-MM-DD date",
            input
        ))
    })?;

    offset
        .from_local_datetime(&date.and_time(chrono::NaiveTime::MIN))
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| TopicError::InvalidInput(format!("ambiguous local date: {}", input)))
}
