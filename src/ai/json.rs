//! JSON extraction from model output.
//!
//! Chat models wrap JSON in code fences, prepend explanations, or leave a
//! trailing comma behind. This module recovers the JSON value in those cases
//! and nothing more: truncated or structurally broken output is an error so
//! the calling stage can report a contract violation.

use serde_json::Value;
use tracing::{debug, warn};

use crate::types::{Result, TopicError, truncate_chars};

/// Parse a JSON value out of raw model output.
pub fn extract_json_from_response(content: &str) -> Result<Value> {
    extract_json(content).map(|(value, _)| value)
}

/// Parse a JSON value, reporting whether any cleanup beyond trimming was needed
pub fn extract_json(raw: &str) -> Result<(Value, bool)> {
    let cleaned = strip_code_fences(raw.trim().trim_start_matches('\u{feff}'));

    if let Ok(value) = serde_json::from_str::<Value>(cleaned) {
        return Ok((value, false));
    }
    debug!("Direct JSON parse failed, trying cleanup");

    let without_commas = remove_trailing_commas(cleaned);
    if let Ok(value) = serde_json::from_str::<Value>(&without_commas) {
        warn!("Model output contained trailing commas");
        return Ok((value, true));
    }

    if let Some(embedded) = first_balanced_block(&without_commas)
        && let Ok(value) = serde_json::from_str::<Value>(embedded)
    {
        warn!("JSON extracted from surrounding prose");
        return Ok((value, true));
    }

    Err(TopicError::LlmApi(format!(
        "model output is not valid JSON: {}",
        truncate_chars(cleaned, 200)
    )))
}

/// Strip a surrounding ```json ... ``` fence
fn strip_code_fences(s: &str) -> &str {
    let mut out = s;
    if out.starts_with("```")
        && let Some(newline) = out.find('\n')
    {
        out = &out[newline + 1..];
    }
    if let Some(stripped) = out.trim_end().strip_suffix("```") {
        out = stripped;
    }
    out.trim()
}

/// Drop commas directly followed (modulo whitespace) by `]` or `}` outside strings
fn remove_trailing_commas(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut in_string = false;
    let mut escape = false;

    for (i, &ch) in chars.iter().enumerate() {
        if escape {
            escape = false;
            out.push(ch);
            continue;
        }
        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            ',' if !in_string => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if matches!(next, Some(']') | Some('}')) {
                    continue;
                }
            }
            _ => {}
        }
        out.push(ch);
    }

    out
}

/// First complete `{...}` or `[...]` block, honoring string literals
fn first_balanced_block(s: &str) -> Option<&str> {
    let start = s.find(['{', '['])?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape = false;

    for (i, ch) in s[start..].char_indices() {
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            '{' | '[' if !in_string => depth += 1,
            '}' | ']' if !in_string => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&s[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }

    None
}
