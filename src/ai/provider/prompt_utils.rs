//! Prompt helpers for providers without a separate system channel.

use serde_json::Value;

/// Append JSON schema instructions to a prompt; a null schema leaves it as is.
pub fn build_schema_prompt(prompt: &str, schema: &Value) -> String {
    if schema.is_null() {
        return prompt.to_string();
    }
    format!(
        "{}\n\nAnswer with one JSON object matching this schema and nothing else:\n{}",
        prompt, schema
    )
}
