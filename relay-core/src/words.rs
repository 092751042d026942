//! Word dedup: the processing node's transformation of each client message.

use std::collections::HashSet;

/// Keep each whitespace-delimited token once and join the survivors with single spaces.
/// Tokens compare by exact string match. Output order is first occurrence, but callers
/// must treat it as unspecified and compare token sets.
pub fn process_data(message: &str) -> String {
    let mut seen = HashSet::new();
    let mut out = String::with_capacity(message.len());
    for word in message.split_whitespace() {
        if !seen.insert(word) {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

/// True iff the message carries at least one token.
/// Whitespace-only input is rejected: its dedup result would be an empty frame.
pub fn validate_data(message: &str) -> bool {
    message.split_whitespace().next().is_some()
}

/// Payload check applied by the processing node before dedup.
pub fn validate_payload(payload: &[u8]) -> Result<&str, ValidationError> {
    let text = std::str::from_utf8(payload).map_err(|_| ValidationError::NotUtf8)?;
    if !validate_data(text) {
        return Err(ValidationError::Empty);
    }
    Ok(text)
}

/// Message rejected before processing. The node skips it without an ack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("message has no words")]
    Empty,
    #[error("message is not valid UTF-8")]
    NotUtf8,
}
