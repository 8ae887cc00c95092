//! Argument validation helpers shared by the queue API and the CLI

/// Require a non-empty (after trimming) string argument
pub fn require_non_empty(value: &str, field: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{} can not be empty", field))
    } else {
        Ok(())
    }
}

/// Require a non-empty byte payload
pub fn require_payload(payload: &[u8]) -> Result<(), String> {
    if payload.is_empty() {
        Err("message payload can not be empty".to_string())
    } else {
        Ok(())
    }
}

/// Split a `LEFT<sep>RIGHT` CLI value where both sides must be non-empty
pub fn split_pair<'a>(value: &'a str, separator: char, what: &str) -> Result<(&'a str, &'a str), String> {
    match value.split_once(separator) {
        Some((left, right)) if !left.trim().is_empty() && !right.is_empty() => {
            Ok((left.trim(), right))
        }
        _ => Err(format!(
            "'{}' is not a valid {} (expected LEFT{}RIGHT)",
            value, what, separator
        )),
    }
}
