//! Deterministic ticket channel names

use super::User;
use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{Alphabetic}\p{Nd}_-]").expect("valid regex"));

/// Normalize a username the way the platform normalizes channel names
///
/// Lowercases, turns whitespace runs into `-` and drops anything that is not
/// alphanumeric, `-` or `_`. Returns an empty string when nothing survives.
pub fn normalize_username(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let dashed = WHITESPACE.replace_all(&lowered, "-");
    DISALLOWED.replace_all(&dashed, "").into_owned()
}

/// Channel name of the ticket owned by `user`
///
/// Falls back to the numeric user id when the name normalizes to nothing.
pub fn ticket_channel_name(prefix: &str, user: &User) -> String {
    let normalized = normalize_username(&user.name);
    if normalized.is_empty() {
        format!("{prefix}{}", user.id)
    } else {
        format!("{prefix}{normalized}")
    }
}
