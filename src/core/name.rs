//! Document name policy

use std::sync::OnceLock;

use regex_lite::Regex;

/// Name of the scratch document. It can be loaded and reset but never saved.
pub const DEFAULT_DOCUMENT: &str = "default";

/// Placeholder name the editor shows for a document that was never named.
pub const UNTITLED_DOCUMENT: &str = "Untitled";

/// Longest accepted name, in characters.
pub const MAX_NAME_LEN: usize = 30;

fn allowed_chars() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z0-9\- ]*$").expect("name pattern is valid"))
}

/// Check a proposed document name.
///
/// Leading and trailing whitespace is ignored. Reserved names, empty names,
/// names longer than [`MAX_NAME_LEN`] and names with characters outside
/// letters, digits, `-` and space are rejected.
#[allow(dead_code)]
pub fn validate_name(candidate: &str) -> bool {
    normalize_name(candidate).is_some()
}

/// Trimmed form of `candidate` if it passes [`validate_name`].
pub fn normalize_name(candidate: &str) -> Option<&str> {
    let name = candidate.trim();
    if name == DEFAULT_DOCUMENT || name == UNTITLED_DOCUMENT {
        return None;
    }
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return None;
    }
    if !allowed_chars().is_match(name) {
        return None;
    }
    Some(name)
}

/// Whether `name` refers to the scratch document
pub fn is_reserved(name: &str) -> bool {
    name == DEFAULT_DOCUMENT
}
