//! Identifier validation for association names and relationship types.

use std::sync::OnceLock;

use regex::Regex;

const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

/// Compiled identifier pattern, `None` if compilation failed.
fn identifier_regex() -> Option<&'static Regex> {
    static IDENTIFIER: OnceLock<Option<Regex>> = OnceLock::new();
    IDENTIFIER
        .get_or_init(|| match Regex::new(IDENTIFIER_PATTERN) {
            Ok(regex) => Some(regex),
            Err(e) => {
                tracing::warn!(
                    pattern = IDENTIFIER_PATTERN,
                    error = %e,
                    "Invalid identifier pattern, rejecting all identifiers"
                );
                None
            }
        })
        .as_ref()
}

/// Check that `value` is usable as an accessor name or relationship label.
///
/// # Example
///
/// ```
/// use graphmodel_core::validate::is_identifier;
///
/// assert!(is_identifier("primary_vehicle"));
/// assert!(is_identifier("OWNS"));
/// assert!(!is_identifier("owns car"));
/// ```
pub fn is_identifier(value: &str) -> bool {
    identifier_regex().is_some_and(|regex| regex.is_match(value))
}
