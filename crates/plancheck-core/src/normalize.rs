//! Term normalization for field names, identifiers, synonyms and corrections.
//!
//! Learned knowledge is keyed by normalized strings, and every comparison the
//! validator makes goes through the same rule, so `"Claims  Payor "` and
//! `"claims payor"` are the same term everywhere.
//!
//! # Rule
//!
//! 1. Trim leading and trailing whitespace
//! 2. Collapse every internal whitespace run (spaces, tabs, newlines) to one space
//! 3. Unicode lowercase

/// Normalize a term into its comparison key.
///
/// Input: `"  Third  Party\tAdministrator "`
/// Output: `"third party administrator"`
pub fn normalize_term(s: &str) -> String {
    clean_display(s).to_lowercase()
}

/// Whitespace-clean a term but keep its case, for display and storage of values.
///
/// `resolve("Adminstrator")` must hand back `"Administrator"`, not a
/// case-folded key, so stored values go through this instead of
/// [`normalize_term`].
pub fn clean_display(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// True when `value` matches one of the not-found markers (case-insensitive,
/// whitespace-normalized). An empty or whitespace-only value always counts.
pub fn is_not_found_marker(value: &str, markers: &[String]) -> bool {
    let key = normalize_term(value);
    key.is_empty() || markers.iter().any(|m| normalize_term(m) == key)
}
