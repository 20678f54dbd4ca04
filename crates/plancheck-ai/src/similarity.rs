//! Term similarity for the validator.
//!
//! Scores are normalized Levenshtein ratios in [0, 1] computed over
//! [`normalize_term`] forms, so case and whitespace never cost anything.
//!
//! # Tie-breaking
//!
//! When several terms share the best score, the one equal to the field name
//! wins; otherwise the lexicographically smallest normalized term. The result
//! never depends on iteration order of the input.

use plancheck_core::normalize_term;

/// Similarity of two terms after normalization.
pub fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&normalize_term(a), &normalize_term(b))
}

/// Best-scoring acceptable term for a value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TermMatch<'a> {
    /// The term as supplied (display form).
    pub term: &'a str,
    pub score: f64,
}

/// Find the term most similar to `value`. `preferred` is the field name used
/// for tie-breaking. `None` only when `terms` is empty.
pub fn best_match<'a, I>(value: &str, terms: I, preferred: &str) -> Option<TermMatch<'a>>
where
    I: IntoIterator<Item = &'a str>,
{
    let value = normalize_term(value);
    let preferred = normalize_term(preferred);

    let mut best: Option<(TermMatch<'a>, String)> = None;
    for term in terms {
        let key = normalize_term(term);
        let score = strsim::normalized_levenshtein(&value, &key);
        let replace = match &best {
            None => true,
            Some((current, current_key)) => {
                score > current.score
                    || (score == current.score
                        && tie_rank(&key, &preferred) < tie_rank(current_key, &preferred))
            }
        };
        if replace {
            best = Some((TermMatch { term, score }, key));
        }
    }
    best.map(|(m, _)| m)
}

/// Lower sorts first: the field name, then lexicographic order.
fn tie_rank<'k>(key: &'k str, preferred: &str) -> (bool, &'k str) {
    (key != preferred, key)
}
