//! Per-field validation against the definitions reference and learned knowledge.
//!
//! # Algorithm
//!
//! 1. A not-found value is `missing` with confidence 0.
//! 2. The value is passed through learned corrections.
//! 3. Acceptable terms are the field's identifiers plus every learned synonym
//!    of the field name or of any identifier.
//! 4. The best-scoring term (see [`crate::similarity`]) decides the status:
//!    at or above the fuzzy threshold it is `found` when the terms are equal
//!    after normalization, `needs_review` otherwise; below it the value is
//!    `unidentifiable`.
//! 5. Low extraction confidence adds a warning but never changes the status.
//!
//! Validation reads the learning store and never writes to it.

use std::collections::BTreeSet;

use plancheck_core::{
    ExtractedField, ExtractedValue, FieldDefinition, Thresholds, ValidationVerdict, VerdictStatus,
    normalize_term,
};
use plancheck_store::LearningStore;

use crate::similarity::best_match;

/// How many acceptable terms an `unidentifiable` verdict lists.
const EXPECTED_TERMS_SHOWN: usize = 3;

/// Stateless field validator configured with policy thresholds.
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator {
    thresholds: Thresholds,
}

impl Validator {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Judge one extracted record. Deterministic for identical inputs.
    pub fn validate(
        &self,
        def: &FieldDefinition,
        extracted: &ExtractedField,
        learning: &LearningStore,
    ) -> ValidationVerdict {
        let mut warnings = Vec::new();
        let mut suggestions = Vec::new();

        let (status, confidence, matched_term) = match &extracted.value {
            ExtractedValue::NotFound => {
                let kind = if def.required { "required" } else { "optional" };
                warnings.push(format!("{kind} field '{}' not found", def.name));
                (VerdictStatus::Missing, 0.0, None)
            }
            ExtractedValue::Found(raw) => {
                let raw = raw.trim();
                let resolved = learning.resolve(raw);
                if resolved != raw {
                    suggestions.push(format!(
                        "learned correction applied: '{raw}' -> '{resolved}'"
                    ));
                }

                let terms = acceptable_terms(def, learning);
                let best = best_match(&resolved, terms.iter().map(String::as_str), &def.name);

                match best {
                    Some(m) if m.score >= self.thresholds.fuzzy_match => {
                        if normalize_term(m.term) == normalize_term(&resolved) {
                            (VerdictStatus::Found, extracted.confidence, Some(m.term.to_string()))
                        } else {
                            suggestions.push(format!("did you mean '{}'?", m.term));
                            (
                                VerdictStatus::NeedsReview,
                                extracted.confidence,
                                Some(m.term.to_string()),
                            )
                        }
                    }
                    other => {
                        warnings.push("term not recognized".to_string());
                        if !terms.is_empty() {
                            let shown: Vec<&str> = terms
                                .iter()
                                .take(EXPECTED_TERMS_SHOWN)
                                .map(String::as_str)
                                .collect();
                            suggestions.push(format!("expected one of: {}", shown.join(", ")));
                        }
                        (
                            VerdictStatus::Unidentifiable,
                            extracted.confidence,
                            other.map(|m| m.term.to_string()),
                        )
                    }
                }
            }
        };

        if extracted.confidence < self.thresholds.low_confidence {
            warnings.push("low extraction confidence".to_string());
        }

        ValidationVerdict {
            status,
            confidence,
            matched_term,
            warnings,
            suggestions,
        }
    }
}

/// Field name first, then the other identifiers and learned synonyms in
/// sorted order, deduplicated by normalized form.
fn acceptable_terms(def: &FieldDefinition, learning: &LearningStore) -> Vec<String> {
    let mut pool: BTreeSet<String> = def.identifiers.clone();
    pool.extend(learning.synonyms_of(&def.name));
    for id in &def.identifiers {
        pool.extend(learning.synonyms_of(id));
    }

    let mut seen = BTreeSet::new();
    let mut terms = Vec::with_capacity(pool.len() + 1);
    for term in std::iter::once(def.name.clone()).chain(pool) {
        if seen.insert(normalize_term(&term)) {
            terms.push(term);
        }
    }
    terms
}
