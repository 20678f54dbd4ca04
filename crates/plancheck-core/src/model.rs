//! Shared checklist types: definitions, extracted records, verdicts, checklists.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::normalize::clean_display;

/// More missing fields than this marks a checklist `incomplete`.
pub const INCOMPLETE_MISSING_LIMIT: usize = 5;
/// More flagged fields than this marks a checklist `needs_review`.
pub const REVIEW_ISSUE_LIMIT: usize = 3;

/// Reference definition for one checklist field.
///
/// Loaded once per session from the definitions table and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    /// Acceptable labels for this field. Always contains `name` itself.
    pub identifiers: BTreeSet<String>,
    pub required: bool,
    pub category: String,
    /// Descriptive text from the `Definition`/`Description` column.
    #[serde(default)]
    pub definition: String,
    /// Where in the plan document this field is expected to appear.
    #[serde(default)]
    pub location: String,
}

impl FieldDefinition {
    pub fn new(name: &str) -> Self {
        let name = clean_display(name);
        let mut identifiers = BTreeSet::new();
        identifiers.insert(name.clone());
        Self {
            name,
            identifiers,
            required: false,
            category: String::new(),
            definition: String::new(),
            location: String::new(),
        }
    }

    pub fn with_identifiers<I, S>(mut self, identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for id in identifiers {
            let id = clean_display(id.as_ref());
            if !id.is_empty() {
                self.identifiers.insert(id);
            }
        }
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = clean_display(category);
        self
    }

    pub fn with_definition(mut self, definition: &str) -> Self {
        self.definition = definition.trim().to_string();
        self
    }

    pub fn with_location(mut self, location: &str) -> Self {
        self.location = clean_display(location);
        self
    }
}

/// Value of an extracted field: either the text found, or the not-found sentinel.
///
/// Serialized as a JSON string or `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum ExtractedValue {
    Found(String),
    NotFound,
}

impl ExtractedValue {
    pub fn as_found(&self) -> Option<&str> {
        match self {
            Self::Found(v) => Some(v),
            Self::NotFound => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

impl From<Option<String>> for ExtractedValue {
    fn from(v: Option<String>) -> Self {
        match v {
            Some(s) => Self::Found(s),
            None => Self::NotFound,
        }
    }
}

impl From<ExtractedValue> for Option<String> {
    fn from(v: ExtractedValue) -> Self {
        match v {
            ExtractedValue::Found(s) => Some(s),
            ExtractedValue::NotFound => None,
        }
    }
}

/// One extracted record produced by the upstream parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedField {
    pub field_name: String,
    pub value: ExtractedValue,
    /// Extraction confidence in [0, 1].
    pub confidence: f64,
    pub source_page: Option<u32>,
}

impl ExtractedField {
    pub fn found(field_name: &str, value: &str, confidence: f64) -> Self {
        Self {
            field_name: field_name.to_string(),
            value: ExtractedValue::Found(value.to_string()),
            confidence,
            source_page: None,
        }
    }

    /// Synthesized record for a defined field the parser did not report.
    pub fn not_found(field_name: &str) -> Self {
        Self {
            field_name: field_name.to_string(),
            value: ExtractedValue::NotFound,
            confidence: 0.0,
            source_page: None,
        }
    }

    pub fn on_page(mut self, page: u32) -> Self {
        self.source_page = Some(page);
        self
    }
}

/// Validator judgment for a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    /// Value exactly matches an acceptable term.
    Found,
    /// Not-found sentinel; no value was extracted.
    Missing,
    /// Value is close to an acceptable term but not equal; likely a typo.
    NeedsReview,
    /// Value is not close to any acceptable term.
    Unidentifiable,
}

impl VerdictStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Found => "found",
            Self::Missing => "missing",
            Self::NeedsReview => "needs_review",
            Self::Unidentifiable => "unidentifiable",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "found" => Some(Self::Found),
            "missing" => Some(Self::Missing),
            "needs_review" | "possible_typo" => Some(Self::NeedsReview),
            "unidentifiable" => Some(Self::Unidentifiable),
            _ => None,
        }
    }
}

impl std::fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of one validation pass over one field. Never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub status: VerdictStatus,
    pub confidence: f64,
    /// Acceptable term (display form) that scored highest, if any was compared.
    pub matched_term: Option<String>,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
}

/// One row of a checklist: the extracted record and its verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistEntry {
    pub category: String,
    pub required: bool,
    /// Position of the field in the definitions table.
    pub position: usize,
    pub extracted: ExtractedField,
    pub verdict: ValidationVerdict,
}

/// Overall review state derived from the summary counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Complete,
    NeedsReview,
    Incomplete,
}

impl OverallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::NeedsReview => "needs_review",
            Self::Incomplete => "incomplete",
        }
    }
}

/// Counters reduced from the per-field verdicts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub found_count: usize,
    pub missing_count: usize,
    pub needs_review_count: usize,
    pub unidentifiable_count: usize,
    pub required_missing_count: usize,
    /// Mean verdict confidence over all fields; 0 for an empty checklist.
    pub avg_confidence: f64,
    pub overall_status: OverallStatus,
}

impl Summary {
    pub fn tally<'a>(entries: impl IntoIterator<Item = &'a ChecklistEntry>) -> Self {
        let mut total = 0;
        let mut found_count = 0;
        let mut missing_count = 0;
        let mut needs_review_count = 0;
        let mut unidentifiable_count = 0;
        let mut required_missing_count = 0;
        let mut confidence_sum = 0.0;

        for entry in entries {
            total += 1;
            confidence_sum += entry.verdict.confidence;
            match entry.verdict.status {
                VerdictStatus::Found => found_count += 1,
                VerdictStatus::Missing => {
                    missing_count += 1;
                    if entry.required {
                        required_missing_count += 1;
                    }
                }
                VerdictStatus::NeedsReview => needs_review_count += 1,
                VerdictStatus::Unidentifiable => unidentifiable_count += 1,
            }
        }

        let avg_confidence = if total > 0 {
            confidence_sum / total as f64
        } else {
            0.0
        };

        let overall_status = if missing_count > INCOMPLETE_MISSING_LIMIT {
            OverallStatus::Incomplete
        } else if needs_review_count + unidentifiable_count > REVIEW_ISSUE_LIMIT {
            OverallStatus::NeedsReview
        } else {
            OverallStatus::Complete
        };

        Self {
            total,
            found_count,
            missing_count,
            needs_review_count,
            unidentifiable_count,
            required_missing_count,
            avg_confidence,
            overall_status,
        }
    }
}

/// A generated checklist for one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checklist {
    pub group_name: String,
    pub generated_at: DateTime<Utc>,
    /// field name → entry. Keys are exactly the defined field names.
    pub fields: BTreeMap<String, ChecklistEntry>,
    pub summary: Summary,
    /// Checklist-level warnings (unknown fields, duplicates, advisor failures).
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl Checklist {
    pub fn new(
        group_name: &str,
        generated_at: DateTime<Utc>,
        fields: BTreeMap<String, ChecklistEntry>,
        warnings: Vec<String>,
    ) -> Self {
        let summary = Summary::tally(fields.values());
        Self {
            group_name: group_name.to_string(),
            generated_at,
            fields,
            summary,
            warnings,
        }
    }

    /// Recompute the summary after entries were edited in place.
    pub fn recompute_summary(&mut self) {
        self.summary = Summary::tally(self.fields.values());
    }

    /// Entries grouped by category, categories and fields in definition order.
    pub fn sections(&self) -> Vec<(&str, Vec<(&str, &ChecklistEntry)>)> {
        let mut ordered: Vec<(&str, &ChecklistEntry)> = self
            .fields
            .iter()
            .map(|(name, entry)| (name.as_str(), entry))
            .collect();
        ordered.sort_by_key(|(_, entry)| entry.position);

        let mut sections: Vec<(&str, Vec<(&str, &ChecklistEntry)>)> = Vec::new();
        for (name, entry) in ordered {
            match sections
                .iter_mut()
                .find(|(cat, _)| *cat == entry.category.as_str())
            {
                Some((_, rows)) => rows.push((name, entry)),
                None => sections.push((entry.category.as_str(), vec![(name, entry)])),
            }
        }
        sections
    }

    /// Every warning and suggestion on the checklist, prefixed with its field name.
    pub fn flagged(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = self.warnings.clone();
        let mut suggestions = Vec::new();
        for (_, rows) in self.sections() {
            for (name, entry) in rows {
                warnings.extend(entry.verdict.warnings.iter().map(|w| format!("{name}: {w}")));
                suggestions.extend(
                    entry
                        .verdict
                        .suggestions
                        .iter()
                        .map(|s| format!("{name}: {s}")),
                );
            }
        }
        (warnings, suggestions)
    }
}

/// An extracted record named a field that has no definition.
///
/// Never fatal: the record is skipped and the error text is kept as a
/// checklist warning.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown field '{field}': no matching definition, record skipped")]
pub struct UnknownFieldError {
    pub field: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(status: VerdictStatus, confidence: f64, required: bool, position: usize) -> ChecklistEntry {
        ChecklistEntry {
            category: if position % 2 == 0 { "Group Info" } else { "Plan Details" }.into(),
            required,
            position,
            extracted: ExtractedField::not_found("x"),
            verdict: ValidationVerdict {
                status,
                confidence,
                matched_term: None,
                warnings: vec![],
                suggestions: vec![],
            },
        }
    }

    #[test]
    fn field_definition_contains_own_name() {
        let def = FieldDefinition::new(" TPA ").with_identifiers(["Claims Administrator", " "]);
        assert_eq!(def.name, "TPA");
        assert!(def.identifiers.contains("TPA"));
        assert!(def.identifiers.contains("Claims Administrator"));
        assert_eq!(def.identifiers.len(), 2);
    }

    #[test]
    fn extracted_value_json_null_for_not_found() {
        let rec = ExtractedField::not_found("COBRA");
        let json = serde_json::to_value(&rec).unwrap();
        assert!(json["value"].is_null());

        let parsed: ExtractedField = serde_json::from_value(json).unwrap();
        assert!(parsed.value.is_not_found());
    }

    #[test]
    fn extracted_value_json_string_for_found() {
        let rec = ExtractedField::found("TPA", "Plan Administrator", 0.9).on_page(3);
        let json = serde_json::to_string(&rec).unwrap();
        assert!(json.contains("\"value\":\"Plan Administrator\""));
        let parsed: ExtractedField = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.value.as_found(), Some("Plan Administrator"));
        assert_eq!(parsed.source_page, Some(3));
    }

    #[test]
    fn verdict_status_parse_accepts_variants() {
        assert_eq!(VerdictStatus::parse("Needs Review"), Some(VerdictStatus::NeedsReview));
        assert_eq!(VerdictStatus::parse("possible_typo"), Some(VerdictStatus::NeedsReview));
        assert_eq!(VerdictStatus::parse("FOUND"), Some(VerdictStatus::Found));
        assert_eq!(VerdictStatus::parse("bogus"), None);
    }

    #[test]
    fn summary_counts_and_average() {
        let entries = [
            entry(VerdictStatus::Found, 0.9, true, 0),
            entry(VerdictStatus::Missing, 0.0, true, 1),
            entry(VerdictStatus::Missing, 0.0, false, 2),
            entry(VerdictStatus::NeedsReview, 0.6, false, 3),
        ];
        let s = Summary::tally(&entries);
        assert_eq!(s.total, 4);
        assert_eq!(s.found_count, 1);
        assert_eq!(s.missing_count, 2);
        assert_eq!(s.required_missing_count, 1);
        assert_eq!(s.needs_review_count, 1);
        assert!((s.avg_confidence - 0.375).abs() < 1e-9);
        assert_eq!(s.overall_status, OverallStatus::Complete);
    }

    #[test]
    fn summary_empty() {
        let s = Summary::tally(std::iter::empty());
        assert_eq!(s.total, 0);
        assert_eq!(s.avg_confidence, 0.0);
        assert_eq!(s.overall_status, OverallStatus::Complete);
    }

    #[test]
    fn overall_status_incomplete_over_missing_limit() {
        let entries: Vec<_> = (0..6)
            .map(|i| entry(VerdictStatus::Missing, 0.0, false, i))
            .collect();
        assert_eq!(Summary::tally(&entries).overall_status, OverallStatus::Incomplete);
    }

    #[test]
    fn overall_status_needs_review_over_issue_limit() {
        let entries: Vec<_> = (0..4)
            .map(|i| entry(VerdictStatus::Unidentifiable, 0.9, false, i))
            .collect();
        assert_eq!(Summary::tally(&entries).overall_status, OverallStatus::NeedsReview);
    }

    #[test]
    fn sections_follow_definition_order() {
        let mut fields = BTreeMap::new();
        fields.insert("b".to_string(), entry(VerdictStatus::Found, 1.0, false, 1));
        fields.insert("a".to_string(), entry(VerdictStatus::Found, 1.0, false, 2));
        fields.insert("c".to_string(), entry(VerdictStatus::Found, 1.0, false, 0));
        let checklist = Checklist::new("Acme", Utc::now(), fields, vec![]);

        let sections = checklist.sections();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].0, "Group Info");
        let names: Vec<&str> = sections[0].1.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["c", "a"]);
        assert_eq!(sections[1].0, "Plan Details");
    }

    #[test]
    fn flagged_rolls_up_in_definition_order() {
        let mut late = entry(VerdictStatus::Missing, 0.0, true, 1);
        late.verdict.warnings.push("required field 'COBRA' not found".into());
        let mut early = entry(VerdictStatus::NeedsReview, 0.9, true, 0);
        early.verdict.suggestions.push("did you mean 'Administrator'?".into());
        early.verdict.warnings.push("low extraction confidence".into());

        let mut fields = BTreeMap::new();
        fields.insert("COBRA".to_string(), late);
        fields.insert("TPA".to_string(), early);
        let checklist = Checklist::new(
            "Acme",
            Utc::now(),
            fields,
            vec!["unknown field 'Dental': no matching definition, record skipped".into()],
        );

        let (warnings, suggestions) = checklist.flagged();
        assert_eq!(
            warnings,
            vec![
                "unknown field 'Dental': no matching definition, record skipped",
                "TPA: low extraction confidence",
                "COBRA: required field 'COBRA' not found",
            ]
        );
        assert_eq!(suggestions, vec!["TPA: did you mean 'Administrator'?"]);
    }

    #[test]
    fn unknown_field_error_message() {
        let err = UnknownFieldError { field: "Dental".into() };
        assert_eq!(
            err.to_string(),
            "unknown field 'Dental': no matching definition, record skipped"
        );
    }
}
