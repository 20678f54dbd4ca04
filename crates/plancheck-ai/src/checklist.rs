//! Checklist assembly: one validated entry per defined field.

use std::collections::{BTreeMap, HashMap, hash_map::Entry};

use chrono::Utc;
use plancheck_core::{
    Checklist, ChecklistEntry, ExtractedField, ExtractedValue, ReviewConfig, UnknownFieldError,
    is_not_found_marker, normalize_term,
};
use plancheck_store::{DefinitionsStore, LearningStore};
use tracing::{debug, info, warn};

use crate::validator::Validator;

/// A value changed by [`ChecklistBuilder::apply_edits`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldEdit {
    pub field: String,
    pub before: ExtractedValue,
    pub after: ExtractedValue,
}

/// Builds and re-validates checklists against one definitions reference and
/// one learning store.
pub struct ChecklistBuilder<'a> {
    definitions: &'a DefinitionsStore,
    learning: &'a LearningStore,
    validator: Validator,
    not_found_markers: Vec<String>,
}

impl<'a> ChecklistBuilder<'a> {
    pub fn new(
        definitions: &'a DefinitionsStore,
        learning: &'a LearningStore,
        config: &ReviewConfig,
    ) -> Self {
        Self {
            definitions,
            learning,
            validator: Validator::new(config.thresholds),
            not_found_markers: config.not_found_markers.clone(),
        }
    }

    /// Validate `extracted` into a checklist for `group_name`.
    ///
    /// Every defined field appears exactly once; fields the parser did not
    /// report are synthesized as not-found. Records naming an undefined field
    /// and repeated records for the same field are skipped with a checklist
    /// warning (the first record for a field wins).
    pub fn build(&self, group_name: &str, extracted: &[ExtractedField]) -> Checklist {
        let mut warnings = Vec::new();
        let mut by_field: HashMap<String, &ExtractedField> = HashMap::new();

        for record in extracted {
            let Some(def) = self.definitions.get(&record.field_name) else {
                let err = UnknownFieldError {
                    field: record.field_name.clone(),
                };
                warn!(group = group_name, "{err}");
                warnings.push(err.to_string());
                continue;
            };
            match by_field.entry(normalize_term(&def.name)) {
                Entry::Vacant(slot) => {
                    slot.insert(record);
                }
                Entry::Occupied(_) => {
                    warn!(group = group_name, field = %def.name, "duplicate record skipped");
                    warnings.push(format!(
                        "duplicate record for field '{}' skipped; first record kept",
                        def.name
                    ));
                }
            }
        }

        let mut fields = BTreeMap::new();
        for (position, def) in self.definitions.iter().enumerate() {
            let record = match by_field.get(&normalize_term(&def.name)) {
                Some(found) => ExtractedField {
                    field_name: def.name.clone(),
                    ..(*found).clone()
                },
                None => ExtractedField::not_found(&def.name),
            };
            let verdict = self.validator.validate(def, &record, self.learning);
            fields.insert(
                def.name.clone(),
                ChecklistEntry {
                    category: def.category.clone(),
                    required: def.required,
                    position,
                    extracted: record,
                    verdict,
                },
            );
        }

        let checklist = Checklist::new(group_name, Utc::now(), fields, warnings);
        info!(
            group = group_name,
            total = checklist.summary.total,
            found = checklist.summary.found_count,
            missing = checklist.summary.missing_count,
            status = checklist.summary.overall_status.as_str(),
            "built checklist"
        );
        checklist
    }

    /// Apply reviewer edits from the HTML form and re-validate.
    ///
    /// A changed value is taken as human-entered (confidence 1.0, or 0 for
    /// not-found); an empty value or a not-found marker clears the field.
    /// Every edited field is re-validated, changed or not, so newly learned
    /// synonyms take effect. Returns the values that actually changed.
    pub fn apply_edits<I, K, V>(&self, checklist: &mut Checklist, edits: I) -> Vec<FieldEdit>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut changed = Vec::new();
        for (name, value) in edits {
            let (name, value) = (name.as_ref(), value.as_ref().trim());
            let Some(def) = self.definitions.get(name) else {
                let err = UnknownFieldError {
                    field: name.to_string(),
                };
                warn!("{err}");
                checklist.warnings.push(err.to_string());
                continue;
            };
            let Some(entry) = checklist.fields.get_mut(&def.name) else {
                warn!(field = %def.name, "edited field is not part of this checklist");
                checklist
                    .warnings
                    .push(format!("field '{}' is not part of this checklist; edit ignored", def.name));
                continue;
            };

            let new_value = if is_not_found_marker(value, &self.not_found_markers) {
                ExtractedValue::NotFound
            } else {
                ExtractedValue::Found(value.to_string())
            };
            let old_value = entry.extracted.value.as_found().map(str::trim);
            if old_value != new_value.as_found() {
                debug!(field = %def.name, "value edited");
                entry.extracted.confidence = if new_value.is_not_found() { 0.0 } else { 1.0 };
                let before = std::mem::replace(&mut entry.extracted.value, new_value.clone());
                changed.push(FieldEdit {
                    field: def.name.clone(),
                    before,
                    after: new_value,
                });
            }

            entry.verdict = self.validator.validate(def, &entry.extracted, self.learning);
        }

        checklist.recompute_summary();
        info!(
            group = %checklist.group_name,
            changed = changed.len(),
            status = checklist.summary.overall_status.as_str(),
            "applied edits"
        );
        changed
    }
}
