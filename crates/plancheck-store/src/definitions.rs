//! Definitions reference: the fields a checklist tracks and their acceptable labels.
//!
//! Built from a table with columns `Field`/`Term`, `Definition`/`Description`,
//! and optional `Required`, `Category`, `Identifiers`, `Location`. Read-only
//! after load.

use std::collections::HashMap;
use std::path::Path;

use plancheck_core::{FieldDefinition, normalize_term};
use tracing::info;

use crate::StoreError;
use crate::table::{Table, cell};

const FIELD_COLUMN: &[&str] = &["Field", "Term"];
const DEFINITION_COLUMN: &[&str] = &["Definition", "Description"];
const REQUIRED_COLUMN: &[&str] = &["Required"];
const CATEGORY_COLUMN: &[&str] = &["Category", "Section"];
const IDENTIFIERS_COLUMN: &[&str] = &["Identifiers", "Synonyms", "Aliases"];
const LOCATION_COLUMN: &[&str] = &["Location"];

/// Identifier lists are split on these. Commas are left alone: `$20,000` is a
/// legitimate identifier.
const IDENTIFIER_SEPARATORS: &[char] = &[';', '|'];

/// Field definitions keyed by normalized field name, kept in source order.
#[derive(Debug, Clone, Default)]
pub struct DefinitionsStore {
    defs: Vec<FieldDefinition>,
    index: HashMap<String, usize>,
}

impl DefinitionsStore {
    /// Load definitions from a CSV or spreadsheet file.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let table = Table::read(path)?;
        let store = Self::from_table(&table)?;
        info!(count = store.len(), path = %path.display(), "loaded definitions");
        Ok(store)
    }

    /// Build the store from an already-read table.
    ///
    /// Fails when the field or definition column is absent, a field name is
    /// blank, a field is defined twice, or `Required` is not boolean-like.
    pub fn from_table(table: &Table) -> Result<Self, StoreError> {
        let field_col = table.require_column(FIELD_COLUMN)?;
        let definition_col = table.require_column(DEFINITION_COLUMN)?;
        let required_col = table.column(REQUIRED_COLUMN);
        let category_col = table.column(CATEGORY_COLUMN);
        let identifiers_col = table.column(IDENTIFIERS_COLUMN);
        let location_col = table.column(LOCATION_COLUMN);

        let mut store = Self::default();
        for (row, cells) in table.rows() {
            let name = cell(cells, Some(field_col));
            if name.is_empty() {
                return Err(table.format_error(format!("row {row}: empty field name")));
            }

            let required_raw = cell(cells, required_col);
            let required = parse_required(required_raw).ok_or_else(|| {
                table.format_error(format!(
                    "row {row}: column 'Required' has unrecognized value '{required_raw}'"
                ))
            })?;

            let def = FieldDefinition::new(name)
                .with_definition(cell(cells, Some(definition_col)))
                .with_category(cell(cells, category_col))
                .with_location(cell(cells, location_col))
                .with_identifiers(cell(cells, identifiers_col).split(IDENTIFIER_SEPARATORS))
                .required(required);

            if store.index.contains_key(&normalize_term(&def.name)) {
                return Err(table.format_error(format!(
                    "row {row}: field '{}' is defined more than once",
                    def.name
                )));
            }
            store.push(def);
        }

        Ok(store)
    }

    /// Build a store from definitions constructed in code. Later duplicates
    /// (by normalized name) are ignored.
    pub fn from_definitions(defs: impl IntoIterator<Item = FieldDefinition>) -> Self {
        let mut store = Self::default();
        for def in defs {
            if !store.index.contains_key(&normalize_term(&def.name)) {
                store.push(def);
            }
        }
        store
    }

    fn push(&mut self, def: FieldDefinition) {
        self.index.insert(normalize_term(&def.name), self.defs.len());
        self.defs.push(def);
    }

    /// Look up a definition. The name is normalized first, so `" tpa "` finds `TPA`.
    pub fn get(&self, field_name: &str) -> Option<&FieldDefinition> {
        self.index
            .get(&normalize_term(field_name))
            .map(|&i| &self.defs[i])
    }

    /// Position of a field in source order.
    pub fn position(&self, field_name: &str) -> Option<usize> {
        self.index.get(&normalize_term(field_name)).copied()
    }

    /// Definitions in source order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.defs.iter()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Number of required fields.
    pub fn required_count(&self) -> usize {
        self.defs.iter().filter(|d| d.required).count()
    }
}

/// Parse a boolean-like `Required` cell. Blank means not required.
fn parse_required(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "" | "no" | "n" | "false" | "f" | "0" | "optional" => Some(false),
        "yes" | "y" | "true" | "t" | "1" | "x" | "required" | "mandatory" => Some(true),
        _ => None,
    }
}
