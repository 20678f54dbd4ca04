//! Terminal output: checklist card, definitions table, learning history.
//!
//! Each `format_*` builds the text so it can be tested; the `print_*`
//! wrappers write it to stdout.

use std::fmt;

use plancheck_core::{Checklist, VerdictStatus};
use plancheck_store::{DefinitionsStore, HistoryEntry};

use crate::render::percent;

const LABEL_WIDTH: usize = 26;

// ── Public API ──

pub fn print_checklist(checklist: &Checklist) {
    print!("{}", format_checklist(checklist));
}

pub fn print_definitions(definitions: &DefinitionsStore) {
    print!("{}", format_definitions(definitions));
}

pub fn print_history(entries: &[HistoryEntry]) {
    print!("{}", format_history(entries));
}

/// Checklist as a vertical card: summary, then one section per category.
pub fn format_checklist(checklist: &Checklist) -> String {
    ChecklistCard(checklist).to_string()
}

pub fn format_definitions(definitions: &DefinitionsStore) -> String {
    DefinitionsListing(definitions).to_string()
}

pub fn format_history(entries: &[HistoryEntry]) -> String {
    if entries.is_empty() {
        return "No learning history yet.\n".to_string();
    }
    HistoryListing(entries).to_string()
}

// ── Checklist card ──

struct ChecklistCard<'a>(&'a Checklist);

impl fmt::Display for ChecklistCard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let checklist = self.0;
        let s = &checklist.summary;

        writeln!(f, "=== {} ===", checklist.group_name)?;
        writeln!(
            f,
            "Generated {}\n",
            checklist.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        )?;

        writeln!(f, "Summary")?;
        for (label, value) in [
            ("overall_status", s.overall_status.as_str().to_string()),
            ("total", s.total.to_string()),
            ("found", s.found_count.to_string()),
            (
                "missing",
                format!("{} ({} required)", s.missing_count, s.required_missing_count),
            ),
            ("needs_review", s.needs_review_count.to_string()),
            ("unidentifiable", s.unidentifiable_count.to_string()),
            ("avg_confidence", percent(s.avg_confidence)),
        ] {
            writeln!(f, "  {label:<LABEL_WIDTH$} {value}")?;
        }
        writeln!(f)?;

        for (category, rows) in checklist.sections() {
            writeln!(f, "{}", if category.is_empty() { "Fields" } else { category })?;
            for (name, entry) in rows {
                let value = entry.extracted.value.as_found().unwrap_or("N/F");
                let label = if entry.required {
                    format!("{name} *")
                } else {
                    name.to_string()
                };
                writeln!(
                    f,
                    "  {:<LABEL_WIDTH$} {} {}  {}",
                    label,
                    marker(entry.verdict.status),
                    value,
                    percent(entry.verdict.confidence)
                )?;
                for w in &entry.verdict.warnings {
                    writeln!(f, "  {:<LABEL_WIDTH$}   ! {w}", "")?;
                }
                for sug in &entry.verdict.suggestions {
                    writeln!(f, "  {:<LABEL_WIDTH$}   > {sug}", "")?;
                }
            }
            writeln!(f)?;
        }

        if !checklist.warnings.is_empty() {
            writeln!(f, "Warnings")?;
            for w in &checklist.warnings {
                writeln!(f, "  {w}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

fn marker(status: VerdictStatus) -> &'static str {
    match status {
        VerdictStatus::Found => "[ok]",
        VerdictStatus::Missing => "[--]",
        VerdictStatus::NeedsReview => "[??]",
        VerdictStatus::Unidentifiable => "[!!]",
    }
}

// ── Definitions ──

struct DefinitionsListing<'a>(&'a DefinitionsStore);

impl fmt::Display for DefinitionsListing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let definitions = self.0;
        writeln!(
            f,
            "{} fields ({} required)\n",
            definitions.len(),
            definitions.required_count()
        )?;
        for def in definitions.iter() {
            writeln!(
                f,
                "{}{}",
                def.name,
                if def.required { " (required)" } else { "" }
            )?;
            if !def.category.is_empty() {
                writeln!(f, "  {:<LABEL_WIDTH$} {}", "category", def.category)?;
            }
            let others: Vec<&str> = def
                .identifiers
                .iter()
                .filter(|id| **id != def.name)
                .map(String::as_str)
                .collect();
            if !others.is_empty() {
                writeln!(f, "  {:<LABEL_WIDTH$} {}", "identifiers", others.join(", "))?;
            }
            if !def.location.is_empty() {
                writeln!(f, "  {:<LABEL_WIDTH$} {}", "location", def.location)?;
            }
            if !def.definition.is_empty() {
                writeln!(f, "  {:<LABEL_WIDTH$} {}", "definition", def.definition)?;
            }
        }
        Ok(())
    }
}

// ── History ──

struct HistoryListing<'a>(&'a [HistoryEntry]);

impl fmt::Display for HistoryListing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for e in self.0 {
            writeln!(
                f,
                "{}  {:<17} {} -> {}  ({})",
                e.timestamp,
                e.action.as_str(),
                e.term,
                e.value,
                e.actor
            )?;
        }
        Ok(())
    }
}
