//! Extracted-data loader: one record per field from the upstream parser's table.
//!
//! Expected columns: `Field`, `Extracted_Value`, `Confidence`, `Page_Number`,
//! and optionally `Group_Name` for combined files holding several groups.

use std::path::Path;

use plancheck_core::{ExtractedField, ExtractedValue, clean_display, is_not_found_marker, normalize_term};
use tracing::{info, warn};

use crate::StoreError;
use crate::table::{Table, cell};

const FIELD_COLUMN: &[&str] = &["Field"];
const VALUE_COLUMN: &[&str] = &["Extracted_Value", "Value"];
const CONFIDENCE_COLUMN: &[&str] = &["Confidence"];
const PAGE_COLUMN: &[&str] = &["Page_Number", "Page"];
const GROUP_COLUMN: &[&str] = &["Group_Name", "Group"];

/// Load extracted records from a CSV or spreadsheet file.
pub fn load_extracted_file(
    path: &Path,
    group: Option<&str>,
    not_found_markers: &[String],
) -> Result<Vec<ExtractedField>, StoreError> {
    let table = Table::read(path)?;
    let records = load_extracted(&table, group, not_found_markers)?;
    info!(count = records.len(), path = %path.display(), group = group.unwrap_or("*"), "loaded extracted data");
    Ok(records)
}

/// Parse extracted records from a table.
///
/// When the table has a group column and `group` is given, only that group's
/// rows are returned. Values matching a not-found marker become
/// [`ExtractedValue::NotFound`]. A confidence outside [0, 1] or a malformed
/// page number is a format error naming the row.
pub fn load_extracted(
    table: &Table,
    group: Option<&str>,
    not_found_markers: &[String],
) -> Result<Vec<ExtractedField>, StoreError> {
    let field_col = table.require_column(FIELD_COLUMN)?;
    let value_col = table.require_column(VALUE_COLUMN)?;
    let confidence_col = table.column(CONFIDENCE_COLUMN);
    let page_col = table.column(PAGE_COLUMN);
    let group_col = table.column(GROUP_COLUMN);

    if group.is_some() && group_col.is_none() {
        warn!(origin = table.origin(), "no group column; using every row");
    }
    let wanted = group.map(normalize_term);

    let mut records = Vec::new();
    for (row, cells) in table.rows() {
        if let (Some(want), Some(_)) = (&wanted, group_col)
            && normalize_term(cell(cells, group_col)) != *want
        {
            continue;
        }

        let field_name = clean_display(cell(cells, Some(field_col)));
        if field_name.is_empty() {
            return Err(table.format_error(format!("row {row}: empty field name")));
        }

        let raw_value = cell(cells, Some(value_col));
        let value = if is_not_found_marker(raw_value, not_found_markers) {
            ExtractedValue::NotFound
        } else {
            ExtractedValue::Found(raw_value.to_string())
        };

        let raw_confidence = cell(cells, confidence_col);
        let confidence = parse_confidence(raw_confidence).ok_or_else(|| {
            table.format_error(format!(
                "row {row}: column 'Confidence' must be a number in [0, 1], got '{raw_confidence}'"
            ))
        })?;

        let raw_page = cell(cells, page_col);
        let source_page = parse_page(raw_page).ok_or_else(|| {
            table.format_error(format!(
                "row {row}: column 'Page_Number' must be a whole number or blank, got '{raw_page}'"
            ))
        })?;

        records.push(ExtractedField {
            field_name,
            value,
            confidence,
            source_page,
        });
    }

    Ok(records)
}

/// Distinct group names in a combined file, in first-seen order.
pub fn group_names(table: &Table) -> Vec<String> {
    let Some(col) = table.column(GROUP_COLUMN) else {
        return Vec::new();
    };
    let mut names: Vec<String> = Vec::new();
    for (_, cells) in table.rows() {
        let name = clean_display(cell(cells, Some(col)));
        if !name.is_empty() && !names.iter().any(|n| normalize_term(n) == normalize_term(&name)) {
            names.push(name);
        }
    }
    names
}

/// Blank means 0. A trailing `%` is accepted (`95%` -> 0.95).
fn parse_confidence(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return Some(0.0);
    }
    let value = match s.strip_suffix('%') {
        Some(pct) => pct.trim().parse::<f64>().ok()? / 100.0,
        None => s.parse::<f64>().ok()?,
    };
    (0.0..=1.0).contains(&value).then_some(value)
}

/// Outer `None` is a parse failure; `Some(None)` is a blank cell.
fn parse_page(s: &str) -> Option<Option<u32>> {
    let s = s.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("nan") || s.eq_ignore_ascii_case("none") {
        return Some(None);
    }
    let n: f64 = s.parse().ok()?;
    if n < 0.0 || n.fract() != 0.0 || n > u32::MAX as f64 {
        return None;
    }
    Some(Some(n as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markers() -> Vec<String> {
        vec!["N/F".to_string(), "Not Found".to_string()]
    }

    fn table(text: &str) -> Table {
        Table::from_csv_reader("extracted.csv", text.as_bytes(), b',').unwrap()
    }

    #[test]
    fn parses_records() {
        let t = table(
            "Field,Extracted_Value,Confidence,Page_Number\n\
             TPA,BluePeak Benefits Solutions,0.90,1\n\
             COBRA,N/F,0.0,\n\
             Retirees,Not Found,,4\n",
        );
        let recs = load_extracted(&t, None, &markers()).unwrap();
        assert_eq!(recs.len(), 3);

        assert_eq!(recs[0].field_name, "TPA");
        assert_eq!(recs[0].value.as_found(), Some("BluePeak Benefits Solutions"));
        assert_eq!(recs[0].confidence, 0.90);
        assert_eq!(recs[0].source_page, Some(1));

        assert!(recs[1].value.is_not_found());
        assert_eq!(recs[1].source_page, None);

        assert!(recs[2].value.is_not_found());
        assert_eq!(recs[2].confidence, 0.0);
        assert_eq!(recs[2].source_page, Some(4));
    }

    #[test]
    fn empty_value_is_not_found() {
        let t = table("Field,Extracted_Value\nTPA,\n");
        let recs = load_extracted(&t, None, &markers()).unwrap();
        assert!(recs[0].value.is_not_found());
    }

    #[test]
    fn filters_by_group() {
        let t = table(
            "Group_Name,Field,Extracted_Value,Confidence\n\
             Aurora Dynamics,TPA,BluePeak,0.9\n\
             Helios Manufacturing Inc.,TPA,Sunrise,0.91\n\
             aurora dynamics,COBRA,18 months,0.94\n",
        );
        let recs = load_extracted(&t, Some("Aurora Dynamics"), &markers()).unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[1].field_name, "COBRA");

        let all = load_extracted(&t, None, &markers()).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn group_names_in_first_seen_order() {
        let t = table(
            "Group_Name,Field,Extracted_Value\n\
             Solstice,TPA,x\nAurora,TPA,y\nsolstice,COB,z\n",
        );
        assert_eq!(group_names(&t), vec!["Solstice", "Aurora"]);

        let no_groups = table("Field,Extracted_Value\nTPA,x\n");
        assert!(group_names(&no_groups).is_empty());
    }

    #[test]
    fn out_of_range_confidence_is_format_error() {
        let t = table("Field,Extracted_Value,Confidence\nTPA,x,1.2\n");
        let err = load_extracted(&t, None, &markers()).unwrap_err();
        assert!(matches!(err, StoreError::Format { .. }));
        assert!(err.to_string().contains("row 2"), "{err}");
    }

    #[test]
    fn non_numeric_confidence_is_format_error() {
        let t = table("Field,Extracted_Value,Confidence\nTPA,x,high\n");
        assert!(load_extracted(&t, None, &markers()).is_err());
    }

    #[test]
    fn fractional_page_is_format_error() {
        let t = table("Field,Extracted_Value,Page_Number\nTPA,x,2.5\n");
        let err = load_extracted(&t, None, &markers()).unwrap_err();
        assert!(err.to_string().contains("Page_Number"), "{err}");
    }

    #[test]
    fn missing_value_column_is_format_error() {
        let t = table("Field,Confidence\nTPA,0.9\n");
        let err = load_extracted(&t, None, &markers()).unwrap_err();
        assert!(err.to_string().contains("Extracted_Value"), "{err}");
    }

    #[test]
    fn parse_confidence_forms() {
        assert_eq!(parse_confidence(""), Some(0.0));
        assert_eq!(parse_confidence("0.7"), Some(0.7));
        assert_eq!(parse_confidence("95%"), Some(0.95));
        assert_eq!(parse_confidence("-0.1"), None);
        assert_eq!(parse_confidence("NaN"), None);
    }

    #[test]
    fn parse_page_forms() {
        assert_eq!(parse_page(""), Some(None));
        assert_eq!(parse_page("nan"), Some(None));
        assert_eq!(parse_page("4.0"), Some(Some(4)));
        assert_eq!(parse_page("12"), Some(Some(12)));
        assert_eq!(parse_page("-1"), None);
        assert_eq!(parse_page("p4"), None);
    }
}
