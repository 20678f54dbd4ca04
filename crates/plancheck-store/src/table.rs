//! Header-addressed string tables read from CSV/TSV or the first sheet of a
//! spreadsheet workbook.
//!
//! Both the definitions reference and the extracted-data file are plain
//! tables; this module only turns them into rows of trimmed strings. Column
//! lookup is by alias and ignores case, spaces, underscores and hyphens, so
//! `Extracted_Value`, `extracted value` and `Extracted-Value` all match.

use std::io::Read;
use std::path::Path;

use calamine::{Data, Reader, Sheets, open_workbook_auto};
use tracing::debug;

use crate::StoreError;

/// A header row plus data rows, all cells as trimmed strings.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    origin: String,
    headers: Vec<String>,
    /// `(sheet row number, cells)`; the header is row 1.
    rows: Vec<(usize, Vec<String>)>,
}

impl Table {
    /// Build a table from in-memory rows. Row numbers start at 2 (after the header).
    pub fn new(origin: &str, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(i, cells)| (i + 2, cells))
            .filter(|(_, cells)| cells.iter().any(|c| !c.trim().is_empty()))
            .collect();
        Self {
            origin: origin.to_string(),
            headers: headers
                .into_iter()
                .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
                .collect(),
            rows,
        }
    }

    /// Read a table from disk, choosing the reader by file extension.
    pub fn read(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Err(StoreError::NotFound(path.to_path_buf()));
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        let origin = path.display().to_string();

        let table = match ext.as_str() {
            "csv" => Self::from_csv_reader(&origin, std::fs::File::open(path)?, b',')?,
            "tsv" | "tab" => Self::from_csv_reader(&origin, std::fs::File::open(path)?, b'\t')?,
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Self::from_workbook(path)?,
            _ => return Err(StoreError::UnsupportedFormat(path.to_path_buf())),
        };
        debug!(origin = %table.origin, rows = table.len(), "read table");
        Ok(table)
    }

    /// Parse delimited text. The first record is the header.
    pub fn from_csv_reader<R: Read>(
        origin: &str,
        reader: R,
        delimiter: u8,
    ) -> Result<Self, StoreError> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(Self::new(origin, headers, rows))
    }

    /// Read the first worksheet of an Excel/ODS workbook.
    fn from_workbook(path: &Path) -> Result<Self, StoreError> {
        let origin = path.display().to_string();
        let mut workbook: Sheets<_> = open_workbook_auto(path)?;
        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| StoreError::Format {
                origin: origin.clone(),
                message: "workbook contains no sheets".into(),
            })?;
        let range = workbook.worksheet_range(&sheet_name)?;

        let mut all_rows = range
            .rows()
            .map(|row| row.iter().map(cell_to_string).collect::<Vec<_>>());
        let headers = all_rows.next().unwrap_or_default();
        let rows: Vec<Vec<String>> = all_rows.collect();
        Ok(Self::new(&origin, headers, rows))
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Number of non-blank data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the first column whose header matches any alias.
    pub fn column(&self, aliases: &[&str]) -> Option<usize> {
        aliases.iter().find_map(|alias| {
            let want = header_key(alias);
            self.headers.iter().position(|h| header_key(h) == want)
        })
    }

    /// Like [`column`](Self::column), but a missing column is a format error.
    pub fn require_column(&self, aliases: &[&str]) -> Result<usize, StoreError> {
        self.column(aliases).ok_or_else(|| {
            let names: Vec<String> = aliases.iter().map(|a| format!("'{a}'")).collect();
            self.format_error(format!(
                "missing required column {} (found: {})",
                names.join(" or "),
                self.headers.join(", ")
            ))
        })
    }

    /// Iterate `(sheet row number, cells)`.
    pub fn rows(&self) -> impl Iterator<Item = (usize, &[String])> {
        self.rows.iter().map(|(n, cells)| (*n, cells.as_slice()))
    }

    pub fn format_error(&self, message: impl Into<String>) -> StoreError {
        StoreError::Format {
            origin: self.origin.clone(),
            message: message.into(),
        }
    }
}

/// Cell text at `col`, or `""` when the column is absent or the row is short.
pub fn cell(cells: &[String], col: Option<usize>) -> &str {
    col.and_then(|i| cells.get(i))
        .map(|s| s.trim())
        .unwrap_or("")
}

fn header_key(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

fn cell_to_string(data: &Data) -> String {
    match data {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        // Whole numbers come back as floats (page 4 -> 4.0).
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv_table(text: &str) -> Table {
        Table::from_csv_reader("test.csv", text.as_bytes(), b',').unwrap()
    }

    #[test]
    fn reads_headers_and_rows() {
        let t = csv_table("Field,Extracted_Value\nTPA,Plan Administrator\nCOBRA,N/F\n");
        assert_eq!(t.headers(), &["Field", "Extracted_Value"]);
        assert_eq!(t.len(), 2);
        let rows: Vec<_> = t.rows().collect();
        assert_eq!(rows[0].0, 2);
        assert_eq!(rows[0].1, &["TPA", "Plan Administrator"]);
        assert_eq!(rows[1].0, 3);
    }

    #[test]
    fn skips_blank_rows_but_keeps_row_numbers() {
        let t = csv_table("Field\nTPA\n,\nCOBRA\n");
        let numbers: Vec<usize> = t.rows().map(|(n, _)| n).collect();
        assert_eq!(numbers, vec![2, 4]);
    }

    #[test]
    fn column_lookup_ignores_case_and_separators() {
        let t = csv_table("field,EXTRACTED VALUE,page-number\n");
        assert_eq!(t.column(&["Field"]), Some(0));
        assert_eq!(t.column(&["Extracted_Value"]), Some(1));
        assert_eq!(t.column(&["Page_Number"]), Some(2));
        assert_eq!(t.column(&["Confidence"]), None);
    }

    #[test]
    fn column_lookup_tries_aliases_in_order() {
        let t = csv_table("Term,Description\n");
        assert_eq!(t.column(&["Field", "Term"]), Some(0));
        assert_eq!(t.column(&["Definition", "Description"]), Some(1));
    }

    #[test]
    fn require_column_names_missing_column() {
        let t = csv_table("Name,Description\n");
        let err = t.require_column(&["Field", "Term"]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("'Field' or 'Term'"), "{msg}");
        assert!(msg.contains("test.csv"), "{msg}");
    }

    #[test]
    fn strips_bom_from_first_header() {
        let t = csv_table("\u{feff}Field,Definition\nTPA,x\n");
        assert_eq!(t.column(&["Field"]), Some(0));
    }

    #[test]
    fn quoted_cells_with_commas() {
        let t = csv_table("Field,Identifiers\nInfertility,\"$20,000; $15,000\"\n");
        let (_, cells) = t.rows().next().unwrap();
        assert_eq!(cells[1], "$20,000; $15,000");
    }

    #[test]
    fn cell_handles_short_rows() {
        let cells = vec!["a".to_string()];
        assert_eq!(cell(&cells, Some(0)), "a");
        assert_eq!(cell(&cells, Some(3)), "");
        assert_eq!(cell(&cells, None), "");
    }

    #[test]
    fn read_dispatches_on_extension() {
        let tmp = tempfile::TempDir::new().unwrap();
        let tsv = tmp.path().join("defs.tsv");
        std::fs::write(&tsv, "Field\tRequired\nTPA\tyes\n").unwrap();
        let t = Table::read(&tsv).unwrap();
        assert_eq!(t.headers(), &["Field", "Required"]);

        let txt = tmp.path().join("defs.txt");
        std::fs::write(&txt, "Field\n").unwrap();
        assert!(matches!(
            Table::read(&txt),
            Err(StoreError::UnsupportedFormat(_))
        ));

        assert!(matches!(
            Table::read(&tmp.path().join("missing.csv")),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn float_cells_render_as_integers_when_whole() {
        assert_eq!(cell_to_string(&Data::Float(4.0)), "4");
        assert_eq!(cell_to_string(&Data::Float(0.95)), "0.95");
        assert_eq!(cell_to_string(&Data::Empty), "");
        assert_eq!(cell_to_string(&Data::String(" TPA ".into())), "TPA");
    }
}
