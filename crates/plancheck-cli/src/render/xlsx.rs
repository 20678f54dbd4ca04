//! Spreadsheet export: one row per field in definition order.

use plancheck_core::Checklist;
use rust_xlsxwriter::{Format, FormatAlign, Workbook, XlsxError};

const HEADERS: &[&str] = &[
    "Field",
    "Category",
    "Required",
    "Value",
    "Page",
    "Confidence",
    "Status",
    "Warnings",
    "Suggestions",
];

const COLUMN_WIDTHS: &[f64] = &[24.0, 16.0, 10.0, 36.0, 8.0, 12.0, 16.0, 48.0, 48.0];

/// Build the workbook in memory.
pub fn render_xlsx(checklist: &Checklist) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold().set_align(FormatAlign::Center);
    let percent = Format::new().set_num_format("0%");
    let wrap = Format::new().set_text_wrap();

    let sheet = workbook.add_worksheet().set_name("Checklist")?;
    for (col, title) in HEADERS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, &header)?;
    }
    for (col, width) in COLUMN_WIDTHS.iter().enumerate() {
        sheet.set_column_width(col as u16, *width)?;
    }
    sheet.set_freeze_panes(1, 0)?;

    let mut row: u32 = 1;
    for (_, rows) in checklist.sections() {
        for (name, entry) in rows {
            sheet.write_string(row, 0, name)?;
            sheet.write_string(row, 1, &entry.category)?;
            sheet.write_string(row, 2, if entry.required { "yes" } else { "no" })?;
            sheet.write_string(row, 3, entry.extracted.value.as_found().unwrap_or("N/F"))?;
            if let Some(page) = entry.extracted.source_page {
                sheet.write_number(row, 4, page)?;
            }
            sheet.write_number_with_format(row, 5, entry.verdict.confidence, &percent)?;
            sheet.write_string(row, 6, entry.verdict.status.as_str())?;
            sheet.write_string_with_format(row, 7, entry.verdict.warnings.join("\n"), &wrap)?;
            sheet.write_string_with_format(row, 8, entry.verdict.suggestions.join("\n"), &wrap)?;
            row += 1;
        }
    }

    let summary = workbook.add_worksheet().set_name("Summary")?;
    let s = &checklist.summary;
    let rows: [(&str, String); 9] = [
        ("Group", checklist.group_name.clone()),
        ("Generated", checklist.generated_at.to_rfc3339()),
        ("Overall status", s.overall_status.as_str().to_string()),
        ("Fields", s.total.to_string()),
        ("Found", s.found_count.to_string()),
        ("Missing", s.missing_count.to_string()),
        ("Needs review", s.needs_review_count.to_string()),
        ("Unidentifiable", s.unidentifiable_count.to_string()),
        ("Required missing", s.required_missing_count.to_string()),
    ];
    summary.set_column_width(0, 20.0)?;
    summary.set_column_width(1, 40.0)?;
    for (i, (label, value)) in rows.iter().enumerate() {
        summary.write_string_with_format(i as u32, 0, *label, &header)?;
        summary.write_string(i as u32, 1, value)?;
    }
    let next = rows.len() as u32;
    summary.write_string_with_format(next, 0, "Avg confidence", &header)?;
    summary.write_number_with_format(next, 1, s.avg_confidence, &percent)?;
    for (i, warning) in checklist.warnings.iter().enumerate() {
        let r = next + 2 + i as u32;
        summary.write_string_with_format(r, 0, "Warning", &header)?;
        summary.write_string(r, 1, warning)?;
    }

    workbook.save_to_buffer()
}
