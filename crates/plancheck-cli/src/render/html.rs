//! Editable HTML review form.
//!
//! Every field is an `<input name="field:<name>">` so the posted body can be
//! fed back through `plancheck resubmit`.

use std::fmt;

use plancheck_core::{Checklist, ChecklistEntry, VerdictStatus};

use super::percent;
use crate::form::input_name;

const STYLE: &str = "\
body { font-family: -apple-system, 'Segoe UI', Helvetica, Arial, sans-serif; margin: 2rem; color: #222; }
h1 { margin-bottom: 0.2rem; }
.meta { color: #666; margin-bottom: 1.5rem; }
.summary { display: flex; gap: 1.5rem; padding: 0.8rem 1rem; background: #f4f6f8; border-radius: 6px; }
.summary div { text-align: center; }
.summary strong { display: block; font-size: 1.4rem; }
section { margin-top: 1.5rem; }
h2 { border-bottom: 2px solid #e67e22; padding-bottom: 0.2rem; }
.field { display: grid; grid-template-columns: 14rem 1fr 8rem; gap: 0.6rem; align-items: start; padding: 0.5rem 0; border-bottom: 1px solid #eee; }
.field input { width: 100%; padding: 0.3rem; }
.badge { display: inline-block; padding: 0.1rem 0.5rem; border-radius: 3px; font-size: 0.8rem; color: #fff; }
.found { background: #27ae60; }
.missing { background: #c0392b; }
.needs_review { background: #e67e22; }
.unidentifiable { background: #7f8c8d; }
.notes { grid-column: 2 / 4; font-size: 0.85rem; }
.warning { color: #c0392b; }
.suggestion { color: #2c6fbb; }
.required { color: #c0392b; }
";

/// Render the checklist as a standalone HTML document with an edit form.
pub fn render_html(checklist: &Checklist) -> String {
    HtmlReport(checklist).to_string()
}

struct HtmlReport<'a>(&'a Checklist);

impl fmt::Display for HtmlReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let checklist = self.0;
        let s = &checklist.summary;
        let group = escape(&checklist.group_name);

        f.write_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n")?;
        writeln!(f, "<title>Plan review checklist: {group}</title>")?;
        writeln!(f, "<style>\n{STYLE}</style>\n</head>\n<body>")?;
        writeln!(f, "<h1>{group}</h1>")?;
        writeln!(
            f,
            "<div class=\"meta\">Generated {} &middot; overall status <span class=\"badge {status}\">{status}</span></div>",
            checklist.generated_at.format("%Y-%m-%d %H:%M UTC"),
            status = s.overall_status.as_str(),
        )?;

        f.write_str("<div class=\"summary\">\n")?;
        for (label, value) in [
            ("Fields", s.total.to_string()),
            ("Found", s.found_count.to_string()),
            ("Missing", s.missing_count.to_string()),
            ("Needs review", s.needs_review_count.to_string()),
            ("Unidentifiable", s.unidentifiable_count.to_string()),
            ("Required missing", s.required_missing_count.to_string()),
            ("Avg confidence", percent(s.avg_confidence)),
        ] {
            writeln!(f, "  <div><strong>{value}</strong>{label}</div>")?;
        }
        f.write_str("</div>\n")?;

        if !checklist.warnings.is_empty() {
            f.write_str("<section>\n<h2>Checklist warnings</h2>\n<ul>\n")?;
            for w in &checklist.warnings {
                writeln!(f, "  <li class=\"warning\">{}</li>", escape(w))?;
            }
            f.write_str("</ul>\n</section>\n")?;
        }

        f.write_str("<form method=\"post\">\n")?;
        for (category, rows) in checklist.sections() {
            let title = if category.is_empty() { "Fields" } else { category };
            writeln!(f, "<section>\n<h2>{}</h2>", escape(title))?;
            for (name, entry) in rows {
                field_row(f, name, entry)?;
            }
            f.write_str("</section>\n")?;
        }
        f.write_str("<p><button type=\"submit\">Save corrections</button></p>\n</form>\n</body>\n</html>\n")
    }
}

fn field_row(f: &mut fmt::Formatter<'_>, name: &str, entry: &ChecklistEntry) -> fmt::Result {
    let value = entry.extracted.value.as_found().unwrap_or("");
    let status = entry.verdict.status;
    let id = escape(&input_name(name));
    let page = entry
        .extracted
        .source_page
        .map(|p| format!("p. {p}"))
        .unwrap_or_else(|| "no page".to_string());

    f.write_str("<div class=\"field\">\n")?;
    writeln!(
        f,
        "  <label for=\"{id}\">{label}{req}</label>",
        label = escape(name),
        req = if entry.required {
            " <span class=\"required\">*</span>"
        } else {
            ""
        },
    )?;
    writeln!(
        f,
        "  <input type=\"text\" id=\"{id}\" name=\"{id}\" value=\"{value}\"{placeholder}>",
        value = escape(value),
        placeholder = if status == VerdictStatus::Missing {
            " placeholder=\"Not found\""
        } else {
            ""
        },
    )?;
    writeln!(
        f,
        "  <div><span class=\"badge {cls}\">{cls}</span><br><small>{conf} &middot; {page}</small></div>",
        cls = status.as_str(),
        conf = percent(entry.verdict.confidence),
    )?;

    if !entry.verdict.warnings.is_empty() || !entry.verdict.suggestions.is_empty() {
        f.write_str("  <div class=\"notes\">\n")?;
        for w in &entry.verdict.warnings {
            writeln!(f, "    <div class=\"warning\">&#9888; {}</div>", escape(w))?;
        }
        for s in &entry.verdict.suggestions {
            writeln!(f, "    <div class=\"suggestion\">&#8594; {}</div>", escape(s))?;
        }
        f.write_str("  </div>\n")?;
    }
    f.write_str("</div>\n")
}

/// Escape text for element content and double-quoted attribute values.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
