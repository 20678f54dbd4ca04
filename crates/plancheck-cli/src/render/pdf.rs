//! Plain-text PDF report built with lopdf.
//!
//! US Letter pages with the built-in Helvetica fonts, one text object per
//! page. Characters outside printable ASCII are replaced with `?` since the
//! standard fonts carry no Unicode mapping.

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use plancheck_core::Checklist;

use super::percent;

const PAGE_WIDTH: i64 = 612;
const PAGE_HEIGHT: i64 = 792;
const MARGIN: i64 = 54;
const LEADING: i64 = 14;
const LINES_PER_PAGE: usize = ((PAGE_HEIGHT - 2 * MARGIN) / LEADING) as usize;
const WRAP_COLUMNS: usize = 92;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Title,
    Heading,
    Body,
}

impl Style {
    fn font(&self) -> (&'static str, i64) {
        match self {
            Self::Title => ("F2", 16),
            Self::Heading => ("F2", 12),
            Self::Body => ("F1", 10),
        }
    }
}

type Line = (Style, String);

/// Render the checklist as a paginated text report.
pub fn render_pdf(checklist: &Checklist) -> Result<Vec<u8>, lopdf::Error> {
    let lines = report_lines(checklist);

    let mut doc = Document::with_version("1.4");
    let pages_id = doc.new_object_id();
    let regular = doc.add_object(font("Helvetica"));
    let bold = doc.add_object(font("Helvetica-Bold"));
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular,
            "F2" => bold,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for page in lines.chunks(LINES_PER_PAGE) {
        let content = page_content(page).encode()?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id: ObjectId = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(PAGE_WIDTH),
                Object::Integer(PAGE_HEIGHT),
            ],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}

fn font(base: &str) -> lopdf::Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => Object::Name(base.as_bytes().to_vec()),
        "Encoding" => "WinAnsiEncoding",
    }
}

fn report_lines(checklist: &Checklist) -> Vec<Line> {
    let s = &checklist.summary;
    let mut lines: Vec<Line> = vec![
        (Style::Title, format!("Plan review checklist: {}", checklist.group_name)),
        (
            Style::Body,
            format!(
                "Generated {} - overall status: {}",
                checklist.generated_at.format("%Y-%m-%d %H:%M UTC"),
                s.overall_status.as_str()
            ),
        ),
        (
            Style::Body,
            format!(
                "{} fields: {} found, {} missing ({} required), {} needs review, {} unidentifiable; avg confidence {}",
                s.total,
                s.found_count,
                s.missing_count,
                s.required_missing_count,
                s.needs_review_count,
                s.unidentifiable_count,
                percent(s.avg_confidence)
            ),
        ),
    ];

    for (category, rows) in checklist.sections() {
        let title = if category.is_empty() { "Fields" } else { category };
        lines.push((Style::Heading, title.to_string()));
        for (name, entry) in rows {
            let page = entry
                .extracted
                .source_page
                .map(|p| format!(", p. {p}"))
                .unwrap_or_default();
            let row = format!(
                "{}{}: {} [{}] {}{}",
                name,
                if entry.required { " *" } else { "" },
                entry.extracted.value.as_found().unwrap_or("N/F"),
                entry.verdict.status,
                percent(entry.verdict.confidence),
                page,
            );
            push_wrapped(&mut lines, &row);
        }
    }

    let (warnings, suggestions) = checklist.flagged();
    if !warnings.is_empty() || !suggestions.is_empty() {
        lines.push((Style::Heading, "Review notes".into()));
        for w in &warnings {
            push_wrapped(&mut lines, &format!("! {w}"));
        }
        for sug in &suggestions {
            push_wrapped(&mut lines, &format!("> {sug}"));
        }
    }
    lines
}

/// Break on spaces at [`WRAP_COLUMNS`]; continuation lines are indented.
fn push_wrapped(lines: &mut Vec<Line>, text: &str) {
    const INDENT: &str = "      ";
    let mut current = String::new();
    let mut fresh = true;
    for word in text.split(' ') {
        if !fresh && current.chars().count() + 1 + word.chars().count() > WRAP_COLUMNS {
            lines.push((Style::Body, std::mem::replace(&mut current, INDENT.to_string())));
            fresh = true;
        }
        if !fresh {
            current.push(' ');
        }
        current.push_str(word);
        fresh = false;
    }
    lines.push((Style::Body, current));
}

fn page_content(lines: &[Line]) -> Content {
    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("TL", vec![LEADING.into()]),
        Operation::new("Td", vec![MARGIN.into(), (PAGE_HEIGHT - MARGIN).into()]),
    ];
    let mut current: Option<Style> = None;
    for (style, text) in lines {
        if current != Some(*style) {
            let (font, size) = style.font();
            operations.push(Operation::new("Tf", vec![font.into(), size.into()]));
            current = Some(*style);
        }
        operations.push(Operation::new("Tj", vec![Object::string_literal(ascii_text(text))]));
        operations.push(Operation::new("T*", vec![]));
    }
    operations.push(Operation::new("ET", vec![]));
    Content { operations }
}

fn ascii_text(s: &str) -> String {
    s.chars()
        .map(|c| if (' '..='~').contains(&c) { c } else { '?' })
        .collect()
}
