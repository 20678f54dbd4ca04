//! Checklist renderers. Each turns a checklist into the bytes of one
//! artifact; none of them look anything up or change the checklist.

mod html;
mod pdf;
mod xlsx;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::ValueEnum;
use plancheck_core::Checklist;
use tracing::info;

pub use html::render_html;
pub use pdf::render_pdf;
pub use xlsx::render_xlsx;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Editable review form
    Html,
    /// Full checklist, reloadable by `resubmit`
    Json,
    /// One row per field
    Xlsx,
    /// Printable text report
    Pdf,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Json => "json",
            Self::Xlsx => "xlsx",
            Self::Pdf => "pdf",
        }
    }
}

pub fn render_json(checklist: &Checklist) -> anyhow::Result<Vec<u8>> {
    let mut out = serde_json::to_vec_pretty(checklist).context("serializing checklist")?;
    out.push(b'\n');
    Ok(out)
}

pub fn render(checklist: &Checklist, format: OutputFormat) -> anyhow::Result<Vec<u8>> {
    match format {
        OutputFormat::Html => Ok(render_html(checklist).into_bytes()),
        OutputFormat::Json => render_json(checklist),
        OutputFormat::Xlsx => render_xlsx(checklist).context("building XLSX workbook"),
        OutputFormat::Pdf => render_pdf(checklist).context("building PDF report"),
    }
}

/// Render every requested format into `out_dir` as `<group>_checklist.<ext>`.
pub fn write_artifacts(
    checklist: &Checklist,
    formats: &[OutputFormat],
    out_dir: &Path,
) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;

    let stem = file_stem(&checklist.group_name);
    let mut done: Vec<OutputFormat> = Vec::new();
    let mut written = Vec::new();
    for &format in formats {
        if done.contains(&format) {
            continue;
        }
        done.push(format);
        let bytes = render(checklist, format)?;
        let path = out_dir.join(format!("{stem}_checklist.{}", format.extension()));
        std::fs::write(&path, &bytes).with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), bytes = bytes.len(), "wrote artifact");
        written.push(path);
    }
    Ok(written)
}

/// Group name reduced to a safe file stem: `Helios Manufacturing Inc.` ->
/// `Helios_Manufacturing_Inc`.
pub fn file_stem(group_name: &str) -> String {
    let mut stem = String::new();
    for word in group_name.split(|c: char| !c.is_alphanumeric()) {
        if word.is_empty() {
            continue;
        }
        if !stem.is_empty() {
            stem.push('_');
        }
        stem.push_str(word);
    }
    if stem.is_empty() {
        "group".to_string()
    } else {
        stem
    }
}

/// Percent with no decimals: 0.904 -> `90%`.
pub(crate) fn percent(value: f64) -> String {
    format!("{:.0}%", value * 100.0)
}
