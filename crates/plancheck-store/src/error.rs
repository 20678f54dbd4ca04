use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    #[error("unsupported table format: {0} (expected .csv, .tsv, .xlsx, .xls, .xlsb or .ods)")]
    UnsupportedFormat(PathBuf),

    /// Malformed definitions or extracted-data input. `origin` names the file
    /// (or table) and `message` the bad column or row.
    #[error("format error in {origin}: {message}")]
    Format { origin: String, message: String },

    #[error("learning file {path} is corrupt: {source}")]
    CorruptState {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to persist learning file {path}: {source}")]
    Persistence {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid term: {0}")]
    InvalidTerm(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
