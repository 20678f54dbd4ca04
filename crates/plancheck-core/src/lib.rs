pub mod config;
pub mod model;
pub mod normalize;

pub use config::{AdvisorConfig, ConfigError, ReviewConfig, Thresholds};
pub use model::{
    Checklist, ChecklistEntry, ExtractedField, ExtractedValue, FieldDefinition, OverallStatus,
    Summary, UnknownFieldError, ValidationVerdict, VerdictStatus,
};
pub use normalize::{clean_display, is_not_found_marker, normalize_term};
