//! Validation layer: term similarity, per-field verdicts, checklist building,
//! and the optional LLM advisor.

pub mod advisor;
pub mod checklist;
pub mod similarity;
pub mod validator;

#[cfg(feature = "http")]
mod http;
#[cfg(feature = "http")]
pub use http::HttpAdvisor;

pub use advisor::{
    Advice, AdviceRequest, Advisor, AdvisorError, EnhanceReport, advise_with_timeout,
    enhance_checklist, merge_advice,
};
pub use checklist::{ChecklistBuilder, FieldEdit};
pub use similarity::{TermMatch, best_match, similarity};
pub use validator::Validator;
