//! Optional LLM second opinion on field verdicts.
//!
//! The advisor is strictly advisory. Its suggestions are merged into the
//! verdict, and any disagreement on status or required-ness is recorded as a
//! warning carrying the advisor's explanation. It never changes the extracted
//! value or the computed status. Every call runs under a timeout; failures and
//! timeouts leave the verdict as it was and add a checklist-level warning.

use std::time::Duration;

use async_trait::async_trait;
use plancheck_core::{Checklist, ChecklistEntry, ValidationVerdict, VerdictStatus};
use plancheck_store::DefinitionsStore;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum AdvisorError {
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unusable advisor response: {0}")]
    Response(String),
    #[error("advisor did not answer within {0:?}")]
    Timeout(Duration),
    #[error("advisor not configured: {0}")]
    NotConfigured(String),
}

/// What the advisor is told about one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdviceRequest {
    pub field_name: String,
    pub definition: String,
    pub category: String,
    pub required: bool,
    /// `None` when nothing was extracted.
    pub value: Option<String>,
    pub status: VerdictStatus,
    pub confidence: f64,
    pub warnings: Vec<String>,
}

impl AdviceRequest {
    pub fn new(field_name: &str, definition: &str, entry: &ChecklistEntry) -> Self {
        Self {
            field_name: field_name.to_string(),
            definition: definition.to_string(),
            category: entry.category.clone(),
            required: entry.required,
            value: entry.extracted.value.as_found().map(str::to_string),
            status: entry.verdict.status,
            confidence: entry.verdict.confidence,
            warnings: entry.verdict.warnings.clone(),
        }
    }
}

/// The advisor's answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advice {
    #[serde(deserialize_with = "lenient_status")]
    pub validation_status: VerdictStatus,
    pub required: bool,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub explanation: String,
}

/// Accept the spellings a model tends to produce (`"Needs Review"`,
/// `"possible_typo"`).
fn lenient_status<'de, D: Deserializer<'de>>(d: D) -> Result<VerdictStatus, D::Error> {
    let raw = String::deserialize(d)?;
    VerdictStatus::parse(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unknown validation status '{raw}'")))
}

/// An LLM (or any other) second opinion on a field verdict.
#[async_trait]
pub trait Advisor: Send + Sync {
    async fn advise(&self, request: &AdviceRequest) -> Result<Advice, AdvisorError>;
}

/// Run one advisor call under `timeout`.
pub async fn advise_with_timeout(
    advisor: &dyn Advisor,
    request: &AdviceRequest,
    timeout: Duration,
) -> Result<Advice, AdvisorError> {
    match tokio::time::timeout(timeout, advisor.advise(request)).await {
        Ok(result) => result,
        Err(_) => Err(AdvisorError::Timeout(timeout)),
    }
}

/// Fold advice into a verdict. Status and extracted value are left alone.
pub fn merge_advice(verdict: &mut ValidationVerdict, required: bool, advice: &Advice) {
    for suggestion in &advice.suggestions {
        let suggestion = suggestion.trim();
        if !suggestion.is_empty() && !verdict.suggestions.iter().any(|s| s == suggestion) {
            verdict.suggestions.push(suggestion.to_string());
        }
    }

    let explanation = advice.explanation.trim();
    let because = if explanation.is_empty() {
        String::new()
    } else {
        format!(": {explanation}")
    };
    if advice.validation_status != verdict.status {
        verdict.warnings.push(format!(
            "advisor suggests status '{}'{because}",
            advice.validation_status
        ));
    }
    if advice.required != required {
        let kind = if advice.required { "required" } else { "optional" };
        verdict
            .warnings
            .push(format!("advisor considers this field {kind}{because}"));
    }
}

/// Outcome counts of [`enhance_checklist`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnhanceReport {
    pub advised: usize,
    pub failed: usize,
}

/// Ask the advisor about every field that is not `found`, in definition order.
///
/// Failures are logged and recorded as checklist warnings; they never abort
/// the pass and never change a verdict.
pub async fn enhance_checklist(
    checklist: &mut Checklist,
    definitions: &DefinitionsStore,
    advisor: &dyn Advisor,
    timeout: Duration,
) -> EnhanceReport {
    let pending: Vec<String> = checklist
        .sections()
        .into_iter()
        .flat_map(|(_, rows)| rows)
        .filter(|(_, entry)| entry.verdict.status != VerdictStatus::Found)
        .map(|(name, _)| name.to_string())
        .collect();

    let mut report = EnhanceReport::default();
    for name in pending {
        let Some(entry) = checklist.fields.get(&name) else {
            continue;
        };
        let definition = definitions
            .get(&name)
            .map(|d| d.definition.as_str())
            .unwrap_or_default();
        let request = AdviceRequest::new(&name, definition, entry);

        match advise_with_timeout(advisor, &request, timeout).await {
            Ok(advice) => {
                debug!(field = %name, status = %advice.validation_status, "advisor answered");
                if let Some(entry) = checklist.fields.get_mut(&name) {
                    let required = entry.required;
                    merge_advice(&mut entry.verdict, required, &advice);
                }
                report.advised += 1;
            }
            Err(e) => {
                warn!(field = %name, error = %e, "advisor call failed; verdict kept");
                checklist
                    .warnings
                    .push(format!("advisor unavailable for '{name}': {e}"));
                report.failed += 1;
            }
        }
    }

    info!(
        advised = report.advised,
        failed = report.failed,
        "advisor pass complete"
    );
    report
}

// ── Prompt templates ──

pub const SYSTEM_PROMPT: &str = "\
You review fields extracted from employer health plan documents.

Given a checklist field, its reference definition, the extracted value and the \
automatic validation result, judge whether the value is correct for the field.

Respond ONLY with a JSON object. No markdown fences, no explanation outside the object:
{
  \"validation_status\": \"found\" | \"missing\" | \"needs_review\" | \"unidentifiable\",
  \"required\": true or false,
  \"suggestions\": [\"short actionable suggestion\"],
  \"explanation\": \"one or two sentences\"
}";

pub fn build_user_prompt(request: &AdviceRequest) -> String {
    format!(
        "Field: {field}\n\
         Category: {category}\n\
         Required: {required}\n\
         Definition: {definition}\n\
         Extracted value: {value}\n\
         Current status: {status}\n\
         Confidence: {confidence:.2}\n\
         Warnings: {warnings}",
        field = request.field_name,
        category = request.category,
        required = request.required,
        definition = request.definition,
        value = request.value.as_deref().unwrap_or("(not found)"),
        status = request.status,
        confidence = request.confidence,
        warnings = if request.warnings.is_empty() {
            "none".to_string()
        } else {
            request.warnings.join("; ")
        },
    )
}

/// Parse the advisor's reply, tolerating text or fences around the JSON object.
pub fn parse_advice(content: &str) -> Result<Advice, AdvisorError> {
    if let Ok(advice) = serde_json::from_str(content.trim()) {
        return Ok(advice);
    }
    let (Some(start), Some(end)) = (content.find('{'), content.rfind('}')) else {
        return Err(AdvisorError::Response(format!("no JSON object in: {content}")));
    };
    if end < start {
        return Err(AdvisorError::Response(format!("no JSON object in: {content}")));
    }
    Ok(serde_json::from_str(&content[start..=end])?)
}
