//! Completion text to [`DiagnosisResult`]
//!
//! Models often wrap JSON in a Markdown code fence even when told not to.
//! Parsing is two-stage: use the first `json`-tagged fenced block, or failing
//! that the first fenced block of any kind, otherwise the whole completion. Any decode failure after that is a
//! single error kind, [`AnalysisFailure::Parse`].

use serde::Deserialize;

use crate::error::{AnalysisFailure, Error, Result};
use crate::types::{DiagnosisResult, DEFAULT_CONFIDENCE};

const FENCE: &str = "```";

/// Diagnosis as the model reports it
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDiagnosis {
    is_plant: bool,
    disease: Option<String>,
    description: Option<String>,
    treatment: Option<String>,
    confidence: Option<f64>,
}

/// Parse a model completion into a diagnosis.
pub fn parse_completion(completion: &str) -> Result<DiagnosisResult> {
    let payload = extract_json(completion);

    let raw: RawDiagnosis = serde_json::from_str(payload).map_err(|e| {
        tracing::warn!(error = %e, payload, "Completion is not a valid diagnosis");
        Error::Analysis(AnalysisFailure::Parse)
    })?;

    Ok(DiagnosisResult {
        is_plant: raw.is_plant,
        disease: raw.disease,
        description: raw.description,
        treatment: raw.treatment,
        confidence: Some(normalize_confidence(raw.confidence)),
    })
}

/// The JSON payload inside a completion: fenced block content if present,
/// else the trimmed completion.
pub fn extract_json(completion: &str) -> &str {
    extract_fenced(completion).unwrap_or_else(|| completion.trim())
}

fn extract_fenced(text: &str) -> Option<&str> {
    tagged_fence(text).or_else(|| first_fence(text))
}

/// Content of the first fence opened with a `json` tag
fn tagged_fence(text: &str) -> Option<&str> {
    text.match_indices(FENCE).find_map(|(i, _)| {
        let after = &text[i + FENCE.len()..];
        let tag = after.get(..4)?;
        if !tag.eq_ignore_ascii_case("json") {
            return None;
        }
        let body = &after[4..];
        let end = body.find(FENCE)?;
        Some(body[..end].trim())
    })
}

fn first_fence(text: &str) -> Option<&str> {
    let start = text.find(FENCE)? + FENCE.len();
    let rest = &text[start..];
    let end = rest.find(FENCE)?;

    let inner = rest[..end].trim_start();
    let inner = inner
        .strip_prefix("json")
        .or_else(|| inner.strip_prefix("JSON"))
        .unwrap_or(inner);
    Some(inner.trim())
}

/// Missing, zero or NaN confidence becomes the default; out-of-range values
/// are clamped into [0, 1].
fn normalize_confidence(raw: Option<f64>) -> f64 {
    match raw {
        Some(c) if c == 0.0 || c.is_nan() => DEFAULT_CONFIDENCE,
        Some(c) if !(0.0..=1.0).contains(&c) => {
            tracing::warn!(confidence = c, "Model confidence out of range, clamping");
            c.clamp(0.0, 1.0)
        }
        Some(c) => c,
        None => DEFAULT_CONFIDENCE,
    }
}
