//! Text rendering for diagnoses and history rows.

use chrono::{DateTime, TimeZone};
use plantdoc_core::format::format_relative;
use plantdoc_core::{DiagnosisResult, HistoryEntry};

const NOT_A_PLANT: &str = "The image does not appear to contain a plant or leaf. \
Please take a clear photo of a plant or leaf for analysis.";

/// Short status label: disease name, "Healthy", or "Not a plant".
pub fn status_label(result: &DiagnosisResult) -> &str {
    if !result.is_plant {
        "Not a plant"
    } else {
        result.disease.as_deref().unwrap_or("Healthy")
    }
}

/// Multi-line report for one diagnosis.
pub fn diagnosis_report(result: &DiagnosisResult) -> String {
    if !result.is_plant {
        return format!("Not a plant\n\n{}", NOT_A_PLANT);
    }

    let mut lines = Vec::new();
    match &result.disease {
        Some(disease) => lines.push(format!("Disease detected: {}", disease)),
        None => lines.push("Healthy plant".to_string()),
    }
    if let Some(percent) = result.confidence_percent() {
        lines.push(format!("Confidence: {}%", percent));
    }
    if let Some(description) = &result.description {
        lines.push(String::new());
        lines.push("Description:".to_string());
        lines.push(format!("  {}", description));
    }
    if let Some(treatment) = &result.treatment {
        lines.push(String::new());
        lines.push("Treatment:".to_string());
        lines.push(format!("  {}", treatment));
    }
    lines.join("\n")
}

/// One history row plus its image reference.
pub fn history_row<Tz: TimeZone>(entry: &HistoryEntry, now: &DateTime<Tz>) -> String {
    format!(
        "{:<24} {:<28} [{}]\n    {}",
        format_relative(&entry.timestamp, now),
        status_label(&entry.result),
        entry.id,
        entry.image_uri
    )
}
