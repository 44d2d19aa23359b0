//! Core domain types for plantdoc
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Diagnosis** | The structured outcome of analyzing one image |
//! | **History entry** | A persisted diagnosis plus its image reference and timestamp |
//! | **Image reference** | An opaque handle to the captured image (path or URL), never its bytes |
//!
//! Field names serialize in camelCase (`isPlant`, `imageUri`) because the
//! model is asked to answer in that shape and the persisted history record
//! shares it.

use serde::{Deserialize, Serialize};

/// Confidence recorded when the model does not report one
pub const DEFAULT_CONFIDENCE: f64 = 0.8;

// ============================================
// Diagnosis
// ============================================

/// Structured outcome of one analysis.
///
/// When `is_plant` is false the disease, description and treatment fields
/// carry no meaning and are usually `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisResult {
    /// Whether the image shows a plant or leaf
    pub is_plant: bool,
    /// Detected disease; `None` means healthy or not applicable
    pub disease: Option<String>,
    /// Description of the disease or of the plant's condition
    pub description: Option<String>,
    /// Suggested treatment
    pub treatment: Option<String>,
    /// Model confidence in [0, 1]
    pub confidence: Option<f64>,
}

impl DiagnosisResult {
    /// True when the image is a plant and no disease was reported
    pub fn is_healthy(&self) -> bool {
        self.is_plant && self.disease.is_none()
    }

    /// Confidence as a whole percentage (0.85 -> 85)
    pub fn confidence_percent(&self) -> Option<u32> {
        self.confidence.map(|c| (c * 100.0).round() as u32)
    }
}

// ============================================
// History
// ============================================

/// A diagnosis ready to be recorded, before the store assigns an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewHistoryEntry {
    /// Reference to the analyzed image
    pub image_uri: String,
    /// The diagnosis
    pub result: DiagnosisResult,
    /// RFC 3339 creation time
    pub timestamp: String,
}

/// A persisted diagnosis.
///
/// Created once when an analysis succeeds and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Unique id, increasing with creation order (Unix milliseconds)
    pub id: String,
    /// Reference to the analyzed image
    pub image_uri: String,
    /// The diagnosis
    #[serde(flatten)]
    pub result: DiagnosisResult,
    /// RFC 3339 creation time
    pub timestamp: String,
}

impl HistoryEntry {
    /// Build an entry from a pending record and an assigned id
    pub fn from_new(id: String, new: NewHistoryEntry) -> Self {
        Self {
            id,
            image_uri: new.image_uri,
            result: new.result,
            timestamp: new.timestamp,
        }
    }

    /// Numeric form of the id, if it is one
    pub fn numeric_id(&self) -> Option<i64> {
        self.id.parse().ok()
    }
}
