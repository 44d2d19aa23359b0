//! Error types for plantdoc-core

use std::fmt;

use thiserror::Error;

/// Main error type for the plantdoc-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Diagnosis failed; the message is safe to show to the user as-is
    #[error("{0}")]
    Analysis(AnalysisFailure),

    /// Persisting history failed
    #[error("storage error: {0}")]
    Storage(String),

    /// Inference endpoint or image fetch failed (detail for logs)
    #[error("inference error: {0}")]
    Inference(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the analysis failure kind, if this is an analysis error
    pub fn analysis_failure(&self) -> Option<AnalysisFailure> {
        match self {
            Error::Analysis(kind) => Some(*kind),
            _ => None,
        }
    }

    /// True for errors raised while persisting history
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Storage(_))
    }
}

/// Why a diagnosis could not be produced.
///
/// The cause is logged where it happens; only the kind travels to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisFailure {
    /// Image unreadable, transport failure, non-2xx status or malformed envelope
    Request,
    /// The completion did not decode into a diagnosis
    Parse,
}

impl AnalysisFailure {
    /// User-facing message for this failure
    pub fn message(&self) -> &'static str {
        match self {
            AnalysisFailure::Request => "Failed to analyze the image. Please try again.",
            AnalysisFailure::Parse => "Failed to parse the analysis result.",
        }
    }
}

impl fmt::Display for AnalysisFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Result type alias for plantdoc-core
pub type Result<T> = std::result::Result<T, Error>;
