//! # plantdoc-core
//!
//! Core library for plantdoc - plant leaf diagnosis backed by a vision model.
//!
//! This library provides:
//! - Domain types for diagnoses and history entries
//! - A client for an OpenAI-compatible vision endpoint
//! - A bounded, persistent history with pluggable key-value backends
//! - Relative timestamp formatting
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! Presentation (the `plantdoc` CLI or any other front end) calls
//! [`DiagnosisClient::analyze`], which encodes the image, queries the model,
//! parses the reply and appends it to the [`HistoryStore`]. History views call
//! [`HistoryStore::list`] and render times with [`format::format_relative`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use plantdoc_core::{storage, Config, DiagnosisClient, HistoryStore};
//!
//! # async fn run() -> plantdoc_core::Result<()> {
//! let config = Config::load()?;
//! let history = HistoryStore::new(storage::open(&config.storage)?);
//! let client = DiagnosisClient::new(config.inference, history)?;
//!
//! let result = client.analyze("photos/leaf.jpg").await?;
//! println!("plant: {}, disease: {:?}", result.is_plant, result.disease);
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use diagnosis::DiagnosisClient;
pub use error::{AnalysisFailure, Error, Result};
pub use history::HistoryStore;
pub use types::*;

// Public modules
pub mod config;
pub mod diagnosis;
pub mod error;
pub mod format;
pub mod history;
pub mod logging;
pub mod storage;
pub mod types;
