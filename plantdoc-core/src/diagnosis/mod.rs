//! Plant diagnosis via an external vision model
//!
//! ## Flow
//!
//! 1. The image reference (local path, `file://` URI or `http(s)://` URL) is
//!    read and base64-encoded ([`image`]).
//! 2. One chat completion request carries the instruction prompt and the
//!    image as a `data:image/jpeg;base64,...` URL.
//! 3. The reply text is parsed, fenced or not, into a
//!    [`DiagnosisResult`](crate::types::DiagnosisResult) ([`parse`]).
//! 4. On success the result is appended to history.
//!
//! Endpoint and credentials come from `[inference]` in
//! `~/.config/plantdoc/config.toml` and the `OPENAI_API_KEY` env var:
//!
//! ```toml
//! [inference]
//! model = "gpt-4o-mini"
//! timeout_secs = 60
//! ```

mod client;
pub mod image;
pub mod parse;

pub use client::{DiagnosisClient, DIAGNOSIS_PROMPT};
pub use parse::parse_completion;
