//! HTTP client for an OpenAI-compatible chat completions endpoint
//!
//! One `analyze` call makes exactly one inference request, parses the
//! reply, and on success appends one entry to history. Nothing is retried.

use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::config::InferenceConfig;
use crate::error::{AnalysisFailure, Error, Result};
use crate::history::HistoryStore;
use crate::types::{DiagnosisResult, HistoryEntry, NewHistoryEntry};

use super::image;
use super::parse::parse_completion;

/// Instruction sent alongside every image
pub const DIAGNOSIS_PROMPT: &str = "Look at this image and decide whether it shows a plant or a leaf. \
If it does, identify any disease or other problem affecting the plant, describe it, and recommend a treatment. \
If the plant looks healthy, set disease to null. \
If the image does not show a plant or leaf, set isPlant to false and the other fields to null. \
Respond only with JSON using exactly this structure: \
{ \"isPlant\": boolean, \"disease\": string or null, \"description\": string or null, \"treatment\": string or null }";

/// Turns plant photos into diagnoses and records them
pub struct DiagnosisClient {
    config: InferenceConfig,
    http_client: reqwest::Client,
    history: HistoryStore,
}

impl DiagnosisClient {
    /// Create a client from configuration
    ///
    /// Returns an error if the configuration is invalid. A missing API key
    /// is not an error here; requests are then sent unauthenticated and the
    /// endpoint rejects them.
    pub fn new(config: InferenceConfig, history: HistoryStore) -> Result<Self> {
        config.validate()?;

        if config.api_key.is_none() {
            tracing::warn!("No inference API key configured; requests will be rejected");
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
            history,
        })
    }

    /// History this client records into
    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Diagnose the referenced image and save the result to history.
    ///
    /// Fails with [`AnalysisFailure::Request`] when the image or the endpoint
    /// cannot be reached, with [`AnalysisFailure::Parse`] when the reply does
    /// not decode, and with [`Error::Storage`] if saving fails. History is
    /// untouched on analysis failure.
    pub async fn analyze(&self, image_ref: &str) -> Result<DiagnosisResult> {
        Ok(self.analyze_and_record(image_ref).await?.result)
    }

    /// Like [`analyze`](Self::analyze), returning the stored entry instead
    pub async fn analyze_and_record(&self, image_ref: &str) -> Result<HistoryEntry> {
        let result = self.diagnose(image_ref).await?;

        self.history.append(NewHistoryEntry {
            image_uri: image_ref.to_string(),
            result,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        })
    }

    /// Diagnose without recording anything
    pub async fn analyze_without_saving(&self, image_ref: &str) -> Result<DiagnosisResult> {
        self.diagnose(image_ref).await
    }

    async fn diagnose(&self, image_ref: &str) -> Result<DiagnosisResult> {
        let completion = self.request_completion(image_ref).await.map_err(|e| {
            tracing::error!(image_ref, error = %e, "Error analyzing image");
            Error::Analysis(AnalysisFailure::Request)
        })?;

        tracing::debug!(%completion, "Model completion");
        parse_completion(&completion)
    }

    /// Encode the image, send one completion request, return the reply text
    async fn request_completion(&self, image_ref: &str) -> Result<String> {
        let base64_image = image::encode_base64(&self.http_client, image_ref).await?;
        let body = ChatRequest::diagnosis(&self.config, image::data_url(&base64_image));

        tracing::debug!(
            endpoint = %self.config.endpoint,
            model = %self.config.model,
            image_bytes = base64_image.len(),
            "Sending inference request"
        );

        let mut request = self.http_client.post(&self.config.endpoint).json(&body);
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Inference(format!("HTTP request failed: {}", e)))?;

        let status = response.status();

        if status.is_success() {
            let completion: ChatCompletion = response
                .json()
                .await
                .map_err(|e| Error::Inference(format!("failed to parse response: {}", e)))?;
            completion.into_content()
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            Err(Error::Inference(format!(
                "API error ({}): {}",
                status, error_text
            )))
        }
    }
}

/// Request body for POST /v1/chat/completions
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

impl<'a> ChatRequest<'a> {
    fn diagnosis(config: &'a InferenceConfig, image_url: String) -> Self {
        Self {
            model: &config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: DIAGNOSIS_PROMPT,
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: image_url },
                    },
                ],
            }],
            max_tokens: config.max_tokens,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

/// Response from POST /v1/chat/completions (only the fields we read)
#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl ChatCompletion {
    /// Text of the first choice
    fn into_content(self) -> Result<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::Inference("response has no message content".to_string()))
    }
}
