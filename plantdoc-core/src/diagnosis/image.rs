//! Image references to inline base64 payloads
//!
//! A reference is either a network URL (`http://`, `https://`) or a local
//! file (`file://` URI or plain path). Both produce the same encoding.

use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{Error, Result};

/// Media type declared for every inline image
pub const IMAGE_MEDIA_TYPE: &str = "image/jpeg";

/// Where an image reference points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Fetched over HTTP
    Remote(String),
    /// Read from the local filesystem
    Local(PathBuf),
}

impl ImageSource {
    pub fn parse(image_ref: &str) -> Self {
        if image_ref.starts_with("http://") || image_ref.starts_with("https://") {
            ImageSource::Remote(image_ref.to_string())
        } else if let Some(path) = image_ref.strip_prefix("file://") {
            ImageSource::Local(PathBuf::from(path))
        } else {
            ImageSource::Local(PathBuf::from(image_ref))
        }
    }
}

/// Load the referenced image and return its bytes as standard base64.
pub async fn encode_base64(http_client: &reqwest::Client, image_ref: &str) -> Result<String> {
    let bytes = match ImageSource::parse(image_ref) {
        ImageSource::Local(path) => tokio::fs::read(&path).await.map_err(|e| {
            Error::Inference(format!("failed to read image {}: {}", path.display(), e))
        })?,
        ImageSource::Remote(url) => fetch(http_client, &url).await?,
    };

    if bytes.is_empty() {
        return Err(Error::Inference(format!("image {} is empty", image_ref)));
    }

    tracing::debug!(image_ref, bytes = bytes.len(), "Encoded image");
    Ok(STANDARD.encode(bytes))
}

/// `data:` URL for a base64 image payload
pub fn data_url(base64_image: &str) -> String {
    format!("data:{};base64,{}", IMAGE_MEDIA_TYPE, base64_image)
}

async fn fetch(http_client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    let response = http_client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::Inference(format!("image request failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::Inference(format!(
            "image fetch error ({}) for {}",
            status, url
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::Inference(format!("failed to read image body: {}", e)))?;
    Ok(bytes.to_vec())
}
