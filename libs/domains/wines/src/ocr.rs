//! Text extraction from label images via Cloud Vision.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::auth::GcpAuth;
use crate::config::base_url;
use crate::error::{WineError, WineResult};

const VISION_BASE_URL: &str = "https://vision.googleapis.com";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Full text found in the image, or an empty string when there is none.
    async fn extract_text(&self, image: &[u8]) -> WineResult<String>;
}

/// `images:annotate` with `TEXT_DETECTION`.
pub struct VisionOcr {
    auth: GcpAuth,
    base_url: String,
}

impl VisionOcr {
    pub fn new(auth: GcpAuth) -> Self {
        Self {
            auth,
            base_url: VISION_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = base_url(&url.into());
        self
    }
}

#[derive(Serialize)]
struct AnnotateRequest {
    requests: [ImageRequest; 1],
}

#[derive(Serialize)]
struct ImageRequest {
    image: Image,
    features: [Feature; 1],
}

#[derive(Serialize)]
struct Image {
    content: String,
}

#[derive(Serialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageResponse>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    #[serde(default)]
    text_annotations: Vec<TextAnnotation>,
    error: Option<Status>,
}

#[derive(Deserialize)]
struct TextAnnotation {
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
struct Status {
    #[serde(default)]
    message: String,
}

#[async_trait]
impl TextExtractor for VisionOcr {
    async fn extract_text(&self, image: &[u8]) -> WineResult<String> {
        let token = self.auth.access_token().await.map_err(WineError::Ocr)?;

        let request = AnnotateRequest {
            requests: [ImageRequest {
                image: Image {
                    content: STANDARD.encode(image),
                },
                features: [Feature {
                    kind: "TEXT_DETECTION",
                }],
            }],
        };

        let response = self
            .auth
            .client()
            .post(format!("{}/v1/images:annotate", self.base_url))
            .bearer_auth(token)
            .json(&request)
            .send()
            .await
            .map_err(|e| WineError::Ocr(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(WineError::Ocr(format!(
                "Vision API error ({}): {}",
                status, body
            )));
        }

        let parsed: AnnotateResponse = response
            .json()
            .await
            .map_err(|e| WineError::Ocr(format!("Malformed response: {}", e)))?;

        let result = parsed.responses.into_iter().next().unwrap_or_default();

        if let Some(message) = result.error.map(|s| s.message).filter(|m| !m.is_empty()) {
            return Err(WineError::Ocr(format!("Vision API error: {}", message)));
        }

        Ok(result
            .text_annotations
            .into_iter()
            .next()
            .map(|t| t.description)
            .unwrap_or_default())
    }
}
