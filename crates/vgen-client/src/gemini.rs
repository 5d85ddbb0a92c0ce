//! Gemini API client for video and prompt generation.
//!
//! Videos come from the long-running `predictLongRunning` endpoint of a Veo
//! model; prompts come from `generateContent` on a text model. The API key
//! is passed per call so callers can rotate keys. It travels in a header,
//! never in the URL, so transport errors cannot echo it back.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use vgen_models::ImageData;

use crate::backend::{OperationStatus, VideoBackend, VideoOperation, VideoReference, VideoRequest};
use crate::error::{ClientError, ClientResult};

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-goog-api-key";

/// Instruction sent with an image to get a video prompt back.
pub const DESCRIBE_IMAGE_INSTRUCTION: &str = "Describe this image as a prompt for an AI video \
generator. Write one vivid paragraph that brings the scene to life with natural motion and \
camera movement. Respond with the prompt text only.";

/// Template used to improve a user prompt. `{prompt}` is replaced by the text.
pub const REPHRASE_TEMPLATE: &str = "Rewrite the following prompt for an AI video generator so \
it is vivid and cinematic, with clear motion and camera movement. Keep the original subject. \
Respond with the improved prompt text only.\n\nPrompt: {prompt}";

/// Gemini client configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API base URL, including the version segment
    pub base_url: String,
    /// Model used for video generation
    pub video_model: String,
    /// Model used for prompt writing
    pub text_model: String,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            video_model: "veo-2.0-generate-001".to_string(),
            text_model: "gemini-2.5-flash".to_string(),
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl GeminiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("GEMINI_API_BASE").unwrap_or(defaults.base_url),
            video_model: std::env::var("GEMINI_VIDEO_MODEL").unwrap_or(defaults.video_model),
            text_model: std::env::var("GEMINI_TEXT_MODEL").unwrap_or(defaults.text_model),
            request_timeout: Duration::from_secs(
                std::env::var("GEMINI_REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
        }
    }
}

/// Gemini API client.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    client: Client,
}

// --- predictLongRunning -----------------------------------------------------

#[derive(Debug, Serialize)]
struct PredictRequest {
    instances: Vec<PredictInstance>,
    parameters: PredictParameters,
}

#[derive(Debug, Serialize)]
struct PredictInstance {
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<PredictImage>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictImage {
    bytes_base64_encoded: String,
    mime_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictParameters {
    sample_count: u32,
}

#[derive(Debug, Deserialize)]
struct OperationResponse {
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    response: Option<OperationResult>,
    #[serde(default)]
    error: Option<OperationError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationResult {
    #[serde(default)]
    generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateVideoResponse {
    #[serde(default)]
    generated_samples: Vec<GeneratedSample>,
    #[serde(default)]
    rai_media_filtered_reasons: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GeneratedSample {
    video: Option<SampleVideo>,
}

#[derive(Debug, Deserialize)]
struct SampleVideo {
    uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    #[serde(default)]
    code: Option<i32>,
    #[serde(default)]
    message: String,
}

// --- generateContent --------------------------------------------------------

#[derive(Debug, Serialize)]
struct ContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum Part {
    Text(String),
    InlineData(InlineData),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiClient {
    /// Create a new Gemini client.
    pub fn new(config: GeminiConfig) -> ClientResult<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { config, client })
    }

    /// Create from environment variables.
    pub fn from_env() -> ClientResult<Self> {
        Self::new(GeminiConfig::from_env())
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!(
            "{}/models/{}:{}",
            self.config.base_url.trim_end_matches('/'),
            model,
            method
        )
    }

    /// Turn a non-success response into an API error carrying the status.
    async fn check(response: reqwest::Response) -> ClientResult<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        warn!("Gemini API returned {}: {}", status, body);
        Err(ClientError::api(status.as_u16(), body))
    }

    /// Call generateContent and join the text parts of the first candidate.
    async fn generate_text(&self, parts: Vec<Part>, credential: &str) -> ClientResult<String> {
        let url = self.model_url(&self.config.text_model, "generateContent");
        let request = ContentRequest {
            contents: vec![Content { parts }],
        };

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, credential)
            .json(&request)
            .send()
            .await?;
        let response = Self::check(response).await?;

        let body: ContentResponse = response
            .json()
            .await
            .map_err(|e| ClientError::parse(format!("generateContent response: {}", e)))?;

        let text: String = body
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let text = text.trim();
        if text.is_empty() {
            return Err(ClientError::EmptyResponse(
                "No text in Gemini response".to_string(),
            ));
        }
        Ok(text.to_string())
    }
}

#[async_trait]
impl VideoBackend for GeminiClient {
    async fn submit_video_generation(
        &self,
        request: &VideoRequest,
        credential: &str,
    ) -> ClientResult<VideoOperation> {
        if request.prompt.trim().is_empty() {
            return Err(ClientError::InvalidInput("prompt is empty".to_string()));
        }

        let url = self.model_url(&self.config.video_model, "predictLongRunning");
        let body = PredictRequest {
            instances: vec![PredictInstance {
                prompt: request.prompt.clone(),
                image: request.image.as_ref().map(|image| PredictImage {
                    bytes_base64_encoded: image.to_base64(),
                    mime_type: image.mime_type().to_string(),
                }),
            }],
            parameters: PredictParameters { sample_count: 1 },
        };

        info!(
            model = %self.config.video_model,
            with_image = request.image.is_some(),
            "Submitting video generation"
        );

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, credential)
            .json(&body)
            .send()
            .await?;
        let response = Self::check(response).await?;

        let operation: OperationResponse = response
            .json()
            .await
            .map_err(|e| ClientError::parse(format!("predictLongRunning response: {}", e)))?;

        debug!(operation = %operation.name, "Video generation submitted");
        Ok(VideoOperation {
            name: operation.name,
        })
    }

    async fn poll_video_operation(
        &self,
        operation: &VideoOperation,
        credential: &str,
    ) -> ClientResult<OperationStatus> {
        let url = format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            operation.name.trim_start_matches('/')
        );

        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, credential)
            .send()
            .await?;
        let response = Self::check(response).await?;

        let body: OperationResponse = response
            .json()
            .await
            .map_err(|e| ClientError::parse(format!("operation response: {}", e)))?;

        if !body.done {
            debug!(operation = %body.name, "Video operation still running");
            return Ok(OperationStatus::pending());
        }

        if let Some(error) = body.error {
            let message = match error.code {
                Some(code) => format!("{} (code {})", error.message, code),
                None => error.message,
            };
            return Ok(OperationStatus::failed(message));
        }

        let (videos, filtered_reasons) = match body.response.and_then(|r| r.generate_video_response) {
            Some(r) => {
                let videos = r
                    .generated_samples
                    .into_iter()
                    .filter_map(|s| s.video.and_then(|v| v.uri))
                    .map(|uri| VideoReference { uri })
                    .collect();
                (videos, r.rai_media_filtered_reasons)
            }
            None => (Vec::new(), Vec::new()),
        };

        Ok(OperationStatus {
            done: true,
            videos,
            error: None,
            filtered_reasons,
        })
    }

    async fn fetch_video_bytes(
        &self,
        video: &VideoReference,
        credential: &str,
    ) -> ClientResult<Bytes> {
        let response = self
            .client
            .get(&video.uri)
            .header(API_KEY_HEADER, credential)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::Fetch(format!(
                "{} {}",
                response.status().as_u16(),
                response.status().canonical_reason().unwrap_or("")
            )));
        }

        let bytes = response.bytes().await?;
        info!("Downloaded generated video ({} bytes)", bytes.len());
        Ok(bytes)
    }

    async fn describe_image_for_video(
        &self,
        image: &ImageData,
        credential: &str,
    ) -> ClientResult<String> {
        let parts = vec![
            Part::InlineData(InlineData {
                mime_type: image.mime_type().to_string(),
                data: image.to_base64(),
            }),
            Part::Text(DESCRIBE_IMAGE_INSTRUCTION.to_string()),
        ];
        self.generate_text(parts, credential).await
    }

    async fn rephrase_prompt(&self, prompt: &str, credential: &str) -> ClientResult<String> {
        let text = REPHRASE_TEMPLATE.replace("{prompt}", prompt.trim());
        self.generate_text(vec![Part::Text(text)], credential).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_serialization() {
        let part = Part::InlineData(InlineData {
            mime_type: "image/png".into(),
            data: "AAA=".into(),
        });
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["inlineData"]["mimeType"], "image/png");
        assert_eq!(json["inlineData"]["data"], "AAA=");

        let json = serde_json::to_value(Part::Text("hi".into())).unwrap();
        assert_eq!(json["text"], "hi");
    }

    #[test]
    fn test_predict_request_omits_missing_image() {
        let request = PredictRequest {
            instances: vec![PredictInstance {
                prompt: "a cat".into(),
                image: None,
            }],
            parameters: PredictParameters { sample_count: 1 },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json["instances"][0].get("image").is_none());
        assert_eq!(json["parameters"]["sampleCount"], 1);
    }

    #[test]
    fn test_model_url() {
        let client = GeminiClient::new(GeminiConfig {
            base_url: "http://localhost:1234/v1beta/".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            client.model_url("veo-2.0-generate-001", "predictLongRunning"),
            "http://localhost:1234/v1beta/models/veo-2.0-generate-001:predictLongRunning"
        );
    }

    #[test]
    fn test_rephrase_template_embeds_prompt() {
        let text = REPHRASE_TEMPLATE.replace("{prompt}", "a red kite");
        assert!(text.ends_with("Prompt: a red kite"));
    }
}
