use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use crate::models::image::ImageArtifact;
use crate::models::style::Style;
use crate::models::upload::ImageMime;
use crate::models::video::{AspectRatio, OperationHandle, VideoArtifact};

/// Outbound calls to the image-restyle and video-generation models.
///
/// Implementations hold no job state and never retry.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Restyle `image` into `style`, returning the first image in the response.
    async fn restyle_image(
        &self,
        image: &[u8],
        mime_type: ImageMime,
        style: Style,
    ) -> Result<ImageArtifact, GenerationError>;

    /// Start a video generation operation seeded with `image`.
    async fn submit_video_job(
        &self,
        image: &[u8],
        mime_type: ImageMime,
        prompt: &str,
        aspect_ratio: AspectRatio,
    ) -> Result<OperationHandle, GenerationError>;

    /// Fetch the current state of an operation. Read-only; safe to repeat.
    async fn poll_video_job(
        &self,
        handle: &OperationHandle,
    ) -> Result<OperationHandle, GenerationError>;

    /// Download the finished video referenced by `locator`.
    async fn fetch_video_artifact(&self, locator: &str) -> Result<VideoArtifact, GenerationError>;
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Invalid generation input: {0}")]
    InvalidInput(String),

    #[error("The model response contained no generated media")]
    NoArtifactInResponse,

    /// Transport or remote-side failure. Displays as the remote message.
    #[error("{0}")]
    Service(String),

    #[error("Failed to download video ({status}): {body}")]
    ArtifactFetch { status: u16, body: String },
}

impl GenerationError {
    fn transport(err: reqwest::Error) -> Self {
        GenerationError::Service(err.to_string())
    }
}

/// Settings for the Gemini/Veo REST binding.
#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_base: String,
    pub api_key: Option<String>,
    pub image_model: String,
    pub video_model: String,
    pub video_resolution: String,
    pub request_timeout: Duration,
}

/// Client for the Gemini image model and the Veo video model.
pub struct GeminiClient {
    http: Client,
    settings: GeminiSettings,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default, alias = "inline_data")]
    inline_data: Option<InlineData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default, alias = "mime_type")]
    mime_type: Option<String>,
    #[serde(default)]
    data: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl GeminiClient {
    pub fn new(settings: GeminiSettings) -> Result<Self, GenerationError> {
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(GenerationError::transport)?;
        Ok(Self { http, settings })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.settings.api_base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.settings.api_key.as_deref() {
            Some(key) => request.header("x-goog-api-key", key),
            None => request,
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, GenerationError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(GenerationError::transport)?;
        let response = error_for_status(response).await?;
        response.json().await.map_err(GenerationError::transport)
    }
}

/// Turn a non-2xx response into `Service`, preferring the remote `error.message`.
async fn error_for_status(response: Response) -> Result<Response, GenerationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GenerationError::Service(remote_message(status.as_u16(), &body)))
}

fn remote_message(status: u16, body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) if !envelope.error.message.is_empty() => envelope.error.message,
        _ if body.trim().is_empty() => format!("Request failed with status {}", status),
        _ => format!("Request failed with status {}: {}", status, truncate(body, 512)),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

/// First inline image across all candidates.
fn first_inline_image(response: GenerateContentResponse) -> Result<ImageArtifact, GenerationError> {
    let inline = response
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|content| content.parts)
        .filter_map(|part| part.inline_data)
        .find(|inline| !inline.data.is_empty())
        .ok_or(GenerationError::NoArtifactInResponse)?;

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(inline.data.as_bytes())
        .map_err(|e| GenerationError::Service(format!("Image payload was not valid base64: {}", e)))?;

    Ok(ImageArtifact {
        bytes,
        mime_type: inline.mime_type.unwrap_or_else(|| "image/png".to_string()),
    })
}

#[async_trait]
impl GenerationClient for GeminiClient {
    async fn restyle_image(
        &self,
        image: &[u8],
        mime_type: ImageMime,
        style: Style,
    ) -> Result<ImageArtifact, GenerationError> {
        if image.is_empty() {
            return Err(GenerationError::InvalidInput("image payload is empty".to_string()));
        }

        let url = self.endpoint(&format!(
            "models/{}:generateContent",
            self.settings.image_model
        ));

        let request_body = serde_json::json!({
            "contents": [{
                "parts": [
                    {
                        "inlineData": {
                            "mimeType": mime_type.as_str(),
                            "data": base64::engine::general_purpose::STANDARD.encode(image),
                        }
                    },
                    { "text": style.instruction() }
                ]
            }],
            "generationConfig": {
                "responseModalities": ["IMAGE", "TEXT"]
            }
        });

        let response: GenerateContentResponse =
            self.send_json(self.http.post(&url).json(&request_body)).await?;

        first_inline_image(response)
    }

    async fn submit_video_job(
        &self,
        image: &[u8],
        mime_type: ImageMime,
        prompt: &str,
        aspect_ratio: AspectRatio,
    ) -> Result<OperationHandle, GenerationError> {
        if image.is_empty() {
            return Err(GenerationError::InvalidInput("image payload is empty".to_string()));
        }

        let url = self.endpoint(&format!(
            "models/{}:predictLongRunning",
            self.settings.video_model
        ));

        let request_body = serde_json::json!({
            "instances": [{
                "prompt": prompt,
                "image": {
                    "bytesBase64Encoded": base64::engine::general_purpose::STANDARD.encode(image),
                    "mimeType": mime_type.as_str(),
                }
            }],
            "parameters": {
                "aspectRatio": aspect_ratio.as_ratio(),
                "resolution": self.settings.video_resolution,
                "numberOfVideos": 1
            }
        });

        self.send_json(self.http.post(&url).json(&request_body)).await
    }

    async fn poll_video_job(
        &self,
        handle: &OperationHandle,
    ) -> Result<OperationHandle, GenerationError> {
        let url = self.endpoint(&handle.name);
        self.send_json(self.http.get(&url)).await
    }

    async fn fetch_video_artifact(&self, locator: &str) -> Result<VideoArtifact, GenerationError> {
        let mut request = self.http.get(locator);
        if let Some(key) = self.settings.api_key.as_deref() {
            request = request.query(&[("key", key)]);
        }

        let response = request.send().await.map_err(GenerationError::transport)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::ArtifactFetch {
                status: status.as_u16(),
                body: truncate(&body, 512),
            });
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("video/mp4")
            .to_string();
        let bytes = response.bytes().await.map_err(GenerationError::transport)?;

        Ok(VideoArtifact::new(bytes.to_vec(), mime_type, locator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(value: serde_json::Value) -> GenerateContentResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_first_inline_image_skips_text_parts() {
        let response = decode(serde_json::json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "Here is your logo" },
                    { "inlineData": { "mimeType": "image/png", "data": "AQID" } }
                ]}
            }]
        }));
        let artifact = first_inline_image(response).unwrap();
        assert_eq!(artifact.bytes, vec![1, 2, 3]);
        assert_eq!(artifact.mime_type, "image/png");
    }

    #[test]
    fn test_snake_case_inline_data_accepted() {
        let response = decode(serde_json::json!({
            "candidates": [{
                "content": { "parts": [
                    { "inline_data": { "mime_type": "image/jpeg", "data": "AQID" } }
                ]}
            }]
        }));
        assert_eq!(first_inline_image(response).unwrap().mime_type, "image/jpeg");
    }

    #[test]
    fn test_text_only_response_has_no_artifact() {
        let response = decode(serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": "I can't do that" }] } }]
        }));
        assert!(matches!(
            first_inline_image(response),
            Err(GenerationError::NoArtifactInResponse)
        ));
        assert!(matches!(
            first_inline_image(decode(serde_json::json!({}))),
            Err(GenerationError::NoArtifactInResponse)
        ));
    }

    #[test]
    fn test_remote_message_unwraps_error_envelope() {
        let body = r#"{"error":{"code":404,"message":"Requested entity was not found.","status":"NOT_FOUND"}}"#;
        assert_eq!(remote_message(404, body), "Requested entity was not found.");
        assert_eq!(remote_message(502, ""), "Request failed with status 502");
        assert_eq!(
            remote_message(500, "upstream exploded"),
            "Request failed with status 500: upstream exploded"
        );
    }

    #[test]
    fn test_service_error_displays_remote_message() {
        assert_eq!(
            GenerationError::Service("rate limited".to_string()).to_string(),
            "rate limited"
        );
    }

    #[test]
    fn test_endpoint_joins_operation_names() {
        let client = GeminiClient::new(GeminiSettings {
            api_base: "https://api.example/v1beta/".to_string(),
            api_key: None,
            image_model: "img".to_string(),
            video_model: "vid".to_string(),
            video_resolution: "720p".to_string(),
            request_timeout: Duration::from_secs(5),
        })
        .unwrap();
        assert_eq!(
            client.endpoint("models/vid/operations/42"),
            "https://api.example/v1beta/models/vid/operations/42"
        );
    }
}
