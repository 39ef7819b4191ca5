use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Output framing for generated videos.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum AspectRatio {
    #[strum(to_string = "wide", serialize = "16:9")]
    Wide,
    #[strum(to_string = "tall", serialize = "9:16")]
    Tall,
}

impl AspectRatio {
    /// Ratio string the video model expects.
    pub fn as_ratio(&self) -> &'static str {
        match self {
            AspectRatio::Wide => "16:9",
            AspectRatio::Tall => "9:16",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VideoState {
    Idle,
    AwaitingKey,
    Submitted,
    Polling,
    Ready,
    Failed,
    Cancelled,
}

impl VideoState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            VideoState::Ready | VideoState::Failed | VideoState::Cancelled
        )
    }
}

/// Why a video job failed.
#[derive(Debug, Clone, Copy, Serialize, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VideoErrorKind {
    /// Missing image or prompt, detected before any network call.
    Validation,
    /// No credential has been selected.
    KeyRequired,
    /// The selected credential was rejected by the remote service.
    KeyInvalid,
    /// The operation finished without a video locator.
    NoArtifactInResponse,
    TransportOrServiceError,
    /// Poll attempts exhausted (only with a configured cap).
    TimedOut,
}

impl VideoErrorKind {
    /// Whether the UI should offer to (re)select a credential.
    pub fn offers_key_selection(&self) -> bool {
        matches!(self, VideoErrorKind::KeyRequired | VideoErrorKind::KeyInvalid)
    }
}

/// Remote long-running operation, as returned by submit and poll.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OperationHandle {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<OperationResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OperationResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVideoResponse {
    #[serde(default)]
    pub generated_samples: Vec<GeneratedSample>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratedSample {
    #[serde(default)]
    pub video: Option<VideoRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoRef {
    #[serde(default)]
    pub uri: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationError {
    #[serde(default)]
    pub code: Option<i32>,
    #[serde(default)]
    pub message: String,
}

impl OperationHandle {
    /// A not-yet-done handle with only a name.
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            done: false,
            response: None,
            error: None,
        }
    }

    /// A done handle pointing at `uri`.
    pub fn completed(name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            done: true,
            response: Some(OperationResponse {
                generate_video_response: Some(GenerateVideoResponse {
                    generated_samples: vec![GeneratedSample {
                        video: Some(VideoRef {
                            uri: Some(uri.into()),
                        }),
                    }],
                }),
            }),
            error: None,
        }
    }

    /// URI of the first generated video, if the operation produced one.
    pub fn result_locator(&self) -> Option<&str> {
        self.response
            .as_ref()?
            .generate_video_response
            .as_ref()?
            .generated_samples
            .iter()
            .find_map(|sample| sample.video.as_ref()?.uri.as_deref())
            .filter(|uri| !uri.is_empty())
    }
}

/// Downloaded video payload.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VideoArtifact {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub size_bytes: usize,
    pub source_uri: String,
}

impl VideoArtifact {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>, source_uri: impl Into<String>) -> Self {
        Self {
            size_bytes: bytes.len(),
            bytes,
            mime_type: mime_type.into(),
            source_uri: source_uri.into(),
        }
    }
}

/// One video generation request/response cycle.
#[derive(Debug, Clone, Serialize)]
pub struct VideoJob {
    pub id: Uuid,
    /// Run token; snapshots from superseded runs are discarded.
    #[serde(skip)]
    pub epoch: u64,
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub source_file_name: Option<String>,
    pub state: VideoState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<OperationHandle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<VideoArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<VideoErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub poll_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for VideoJob {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::nil(),
            epoch: 0,
            prompt: String::new(),
            aspect_ratio: AspectRatio::Wide,
            source_file_name: None,
            state: VideoState::Idle,
            operation: None,
            artifact: None,
            error_kind: None,
            error_message: None,
            poll_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

impl VideoJob {
    pub fn new(
        epoch: u64,
        prompt: impl Into<String>,
        aspect_ratio: AspectRatio,
        source_file_name: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch,
            prompt: prompt.into(),
            aspect_ratio,
            source_file_name,
            ..Self::default()
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Move to a non-terminal state. Terminal jobs never move again.
    pub fn advance(&mut self, state: VideoState) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.state = state;
        self.updated_at = Utc::now();
        true
    }

    pub fn mark_ready(&mut self, artifact: VideoArtifact) -> bool {
        if !self.advance(VideoState::Ready) {
            return false;
        }
        self.artifact = Some(artifact);
        true
    }

    pub fn mark_failed(&mut self, kind: VideoErrorKind, message: impl Into<String>) -> bool {
        if !self.advance(VideoState::Failed) {
            return false;
        }
        self.error_kind = Some(kind);
        self.error_message = Some(message.into());
        true
    }

    pub fn mark_cancelled(&mut self) -> bool {
        self.advance(VideoState::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_ratio_parsing() {
        assert_eq!("wide".parse::<AspectRatio>().unwrap(), AspectRatio::Wide);
        assert_eq!("9:16".parse::<AspectRatio>().unwrap(), AspectRatio::Tall);
        assert_eq!(AspectRatio::Tall.as_ratio(), "9:16");
        assert!("square".parse::<AspectRatio>().is_err());
    }

    #[test]
    fn test_terminal_states_are_sticky() {
        let mut job = VideoJob::new(1, "spin", AspectRatio::Wide, None);
        assert!(job.advance(VideoState::Submitted));
        assert!(job.advance(VideoState::Polling));
        assert!(job.mark_failed(VideoErrorKind::KeyInvalid, "Requested entity was not found."));
        assert!(!job.advance(VideoState::Polling));
        assert!(!job.mark_ready(VideoArtifact::new(vec![0], "video/mp4", "uri")));
        assert!(!job.mark_cancelled());
        assert_eq!(job.state, VideoState::Failed);
        assert_eq!(job.error_kind, Some(VideoErrorKind::KeyInvalid));
        assert!(job.artifact.is_none());
    }

    #[test]
    fn test_key_kinds_offer_selection() {
        assert!(VideoErrorKind::KeyRequired.offers_key_selection());
        assert!(VideoErrorKind::KeyInvalid.offers_key_selection());
        assert!(!VideoErrorKind::TransportOrServiceError.offers_key_selection());
    }

    #[test]
    fn test_operation_decodes_completed_payload() {
        let payload = serde_json::json!({
            "name": "models/veo/operations/abc123",
            "done": true,
            "response": {
                "@type": "type.googleapis.com/google.ai.generativelanguage.v1beta.PredictLongRunningResponse",
                "generateVideoResponse": {
                    "generatedSamples": [
                        { "video": { "uri": "https://files.example/v1beta/files/xyz:download?alt=media" } }
                    ]
                }
            }
        });
        let handle: OperationHandle = serde_json::from_value(payload).unwrap();
        assert!(handle.done);
        assert_eq!(
            handle.result_locator(),
            Some("https://files.example/v1beta/files/xyz:download?alt=media")
        );
    }

    #[test]
    fn test_operation_decodes_in_flight_payload() {
        let handle: OperationHandle =
            serde_json::from_value(serde_json::json!({ "name": "operations/1" })).unwrap();
        assert!(!handle.done);
        assert!(handle.result_locator().is_none());
    }

    #[test]
    fn test_done_without_samples_has_no_locator() {
        let handle: OperationHandle = serde_json::from_value(serde_json::json!({
            "name": "operations/1",
            "done": true,
            "response": { "generateVideoResponse": { "generatedSamples": [] } }
        }))
        .unwrap();
        assert!(handle.result_locator().is_none());
    }
}
