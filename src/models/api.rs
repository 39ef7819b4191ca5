use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::models::image::{ImageBatch, ResultState};
use crate::models::style::Style;
use crate::models::video::{AspectRatio, VideoErrorKind, VideoJob, VideoState};

/// Request to start a video job.
#[derive(Debug, Deserialize, Validate)]
pub struct VideoJobRequest {
    #[garde(length(min = 1, max = 2000))]
    pub prompt: String,

    #[garde(skip)]
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: AspectRatio,
}

fn default_aspect_ratio() -> AspectRatio {
    AspectRatio::Wide
}

/// Query string for image downloads.
#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    #[serde(default)]
    pub format: crate::services::export::ExportFormat,
}

/// Response after accepting an upload.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: usize,
    pub styles: Vec<Style>,
}

/// Response after an intent was accepted and work was started.
#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub status: String,
    pub message: String,
}

/// Error body returned by every studio route.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Credential state as seen by the UI.
#[derive(Debug, Serialize)]
pub struct KeyStatusResponse {
    pub selected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Per-style entry in a batch snapshot.
#[derive(Debug, Serialize)]
pub struct ImageResultView {
    pub style: Style,
    pub state: ResultState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub download_path: Option<String>,
}

/// Batch snapshot as rendered by the UI.
#[derive(Debug, Serialize)]
pub struct ImageBatchView {
    pub in_progress: bool,
    pub results: Vec<ImageResultView>,
    pub error_log: String,
}

impl From<&ImageBatch> for ImageBatchView {
    fn from(batch: &ImageBatch) -> Self {
        let results = batch
            .results
            .iter()
            .map(|r| ImageResultView {
                style: r.style,
                state: r.state,
                image_url: r.artifact.as_ref().map(|a| a.data_url()),
                error_message: r.error_message.clone(),
                download_path: (r.state == ResultState::Ready)
                    .then(|| format!("/api/v1/images/{}/download", r.style.slug())),
            })
            .collect();

        Self {
            in_progress: batch.in_progress,
            results,
            error_log: batch.error_log(),
        }
    }
}

/// Video job snapshot as rendered by the UI.
#[derive(Debug, Serialize)]
pub struct VideoJobView {
    pub state: VideoState,
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub poll_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<VideoErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// True when the UI should show a "select key" action.
    pub offer_key_selection: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_path: Option<String>,
}

impl From<&VideoJob> for VideoJobView {
    fn from(job: &VideoJob) -> Self {
        Self {
            state: job.state,
            prompt: job.prompt.clone(),
            aspect_ratio: job.aspect_ratio,
            poll_count: job.poll_count,
            error_kind: job.error_kind,
            error_message: job.error_message.clone(),
            offer_key_selection: job
                .error_kind
                .map(|k| k.offers_key_selection())
                .unwrap_or(false),
            video_path: job
                .artifact
                .as_ref()
                .map(|_| "/api/v1/video/artifact".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::image::{ImageArtifact, ImageResult};

    #[test]
    fn test_video_request_defaults_to_wide() {
        let req: VideoJobRequest =
            serde_json::from_value(serde_json::json!({ "prompt": "logo spins" })).unwrap();
        assert_eq!(req.aspect_ratio, AspectRatio::Wide);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_empty_prompt_fails_validation() {
        let req: VideoJobRequest = serde_json::from_value(
            serde_json::json!({ "prompt": "", "aspect_ratio": "tall" }),
        )
        .unwrap();
        assert_eq!(req.aspect_ratio, AspectRatio::Tall);
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_batch_view_links_ready_results() {
        let mut batch = ImageBatch::start();
        let mut ready = ImageResult::pending(Style::Cyberpunk, "logo.png");
        ready.mark_ready(ImageArtifact {
            bytes: vec![1],
            mime_type: "image/png".to_string(),
        });
        let mut failed = ImageResult::pending(Style::ArtDeco, "logo.png");
        failed.mark_failed("boom");
        batch.results = vec![ready, failed];
        batch.errors.push("Failed to generate Art Deco style: boom".to_string());

        let view = ImageBatchView::from(&batch);
        assert_eq!(
            view.results[0].download_path.as_deref(),
            Some("/api/v1/images/cyberpunk/download")
        );
        assert!(view.results[1].download_path.is_none());
        assert_eq!(view.results[1].error_message.as_deref(), Some("boom"));
        assert_eq!(view.error_log, "Failed to generate Art Deco style: boom");
    }

    #[test]
    fn test_video_view_offers_key_selection_for_key_errors() {
        let mut job = VideoJob::new(1, "spin", AspectRatio::Wide, None);
        job.mark_failed(VideoErrorKind::KeyInvalid, "Requested entity was not found.");
        assert!(VideoJobView::from(&job).offer_key_selection);

        let mut job = VideoJob::new(2, "spin", AspectRatio::Wide, None);
        job.mark_failed(VideoErrorKind::TransportOrServiceError, "timeout");
        assert!(!VideoJobView::from(&job).offer_key_selection);
    }
}
