use std::sync::{Arc, RwLock};
use tokio::task::JoinHandle;

use crate::models::image::ImageBatch;
use crate::models::style::Style;
use crate::models::upload::UploadedImage;
use crate::models::video::{AspectRatio, VideoJob};
use crate::services::image_batch::{BatchError, BatchOrchestrator};
use crate::services::key_gate::{GateError, KeyGate};
use crate::services::video_job::{VideoOrchestrator, VideoRequest};

/// One user session: the current upload plus both orchestrators.
///
/// Accepts user intents and runs the resulting work on the tokio runtime.
/// Callers observe progress through `subscribe_*` or `*_snapshot`.
pub struct Studio {
    upload: RwLock<Option<UploadedImage>>,
    styles: Vec<Style>,
    batch: BatchOrchestrator,
    video: VideoOrchestrator,
    gate: Arc<KeyGate>,
}

#[derive(Debug, thiserror::Error)]
pub enum StudioError {
    #[error("Please upload an image first")]
    NoImage,

    #[error("An image batch is already in progress")]
    BatchInProgress,

    #[error("A video is already being generated")]
    VideoInProgress,
}

impl From<BatchError> for StudioError {
    fn from(err: BatchError) -> Self {
        match err {
            BatchError::MissingImage => StudioError::NoImage,
            BatchError::InProgress => StudioError::BatchInProgress,
        }
    }
}

impl Studio {
    pub fn new(
        styles: Vec<Style>,
        batch: BatchOrchestrator,
        video: VideoOrchestrator,
        gate: Arc<KeyGate>,
    ) -> Self {
        Self {
            upload: RwLock::new(None),
            styles,
            batch,
            video,
            gate,
        }
    }

    pub fn styles(&self) -> &[Style] {
        &self.styles
    }

    pub fn current_upload(&self) -> Option<UploadedImage> {
        self.upload.read().ok().and_then(|guard| guard.clone())
    }

    /// Replace the uploaded image and clear the previous batch's results.
    pub fn upload(&self, image: UploadedImage) -> Result<(), StudioError> {
        self.batch.clear()?;
        tracing::info!(
            file_name = %image.file_name,
            mime_type = %image.mime_type.as_str(),
            size_bytes = image.bytes.len(),
            "Image uploaded"
        );
        if let Ok(mut slot) = self.upload.write() {
            *slot = Some(image);
        }
        Ok(())
    }

    /// Start restyling the current upload into every configured style.
    ///
    /// The batch is claimed before this returns, so a second call made while
    /// the first is still running is refused.
    pub fn start_image_batch(self: &Arc<Self>) -> Result<JoinHandle<ImageBatch>, StudioError> {
        let image = self.current_upload().ok_or(StudioError::NoImage)?;
        let batch_id = self.batch.begin()?;

        let studio = Arc::clone(self);
        Ok(tokio::spawn(async move {
            studio.batch.generate(batch_id, &image, &studio.styles).await
        }))
    }

    /// Start a video job for the current upload.
    ///
    /// Refused while another job is active; a finished job is replaced.
    pub fn start_video_job(
        self: &Arc<Self>,
        prompt: String,
        aspect_ratio: AspectRatio,
    ) -> Result<JoinHandle<VideoJob>, StudioError> {
        let request = VideoRequest {
            image: self.current_upload(),
            prompt,
            aspect_ratio,
        };
        let job = self
            .video
            .try_begin(&request)
            .ok_or(StudioError::VideoInProgress)?;

        let studio = Arc::clone(self);
        Ok(tokio::spawn(async move {
            studio.video.run(job, request).await
        }))
    }

    pub fn cancel_video_job(&self) -> bool {
        self.video.cancel()
    }

    /// Evaluate the credential state once at startup.
    pub async fn refresh_credentials(&self) -> bool {
        self.gate.refresh().await
    }

    pub async fn request_credential_selection(&self) -> Result<bool, GateError> {
        self.gate.request_credential_selection().await
    }

    pub fn credential_selected(&self) -> bool {
        self.gate.credential_state()
    }

    pub fn batch_snapshot(&self) -> ImageBatch {
        self.batch.snapshot()
    }

    pub fn video_snapshot(&self) -> VideoJob {
        self.video.snapshot()
    }

    pub fn subscribe_batch(&self) -> tokio::sync::watch::Receiver<ImageBatch> {
        self.batch.subscribe()
    }

    pub fn subscribe_video(&self) -> tokio::sync::watch::Receiver<VideoJob> {
        self.video.subscribe()
    }
}
