use chrono::Utc;
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

use crate::models::image::{failure_line, ImageBatch, ImageResult};
use crate::models::style::Style;
use crate::models::upload::UploadedImage;
use crate::services::generation::GenerationClient;

/// Drives one restyle call per style, strictly in catalog order.
///
/// The batch is owned here; observers only ever see published snapshots.
pub struct BatchOrchestrator {
    client: Arc<dyn GenerationClient>,
    state: watch::Sender<ImageBatch>,
}

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("Please upload an image first")]
    MissingImage,

    #[error("An image batch is already in progress")]
    InProgress,
}

impl BatchOrchestrator {
    pub fn new(client: Arc<dyn GenerationClient>) -> Self {
        let (state, _) = watch::channel(ImageBatch::default());
        Self { client, state }
    }

    pub fn subscribe(&self) -> watch::Receiver<ImageBatch> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> ImageBatch {
        self.state.borrow().clone()
    }

    pub fn in_progress(&self) -> bool {
        self.state.borrow().in_progress
    }

    /// Drop the previous batch (e.g. after a new upload). Refused mid-batch.
    pub fn clear(&self) -> Result<(), BatchError> {
        let mut refused = false;
        self.state.send_if_modified(|batch| {
            if batch.in_progress {
                refused = true;
                return false;
            }
            *batch = ImageBatch::default();
            true
        });
        if refused {
            return Err(BatchError::InProgress);
        }
        Ok(())
    }

    /// Restyle `image` into every style in `styles`, one at a time.
    ///
    /// Per-style failures are recorded on that style's result and in the
    /// error log; they never stop the remaining styles.
    pub async fn run_batch(
        &self,
        image: Option<&UploadedImage>,
        styles: &[Style],
    ) -> Result<ImageBatch, BatchError> {
        let image = image.ok_or(BatchError::MissingImage)?;
        let batch_id = self.begin()?;
        Ok(self.generate(batch_id, image, styles).await)
    }

    /// Claim the batch slot: publish a fresh in-progress batch, or fail if
    /// one is already running.
    pub fn begin(&self) -> Result<Uuid, BatchError> {
        let mut started = None;
        self.state.send_if_modified(|batch| {
            if batch.in_progress {
                return false;
            }
            let fresh = ImageBatch::start();
            started = Some(fresh.id);
            *batch = fresh;
            true
        });
        let batch_id = started.ok_or(BatchError::InProgress)?;
        metrics::gauge!("image_batch_in_progress").set(1.0);
        Ok(batch_id)
    }

    /// Run the per-style loop for a batch claimed with [`begin`](Self::begin).
    pub async fn generate(
        &self,
        batch_id: Uuid,
        image: &UploadedImage,
        styles: &[Style],
    ) -> ImageBatch {
        tracing::info!(
            batch_id = %batch_id,
            file_name = %image.file_name,
            styles = styles.len(),
            "Starting image batch"
        );

        for &style in styles {
            let mut slot = 0;
            self.state.send_modify(|batch| {
                batch
                    .results
                    .push(ImageResult::pending(style, image.file_name.clone()));
                slot = batch.results.len() - 1;
            });

            metrics::counter!("restyle_requests_total", "style" => style.slug()).increment(1);
            let start = std::time::Instant::now();
            let outcome = self
                .client
                .restyle_image(&image.bytes, image.mime_type, style)
                .await;

            let mut failure = None;
            self.state.send_modify(|batch| {
                let Some(result) = batch.results.get_mut(slot) else {
                    return;
                };
                match outcome {
                    Ok(artifact) => {
                        result.mark_ready(artifact);
                    }
                    Err(e) => {
                        let message = e.to_string();
                        result.mark_failed(message.clone());
                        batch.errors.push(failure_line(style, &message));
                        failure = Some(message);
                    }
                }
            });

            match failure {
                Some(error) => {
                    metrics::counter!("restyle_failures_total", "style" => style.slug())
                        .increment(1);
                    tracing::warn!(
                        batch_id = %batch_id,
                        style = %style,
                        error = %error,
                        "Style generation failed"
                    );
                }
                None => {
                    tracing::info!(
                        batch_id = %batch_id,
                        style = %style,
                        duration_ms = start.elapsed().as_millis(),
                        "Style generated"
                    );
                }
            }
        }

        self.state.send_modify(|batch| {
            batch.in_progress = false;
            batch.finished_at = Some(Utc::now());
        });
        metrics::gauge!("image_batch_in_progress").set(0.0);

        let finished = self.snapshot();
        tracing::info!(
            batch_id = %batch_id,
            ready = finished.ready_count(),
            failed = finished.failed_count(),
            "Image batch complete"
        );
        finished
    }
}
