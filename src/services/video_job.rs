use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::models::upload::UploadedImage;
use crate::models::video::{AspectRatio, OperationHandle, VideoErrorKind, VideoJob, VideoState};
use crate::services::generation::{GenerationClient, GenerationError};
use crate::services::key_gate::KeyGate;

/// Message the remote service returns when the selected key no longer resolves.
///
/// This is a string match on provider output, not a structured error code.
pub const ENTITY_NOT_FOUND_SIGNATURE: &str = "Requested entity was not found.";

/// Map a submit/poll failure onto the job's failure kind.
pub fn classify_failure(err: &GenerationError) -> VideoErrorKind {
    match err {
        GenerationError::NoArtifactInResponse => VideoErrorKind::NoArtifactInResponse,
        other if is_key_rejection(&other.to_string()) => VideoErrorKind::KeyInvalid,
        _ => VideoErrorKind::TransportOrServiceError,
    }
}

fn is_key_rejection(message: &str) -> bool {
    message.contains(ENTITY_NOT_FOUND_SIGNATURE)
}

/// Inputs for one video generation.
#[derive(Debug, Clone)]
pub struct VideoRequest {
    pub image: Option<UploadedImage>,
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
}

/// Submit → poll → fetch state machine for a single video job.
///
/// Every run takes a fresh epoch. Snapshots are only published while the
/// run's epoch is current, so a superseded or cancelled run can never
/// overwrite the state of the job that replaced it.
pub struct VideoOrchestrator {
    client: Arc<dyn GenerationClient>,
    gate: Arc<KeyGate>,
    poll_interval: Duration,
    max_poll_attempts: Option<u32>,
    epoch: AtomicU64,
    state: watch::Sender<VideoJob>,
}

impl VideoOrchestrator {
    pub fn new(client: Arc<dyn GenerationClient>, gate: Arc<KeyGate>) -> Self {
        let (state, _) = watch::channel(VideoJob::default());
        Self {
            client,
            gate,
            poll_interval: Duration::from_secs(10),
            max_poll_attempts: None,
            epoch: AtomicU64::new(0),
            state,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Give up after `attempts` polls. Without this the loop runs until done.
    pub fn with_max_poll_attempts(mut self, attempts: Option<u32>) -> Self {
        self.max_poll_attempts = attempts;
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<VideoJob> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> VideoJob {
        self.state.borrow().clone()
    }

    /// Whether a job is between submission and its terminal state.
    pub fn is_active(&self) -> bool {
        let job = self.state.borrow();
        job.epoch != 0 && !job.is_terminal()
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }

    /// Publish `job` if its run has not been superseded.
    fn publish(&self, job: &VideoJob) -> bool {
        self.state.send_if_modified(|current| {
            if self.epoch.load(Ordering::SeqCst) != job.epoch {
                return false;
            }
            *current = job.clone();
            true
        })
    }

    /// Stop the active job. Its poll loop exits at the next wake-up and any
    /// late result is discarded.
    pub fn cancel(&self) -> bool {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let cancelled = self.state.send_if_modified(|job| {
            if job.epoch == 0 || !job.mark_cancelled() {
                return false;
            }
            job.epoch = epoch;
            true
        });
        if cancelled {
            tracing::info!(job_id = %self.state.borrow().id, "Video job cancelled");
        }
        cancelled
    }

    fn fail(&self, job: &mut VideoJob, kind: VideoErrorKind, message: impl Into<String>) {
        let message = message.into();
        if kind == VideoErrorKind::KeyInvalid {
            self.gate.invalidate();
        }
        job.mark_failed(kind, message.clone());
        if self.publish(job) {
            metrics::counter!("video_jobs_failed", "kind" => kind.to_string()).increment(1);
            tracing::warn!(job_id = %job.id, kind = %kind, error = %message, "Video job failed");
        }
    }

    /// Run one video job to a terminal state and return the final snapshot.
    ///
    /// Supersedes any job still in flight. All remote failures end up in the
    /// returned job's `Failed` state.
    pub async fn run_video_job(&self, request: VideoRequest) -> VideoJob {
        let job = self.begin(&request);
        self.run(job, request).await
    }

    /// Publish a new Idle job for `request`, superseding any active one.
    pub fn begin(&self, request: &VideoRequest) -> VideoJob {
        let job = self.fresh_job(request);
        self.state.send_replace(job.clone());
        job
    }

    /// Publish a new Idle job unless one is still active.
    ///
    /// The check and the publish happen under the same lock, so two
    /// back-to-back callers can never both claim the slot.
    pub fn try_begin(&self, request: &VideoRequest) -> Option<VideoJob> {
        let mut opened = None;
        self.state.send_if_modified(|current| {
            if current.epoch != 0 && !current.is_terminal() {
                return false;
            }
            let job = self.fresh_job(request);
            *current = job.clone();
            opened = Some(job);
            true
        });
        opened
    }

    fn fresh_job(&self, request: &VideoRequest) -> VideoJob {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        VideoJob::new(
            epoch,
            request.prompt.clone(),
            request.aspect_ratio,
            request.image.as_ref().map(|i| i.file_name.clone()),
        )
    }

    /// Drive a job opened with [`begin`](Self::begin) or
    /// [`try_begin`](Self::try_begin) to its terminal state.
    pub async fn run(&self, mut job: VideoJob, request: VideoRequest) -> VideoJob {
        let epoch = job.epoch;
        metrics::counter!("video_jobs_total").increment(1);
        tracing::info!(job_id = %job.id, aspect_ratio = %job.aspect_ratio, "Video job requested");

        let Some(image) = request.image.as_ref() else {
            self.fail(&mut job, VideoErrorKind::Validation, "Please upload an image first");
            return job;
        };
        if request.prompt.trim().is_empty() {
            self.fail(&mut job, VideoErrorKind::Validation, "Please enter a prompt for the video");
            return job;
        }

        job.advance(VideoState::AwaitingKey);
        self.publish(&job);
        if !self.gate.has_usable_credential().await {
            self.fail(
                &mut job,
                VideoErrorKind::KeyRequired,
                "Select an API key with billing enabled to generate videos",
            );
            return job;
        }
        if !self.is_current(epoch) {
            return job;
        }

        let started = std::time::Instant::now();
        let submitted = self
            .client
            .submit_video_job(&image.bytes, image.mime_type, &request.prompt, request.aspect_ratio)
            .await;
        let mut handle = match submitted {
            Ok(handle) => handle,
            Err(e) => {
                if self.is_current(epoch) {
                    self.fail(&mut job, classify_failure(&e), e.to_string());
                }
                return job;
            }
        };
        if !self.is_current(epoch) {
            return job;
        }

        job.operation = Some(handle.clone());
        job.advance(VideoState::Submitted);
        self.publish(&job);
        tracing::info!(job_id = %job.id, operation = %handle.name, "Video operation submitted");

        if !handle.done {
            job.advance(VideoState::Polling);
            self.publish(&job);
        }

        while !handle.done {
            if let Some(max) = self.max_poll_attempts {
                if job.poll_count >= max {
                    self.fail(
                        &mut job,
                        VideoErrorKind::TimedOut,
                        format!("Video generation did not finish after {} polls", max),
                    );
                    return job;
                }
            }

            tokio::time::sleep(self.poll_interval).await;
            if !self.is_current(epoch) {
                tracing::debug!(job_id = %job.id, "Superseded video job stopped polling");
                return job;
            }

            let polled = self.client.poll_video_job(&handle).await;
            if !self.is_current(epoch) {
                return job;
            }
            job.poll_count += 1;
            metrics::counter!("video_polls_total").increment(1);

            handle = match polled {
                Ok(updated) => updated,
                Err(e) => {
                    self.fail(&mut job, classify_failure(&e), e.to_string());
                    return job;
                }
            };
            job.operation = Some(handle.clone());
            self.publish(&job);
            tracing::debug!(
                job_id = %job.id,
                poll_count = job.poll_count,
                done = handle.done,
                "Polled video operation"
            );
        }

        if let Some(error) = handle.error.as_ref() {
            let kind = if is_key_rejection(&error.message) {
                VideoErrorKind::KeyInvalid
            } else {
                VideoErrorKind::TransportOrServiceError
            };
            self.fail(&mut job, kind, error.message.clone());
            return job;
        }

        let Some(locator) = handle.result_locator().map(str::to_string) else {
            self.fail(
                &mut job,
                VideoErrorKind::NoArtifactInResponse,
                "Video generation finished but returned no video",
            );
            return job;
        };

        let fetched = self.client.fetch_video_artifact(&locator).await;
        if !self.is_current(epoch) {
            return job;
        }
        match fetched {
            Ok(artifact) => {
                let size = artifact.size_bytes;
                job.mark_ready(artifact);
                if self.publish(&job) {
                    metrics::histogram!("video_generation_seconds")
                        .record(started.elapsed().as_secs_f64());
                    tracing::info!(
                        job_id = %job.id,
                        poll_count = job.poll_count,
                        size_bytes = size,
                        "Video job complete"
                    );
                }
            }
            Err(e) => {
                self.fail(&mut job, VideoErrorKind::TransportOrServiceError, e.to_string());
            }
        }
        job
    }

    /// The handle most recently reported for the current job.
    pub fn current_operation(&self) -> Option<OperationHandle> {
        self.state.borrow().operation.clone()
    }
}
