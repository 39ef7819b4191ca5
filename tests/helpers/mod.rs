//! Scripted test doubles for the generation client and the key-selection host

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use logo_remix::models::image::{ImageArtifact, ImageBatch, ResultState};
use logo_remix::models::style::Style;
use logo_remix::models::upload::ImageMime;
use logo_remix::models::video::{AspectRatio, OperationHandle, VideoArtifact};
use logo_remix::services::generation::{GenerationClient, GenerationError};
use logo_remix::services::key_gate::{GateError, KeySelectionHost};

use crate::fixtures;

/// One recorded outbound call.
#[derive(Debug, Clone)]
pub enum Call {
    Restyle {
        style: Style,
        at: Instant,
    },
    Submit {
        prompt: String,
        aspect_ratio: AspectRatio,
        at: Instant,
    },
    Poll {
        handle: OperationHandle,
        at: Instant,
    },
    Fetch {
        locator: String,
        at: Instant,
    },
}

/// Scripted outcome for a restyle call.
#[derive(Debug, Clone)]
pub enum RestyleOutcome {
    Fail(String),
    NoArtifact,
}

/// Scripted outcome for a submit or poll call.
#[derive(Debug, Clone)]
pub enum OperationOutcome {
    Handle(OperationHandle),
    Fail(String),
}

/// Generation client whose every response is scripted by the test.
///
/// Unscripted restyles succeed, unscripted submits return a fresh pending
/// operation, unscripted polls echo the handle back as still running, and
/// unscripted fetches return a small MP4 payload.
#[derive(Default)]
pub struct MockGenerationClient {
    restyle_outcomes: Mutex<HashMap<Style, RestyleOutcome>>,
    restyle_delay: Mutex<Option<Duration>>,
    submit_outcomes: Mutex<VecDeque<OperationOutcome>>,
    poll_scripts: Mutex<HashMap<String, VecDeque<OperationOutcome>>>,
    fetch_failure: Mutex<Option<(u16, String)>>,
    calls: Mutex<Vec<Call>>,
    submitted: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    batch_observer: Mutex<Option<watch::Receiver<ImageBatch>>>,
    observed_on_restyle: Mutex<Vec<Vec<(Style, ResultState)>>>,
}

impl MockGenerationClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_style(&self, style: Style, message: &str) {
        self.restyle_outcomes
            .lock()
            .unwrap()
            .insert(style, RestyleOutcome::Fail(message.to_string()));
    }

    pub fn no_artifact_for(&self, style: Style) {
        self.restyle_outcomes
            .lock()
            .unwrap()
            .insert(style, RestyleOutcome::NoArtifact);
    }

    /// Make each restyle take `delay` of (simulated) time.
    pub fn delay_restyles(&self, delay: Duration) {
        *self.restyle_delay.lock().unwrap() = Some(delay);
    }

    pub fn submit_returns(&self, handle: OperationHandle) {
        self.submit_outcomes
            .lock()
            .unwrap()
            .push_back(OperationOutcome::Handle(handle));
    }

    pub fn submit_fails(&self, message: &str) {
        self.submit_outcomes
            .lock()
            .unwrap()
            .push_back(OperationOutcome::Fail(message.to_string()));
    }

    /// Responses for successive polls of the operation called `name`.
    pub fn script_polls(&self, name: &str, outcomes: Vec<OperationOutcome>) {
        self.poll_scripts
            .lock()
            .unwrap()
            .insert(name.to_string(), outcomes.into());
    }

    pub fn fetch_fails(&self, status: u16, body: &str) {
        *self.fetch_failure.lock().unwrap() = Some((status, body.to_string()));
    }

    /// Record the published batch each time a restyle call starts.
    pub fn observe_batch(&self, receiver: watch::Receiver<ImageBatch>) {
        *self.batch_observer.lock().unwrap() = Some(receiver);
    }

    pub fn observed_on_restyle(&self) -> Vec<Vec<(Style, ResultState)>> {
        self.observed_on_restyle.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn restyled_styles(&self) -> Vec<Style> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Restyle { style, .. } => Some(style),
                _ => None,
            })
            .collect()
    }

    pub fn submit_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Submit { .. }))
            .count()
    }

    pub fn polls(&self) -> Vec<(OperationHandle, Instant)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Poll { handle, at } => Some((handle, at)),
                _ => None,
            })
            .collect()
    }

    pub fn fetches(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Fetch { locator, .. } => Some(locator),
                _ => None,
            })
            .collect()
    }

    pub fn submit_instant(&self) -> Option<Instant> {
        self.calls().into_iter().find_map(|c| match c {
            Call::Submit { at, .. } => Some(at),
            _ => None,
        })
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl GenerationClient for MockGenerationClient {
    async fn restyle_image(
        &self,
        image: &[u8],
        _mime_type: ImageMime,
        style: Style,
    ) -> Result<ImageArtifact, GenerationError> {
        assert!(!image.is_empty(), "orchestrator sent an empty image");
        self.record(Call::Restyle {
            style,
            at: Instant::now(),
        });

        let observed = self.batch_observer.lock().unwrap().as_ref().map(|rx| {
            rx.borrow()
                .results
                .iter()
                .map(|r| (r.style, r.state))
                .collect::<Vec<_>>()
        });
        if let Some(observed) = observed {
            self.observed_on_restyle.lock().unwrap().push(observed);
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = *self.restyle_delay.lock().unwrap();
        match delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let outcome = self.restyle_outcomes.lock().unwrap().get(&style).cloned();
        match outcome {
            Some(RestyleOutcome::Fail(message)) => Err(GenerationError::Service(message)),
            Some(RestyleOutcome::NoArtifact) => Err(GenerationError::NoArtifactInResponse),
            None => Ok(fixtures::restyled_artifact(style)),
        }
    }

    async fn submit_video_job(
        &self,
        image: &[u8],
        _mime_type: ImageMime,
        prompt: &str,
        aspect_ratio: AspectRatio,
    ) -> Result<OperationHandle, GenerationError> {
        assert!(!image.is_empty(), "orchestrator sent an empty image");
        self.record(Call::Submit {
            prompt: prompt.to_string(),
            aspect_ratio,
            at: Instant::now(),
        });
        let n = self.submitted.fetch_add(1, Ordering::SeqCst) + 1;

        let scripted = self.submit_outcomes.lock().unwrap().pop_front();
        match scripted {
            Some(OperationOutcome::Handle(handle)) => Ok(handle),
            Some(OperationOutcome::Fail(message)) => Err(GenerationError::Service(message)),
            None => Ok(OperationHandle::pending(format!("operations/{}", n))),
        }
    }

    async fn poll_video_job(
        &self,
        handle: &OperationHandle,
    ) -> Result<OperationHandle, GenerationError> {
        self.record(Call::Poll {
            handle: handle.clone(),
            at: Instant::now(),
        });

        let scripted = self
            .poll_scripts
            .lock()
            .unwrap()
            .get_mut(&handle.name)
            .and_then(|script| script.pop_front());
        match scripted {
            Some(OperationOutcome::Handle(updated)) => Ok(updated),
            Some(OperationOutcome::Fail(message)) => Err(GenerationError::Service(message)),
            None => Ok(OperationHandle::pending(handle.name.clone())),
        }
    }

    async fn fetch_video_artifact(&self, locator: &str) -> Result<VideoArtifact, GenerationError> {
        self.record(Call::Fetch {
            locator: locator.to_string(),
            at: Instant::now(),
        });

        let failure = self.fetch_failure.lock().unwrap().clone();
        match failure {
            Some((status, body)) => Err(GenerationError::ArtifactFetch { status, body }),
            None => Ok(VideoArtifact::new(
                fixtures::video_bytes(),
                "video/mp4",
                locator,
            )),
        }
    }
}

/// Host with both key-selection capabilities.
pub struct MockKeyHost {
    selected: AtomicBool,
    picker_selects: bool,
    pub picker_opened: AtomicUsize,
}

impl MockKeyHost {
    /// `selected`: initial answer; `picker_selects`: whether opening the picker selects a key.
    pub fn new(selected: bool, picker_selects: bool) -> Arc<Self> {
        Arc::new(Self {
            selected: AtomicBool::new(selected),
            picker_selects,
            picker_opened: AtomicUsize::new(0),
        })
    }

    pub fn set_selected(&self, selected: bool) {
        self.selected.store(selected, Ordering::SeqCst);
    }
}

#[async_trait]
impl KeySelectionHost for MockKeyHost {
    async fn has_selected_key(&self) -> Option<bool> {
        Some(self.selected.load(Ordering::SeqCst))
    }

    async fn open_key_selection(&self) -> Result<(), GateError> {
        self.picker_opened.fetch_add(1, Ordering::SeqCst);
        if self.picker_selects {
            self.selected.store(true, Ordering::SeqCst);
        }
        Ok(())
    }
}
