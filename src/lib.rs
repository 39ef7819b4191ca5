//! Logo Remix
//!
//! Restyles an uploaded logo into a catalog of artistic styles with a Gemini
//! image model, and animates it into a short clip with a Veo video model.
//! The orchestrators in [`services`] own all job state; the HTTP layer in
//! [`routes`] only submits intents and renders snapshots.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use config::{AppConfig, ConfigError};
use services::generation::{GeminiClient, GeminiSettings, GenerationClient, GenerationError};
use services::image_batch::BatchOrchestrator;
use services::key_gate::{KeyGate, KeySelectionHost};
use services::studio::Studio;
use services::video_job::VideoOrchestrator;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to build generation client: {0}")]
    Client(#[from] GenerationError),
}

/// Gemini client settings derived from configuration.
pub fn gemini_settings(config: &AppConfig) -> GeminiSettings {
    GeminiSettings {
        api_base: config.api_base.clone(),
        api_key: config.local_api_key(),
        image_model: config.image_model.clone(),
        video_model: config.video_model.clone(),
        video_resolution: config.video_resolution.clone(),
        request_timeout: config.request_timeout(),
    }
}

/// Wire a studio around an arbitrary client and optional key-selection host.
pub fn build_studio(
    config: &AppConfig,
    client: Arc<dyn GenerationClient>,
    host: Option<Arc<dyn KeySelectionHost>>,
) -> Result<Studio, StartupError> {
    let styles = config.style_catalog()?;
    let local_key = config.local_api_key();
    let gate = Arc::new(KeyGate::new(host, local_key.as_deref()));

    let batch = BatchOrchestrator::new(Arc::clone(&client));
    let video = VideoOrchestrator::new(client, Arc::clone(&gate))
        .with_poll_interval(config.poll_interval())
        .with_max_poll_attempts(config.max_poll_attempts);

    Ok(Studio::new(styles, batch, video, gate))
}

/// Studio backed by the real Gemini/Veo client.
pub fn build_gemini_studio(config: &AppConfig) -> Result<Studio, StartupError> {
    let client = GeminiClient::new(gemini_settings(config))?;
    build_studio(config, Arc::new(client), None)
}
