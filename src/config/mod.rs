use serde::Deserialize;
use std::time::Duration;

use crate::models::style::Style;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000"). Unused by the render binary.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Locally configured credential. Used when no key-selection host is present.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL of the generative media API
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Model used for image restyling
    #[serde(default = "default_image_model")]
    pub image_model: String,

    /// Model used for image-to-video generation
    #[serde(default = "default_video_model")]
    pub video_model: String,

    /// Declared output resolution tier for video jobs
    #[serde(default = "default_video_resolution")]
    pub video_resolution: String,

    /// Fixed wait between video operation polls
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Optional cap on poll attempts. Unset means poll until done.
    #[serde(default)]
    pub max_poll_attempts: Option<u32>,

    /// Per-request HTTP timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Comma-separated style names, in the order they should be generated
    #[serde(default)]
    pub styles: Option<String>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_image_model() -> String {
    "gemini-2.5-flash-image".to_string()
}

fn default_video_model() -> String {
    "veo-3.1-fast-generate-preview".to_string()
}

fn default_video_resolution() -> String {
    "720p".to_string()
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config: Self = envy::from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Build from explicit key/value pairs, with the same names as the environment.
    pub fn from_pairs<I>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: Self = envy::from_iter(pairs)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        self.style_catalog()?;
        Ok(())
    }

    /// Styles to generate per batch. Falls back to the full catalog.
    pub fn style_catalog(&self) -> Result<Vec<Style>, ConfigError> {
        let Some(raw) = self.styles.as_deref().filter(|s| !s.trim().is_empty()) else {
            return Ok(Style::catalog());
        };

        let mut styles = Vec::new();
        for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let style = name
                .parse::<Style>()
                .map_err(|_| ConfigError::UnknownStyle(name.to_string()))?;
            if !styles.contains(&style) {
                styles.push(style);
            }
        }
        Ok(styles)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The local credential, ignoring blank values.
    pub fn local_api_key(&self) -> Option<String> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Env(#[from] envy::Error),

    #[error("Unknown style in STYLES: {0}")]
    UnknownStyle(String),

    #[error("POLL_INTERVAL_SECS must be at least 1")]
    ZeroPollInterval,
}
