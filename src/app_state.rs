use std::sync::Arc;
use std::time::Instant;

use crate::services::studio::Studio;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub studio: Arc<Studio>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(studio: Studio) -> Self {
        Self {
            studio: Arc::new(studio),
            started_at: Instant::now(),
        }
    }
}
