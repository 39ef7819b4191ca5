use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;
use crate::models::video::VideoState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub credential_selected: bool,
    pub image_batch_in_progress: bool,
    pub video_state: VideoState,
}

/// GET /health — liveness plus a summary of session state.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let studio = &state.studio;
    let credential_selected = studio.credential_selected();

    Json(HealthResponse {
        status: if credential_selected {
            "ok".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        checks: HealthChecks {
            credential_selected,
            image_batch_in_progress: studio.batch_snapshot().in_progress,
            video_state: studio.video_snapshot().state,
        },
    })
}
