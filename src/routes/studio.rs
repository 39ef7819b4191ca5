use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use garde::Validate;

use crate::app_state::AppState;
use crate::models::api::{
    AcceptedResponse, DownloadQuery, ErrorResponse, ImageBatchView, KeyStatusResponse,
    UploadResponse, VideoJobRequest, VideoJobView,
};
use crate::models::style::Style;
use crate::models::upload::{UploadError, UploadedImage};
use crate::services::export::{export_result, ExportError};
use crate::services::key_gate::GateError;
use crate::services::studio::StudioError;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl ToString) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            kind: None,
        }),
    )
}

fn studio_error(err: StudioError) -> ApiError {
    let status = match err {
        StudioError::NoImage => StatusCode::BAD_REQUEST,
        StudioError::BatchInProgress | StudioError::VideoInProgress => StatusCode::CONFLICT,
    };
    api_error(status, err)
}

fn upload_error(err: UploadError) -> ApiError {
    let status = match err {
        UploadError::UnsupportedFormat => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        UploadError::Empty | UploadError::Invalid(_) => StatusCode::BAD_REQUEST,
    };
    api_error(status, err)
}

/// `attachment` disposition for a name derived from the user's upload.
fn attachment(file_name: &str) -> String {
    let safe: String = file_name
        .chars()
        .filter(|c| !matches!(*c, '"' | '\\') && !c.is_control())
        .collect();
    format!("attachment; filename=\"{}\"", safe)
}

/// POST /api/v1/upload — Store a logo (multipart field `image`) for this session.
pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?
    {
        if field.name() == Some("image") {
            let file_name = field.file_name().unwrap_or("logo.png").to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;
            upload = Some(UploadedImage::from_bytes(data.to_vec(), file_name).map_err(upload_error)?);
        }
    }

    let upload = upload.ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Missing `image` field"))?;
    let response = UploadResponse {
        file_name: upload.file_name.clone(),
        mime_type: upload.mime_type.as_str().to_string(),
        size_bytes: upload.bytes.len(),
        styles: state.studio.styles().to_vec(),
    };
    state.studio.upload(upload).map_err(studio_error)?;

    Ok(Json(response))
}

/// POST /api/v1/images/generate — Restyle the upload into every configured style.
pub async fn generate_images(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<AcceptedResponse>), ApiError> {
    state.studio.start_image_batch().map_err(studio_error)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            status: "in_progress".to_string(),
            message: format!("Generating {} styles", state.studio.styles().len()),
        }),
    ))
}

/// GET /api/v1/images — Current batch snapshot.
pub async fn get_images(State(state): State<AppState>) -> Json<ImageBatchView> {
    Json(ImageBatchView::from(&state.studio.batch_snapshot()))
}

/// GET /api/v1/images/{style}/download — Re-encoded image as an attachment.
pub async fn download_image(
    State(state): State<AppState>,
    Path(style): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let style = Style::from_slug(&style)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Unknown style: {}", style)))?;

    let batch = state.studio.batch_snapshot();
    let result = batch
        .result(style)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, ExportError::NotReady))?;

    let exported = export_result(result, query.format).map_err(|e| match e {
        ExportError::NotReady => api_error(StatusCode::NOT_FOUND, e),
        ExportError::Decode(_) | ExportError::Encode(_) => {
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    })?;

    let disposition = attachment(&exported.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, exported.mime_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        exported.bytes,
    )
        .into_response())
}

/// POST /api/v1/video — Animate the upload from a text prompt.
pub async fn start_video(
    State(state): State<AppState>,
    Json(request): Json<VideoJobRequest>,
) -> Result<(StatusCode, Json<AcceptedResponse>), ApiError> {
    request
        .validate()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;

    state
        .studio
        .start_video_job(request.prompt, request.aspect_ratio)
        .map_err(studio_error)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            status: "submitted".to_string(),
            message: "Video generation started; this can take a few minutes".to_string(),
        }),
    ))
}

/// GET /api/v1/video — Current video job snapshot.
pub async fn get_video(State(state): State<AppState>) -> Json<VideoJobView> {
    Json(VideoJobView::from(&state.studio.video_snapshot()))
}

/// POST /api/v1/video/cancel — Stop polling the active job.
pub async fn cancel_video(State(state): State<AppState>) -> Result<Json<VideoJobView>, ApiError> {
    if !state.studio.cancel_video_job() {
        return Err(api_error(StatusCode::CONFLICT, "No active video job"));
    }
    Ok(Json(VideoJobView::from(&state.studio.video_snapshot())))
}

/// GET /api/v1/video/artifact — The finished video.
pub async fn get_video_artifact(State(state): State<AppState>) -> Result<Response, ApiError> {
    let job = state.studio.video_snapshot();
    let artifact = job
        .artifact
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "No finished video"))?;

    let file_name = format!(
        "{}-video.mp4",
        job.source_file_name
            .as_deref()
            .map(crate::models::upload::file_stem)
            .unwrap_or("logo")
    );
    Ok((
        [
            (header::CONTENT_TYPE, artifact.mime_type),
            (header::CONTENT_DISPOSITION, attachment(&file_name)),
        ],
        artifact.bytes,
    )
        .into_response())
}

/// GET /api/v1/key — Last evaluated credential state.
pub async fn key_status(State(state): State<AppState>) -> Json<KeyStatusResponse> {
    Json(KeyStatusResponse {
        selected: state.studio.credential_selected(),
        message: None,
    })
}

/// POST /api/v1/key/select — Run the host's key picker and re-check.
pub async fn select_key(State(state): State<AppState>) -> Json<KeyStatusResponse> {
    let outcome = state.studio.request_credential_selection().await;
    let selected = state.studio.credential_selected();
    let message = match outcome {
        Ok(true) => None,
        Ok(false) => Some("No API key was selected".to_string()),
        Err(GateError::SelectionUnavailable) => Some(if selected {
            "Using the locally configured API key".to_string()
        } else {
            "Key selection is unavailable; set API_KEY in the environment".to_string()
        }),
        Err(e) => Some(e.to_string()),
    };
    Json(KeyStatusResponse { selected, message })
}
