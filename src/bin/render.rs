use logo_remix::{
    config::AppConfig,
    models::{image::ResultState, upload::UploadedImage, video::AspectRatio, video::VideoState},
    services::export::{export_result, ExportFormat},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEFAULT_OUT_DIR: &str = "renders";

/// Usage: `render <logo.png> [video prompt]`
///
/// Writes every restyled logo (and the video, when a prompt is given) into
/// `$RENDER_OUT_DIR` (default `renders/`).
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let mut args = std::env::args().skip(1);
    let input = PathBuf::from(args.next().ok_or("usage: render <image> [video prompt]")?);
    let prompt: Option<String> = {
        let rest: Vec<String> = args.collect();
        (!rest.is_empty()).then(|| rest.join(" "))
    };

    let config = AppConfig::from_env()?;
    let out_dir = std::env::var("RENDER_OUT_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_OUT_DIR));
    let aspect_ratio: AspectRatio = std::env::var("RENDER_ASPECT_RATIO")
        .ok()
        .map(|v| v.parse::<AspectRatio>())
        .transpose()?
        .unwrap_or(AspectRatio::Wide);

    tracing::info!(input = %input.display(), out_dir = %out_dir.display(), "Starting render");

    let studio = Arc::new(logo_remix::build_gemini_studio(&config)?);
    studio.refresh_credentials().await;

    let file_name = input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("logo.png")
        .to_string();
    let upload = UploadedImage::from_bytes(std::fs::read(&input)?, file_name)?;
    studio.upload(upload)?;
    std::fs::create_dir_all(&out_dir)?;

    let batch = studio.start_image_batch()?.await?;
    for result in &batch.results {
        if result.state != ResultState::Ready {
            continue;
        }
        let exported = export_result(result, ExportFormat::Png)?;
        let path = write_output(&out_dir, &exported.file_name, &exported.bytes)?;
        tracing::info!(style = %result.style, path = %path.display(), "Wrote restyled logo");
    }
    if !batch.errors.is_empty() {
        tracing::warn!(failed = batch.failed_count(), log = %batch.error_log(), "Some styles failed");
    }

    let Some(prompt) = prompt else {
        return Ok(());
    };

    let job = studio.start_video_job(prompt, aspect_ratio)?.await?;
    match (job.state, job.artifact) {
        (VideoState::Ready, Some(artifact)) => {
            let stem = logo_remix::models::upload::file_stem(
                job.source_file_name.as_deref().unwrap_or("logo"),
            )
            .to_string();
            let path = write_output(&out_dir, &format!("{}-video.mp4", stem), &artifact.bytes)?;
            tracing::info!(path = %path.display(), poll_count = job.poll_count, "Wrote video");
            Ok(())
        }
        (state, _) => {
            let message = job.error_message.unwrap_or_else(|| format!("{:?}", state));
            tracing::error!(kind = ?job.error_kind, error = %message, "Video generation failed");
            Err(message.into())
        }
    }
}

fn write_output(dir: &Path, file_name: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
    let path = dir.join(file_name);
    std::fs::write(&path, bytes)?;
    Ok(path)
}
