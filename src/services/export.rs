use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use serde::Deserialize;
use std::io::Cursor;
use strum::{Display, EnumString};

use crate::models::image::{ImageResult, ResultState};
use crate::models::upload::file_stem;

/// Download formats offered for a generated image.
#[derive(Debug, Clone, Copy, Default, Deserialize, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ExportFormat {
    #[default]
    Png,
    #[strum(to_string = "jpeg", serialize = "jpg")]
    #[serde(alias = "jpg")]
    Jpeg,
    Webp,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpeg => "jpg",
            ExportFormat::Webp => "webp",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Png => "image/png",
            ExportFormat::Jpeg => "image/jpeg",
            ExportFormat::Webp => "image/webp",
        }
    }

    fn image_format(&self) -> ImageFormat {
        match self {
            ExportFormat::Png => ImageFormat::Png,
            ExportFormat::Jpeg => ImageFormat::Jpeg,
            ExportFormat::Webp => ImageFormat::WebP,
        }
    }
}

/// A re-encoded image ready to be served as an attachment.
#[derive(Debug, Clone)]
pub struct ExportedImage {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub file_name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("No generated image is available for this style")]
    NotReady,

    #[error("Generated image could not be decoded: {0}")]
    Decode(image::ImageError),

    #[error("Image could not be encoded: {0}")]
    Encode(image::ImageError),
}

/// `<upload stem>-<style slug>.<ext>`
pub fn download_name(result: &ImageResult, format: ExportFormat) -> String {
    format!(
        "{}-{}.{}",
        file_stem(&result.source_file_name),
        result.style.slug(),
        format.extension()
    )
}

/// Re-encode a ready result into `format`.
pub fn export_result(result: &ImageResult, format: ExportFormat) -> Result<ExportedImage, ExportError> {
    let artifact = match (&result.state, &result.artifact) {
        (ResultState::Ready, Some(artifact)) => artifact,
        _ => return Err(ExportError::NotReady),
    };

    let decoded = image::load_from_memory(&artifact.bytes).map_err(ExportError::Decode)?;
    let bytes = encode(decoded, format)?;

    Ok(ExportedImage {
        bytes,
        mime_type: format.mime_type(),
        file_name: download_name(result, format),
    })
}

fn encode(image: DynamicImage, format: ExportFormat) -> Result<Vec<u8>, ExportError> {
    let prepared = match format {
        // JPEG has no alpha channel; transparent regions become white.
        ExportFormat::Jpeg => DynamicImage::ImageRgb8(flatten_onto_white(&image.to_rgba8())),
        // The WebP encoder only accepts 8-bit RGB(A).
        ExportFormat::Webp => DynamicImage::ImageRgba8(image.to_rgba8()),
        ExportFormat::Png => image,
    };

    let mut out = Cursor::new(Vec::new());
    prepared
        .write_to(&mut out, format.image_format())
        .map_err(ExportError::Encode)?;
    Ok(out.into_inner())
}

fn flatten_onto_white(rgba: &RgbaImage) -> image::RgbImage {
    image::RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
        let alpha = a as u16;
        let blend = |c: u8| ((c as u16 * alpha + 255 * (255 - alpha)) / 255) as u8;
        image::Rgb([blend(r), blend(g), blend(b)])
    })
}
