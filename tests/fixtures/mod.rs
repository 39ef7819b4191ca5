//! In-memory images for orchestration tests

#![allow(dead_code)]

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use logo_remix::models::image::ImageArtifact;
use logo_remix::models::style::Style;
use logo_remix::models::upload::UploadedImage;
use std::io::Cursor;

pub const LOGO_FILE_NAME: &str = "acme-logo.png";

/// Small opaque PNG standing in for an uploaded logo.
pub fn logo_png() -> Vec<u8> {
    solid_png(8, 8, Rgba([20, 120, 220, 255]))
}

pub fn solid_png(width: u32, height: u32, pixel: Rgba<u8>) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, pixel);
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut out, ImageFormat::Png)
        .expect("encode fixture png");
    out.into_inner()
}

pub fn uploaded_logo() -> UploadedImage {
    UploadedImage::from_bytes(logo_png(), LOGO_FILE_NAME).expect("fixture upload is valid")
}

/// Deterministic "restyled" output: a solid image whose color depends on the style.
pub fn restyled_artifact(style: Style) -> ImageArtifact {
    let shade = (style as u8).wrapping_mul(23);
    ImageArtifact {
        bytes: solid_png(4, 4, Rgba([shade, 255 - shade, 128, 255])),
        mime_type: "image/png".to_string(),
    }
}

pub const VIDEO_URI: &str =
    "https://generativelanguage.googleapis.com/v1beta/files/clip-1:download?alt=media";

pub fn video_bytes() -> Vec<u8> {
    // ftyp box header of an MP4 file
    vec![0, 0, 0, 0x18, b'f', b't', b'y', b'p', b'm', b'p', b'4', b'2']
}
