use garde::Validate;
use serde::Serialize;
use strum::{Display, EnumString};

/// Image encodings accepted for upload and sent to the remote models.
#[derive(Debug, Clone, Copy, Serialize, EnumString, Display, PartialEq, Eq)]
pub enum ImageMime {
    #[strum(serialize = "image/png")]
    #[serde(rename = "image/png")]
    Png,
    #[strum(serialize = "image/jpeg")]
    #[serde(rename = "image/jpeg")]
    Jpeg,
}

impl ImageMime {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageMime::Png => "image/png",
            ImageMime::Jpeg => "image/jpeg",
        }
    }
}

/// A logo uploaded by the user, sniffed and validated.
#[derive(Debug, Clone, Validate)]
pub struct UploadedImage {
    #[garde(length(min = 1))]
    pub bytes: Vec<u8>,

    #[garde(skip)]
    pub mime_type: ImageMime,

    #[garde(length(min = 1, max = 255))]
    pub file_name: String,
}

impl UploadedImage {
    /// Sniff the format from the payload itself; the client-declared type is not trusted.
    pub fn from_bytes(bytes: Vec<u8>, file_name: impl Into<String>) -> Result<Self, UploadError> {
        if bytes.is_empty() {
            return Err(UploadError::Empty);
        }

        let mime_type = match image::guess_format(&bytes) {
            Ok(image::ImageFormat::Png) => ImageMime::Png,
            Ok(image::ImageFormat::Jpeg) => ImageMime::Jpeg,
            _ => return Err(UploadError::UnsupportedFormat),
        };

        let upload = Self {
            bytes,
            mime_type,
            file_name: file_name.into(),
        };
        upload.validate()?;
        Ok(upload)
    }

    /// File name without its extension, used to name downloads.
    pub fn stem(&self) -> &str {
        file_stem(&self.file_name)
    }
}

pub fn file_stem(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Uploaded file is empty")]
    Empty,

    #[error("Unsupported image format (expected PNG or JPEG)")]
    UnsupportedFormat,

    #[error("Invalid upload: {0}")]
    Invalid(#[from] garde::Report),
}
