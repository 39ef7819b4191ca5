use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::models::style::Style;

/// Decoded image returned by a restyle call.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ImageArtifact {
    #[serde(rename = "data", serialize_with = "as_base64")]
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImageArtifact {
    /// `data:` URL suitable for direct rendering.
    pub fn data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

fn as_base64<T, S>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: AsRef<[u8]>,
    S: Serializer,
{
    serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes.as_ref()))
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResultState {
    Pending,
    Ready,
    Failed,
}

/// Outcome of restyling one upload into one style.
#[derive(Debug, Clone, Serialize)]
pub struct ImageResult {
    pub style: Style,
    pub state: ResultState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ImageArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub source_file_name: String,
}

impl ImageResult {
    pub fn pending(style: Style, source_file_name: impl Into<String>) -> Self {
        Self {
            style,
            state: ResultState::Pending,
            artifact: None,
            error_message: None,
            source_file_name: source_file_name.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state != ResultState::Pending
    }

    /// Pending -> Ready. Returns false if the result already settled.
    pub fn mark_ready(&mut self, artifact: ImageArtifact) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.state = ResultState::Ready;
        self.artifact = Some(artifact);
        true
    }

    /// Pending -> Failed. Returns false if the result already settled.
    pub fn mark_failed(&mut self, message: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.state = ResultState::Failed;
        self.error_message = Some(message.into());
        true
    }
}

/// All per-style results for one generate action.
#[derive(Debug, Clone, Serialize)]
pub struct ImageBatch {
    pub id: Uuid,
    pub results: Vec<ImageResult>,
    /// One line per failed style, in catalog order.
    pub errors: Vec<String>,
    pub in_progress: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Default for ImageBatch {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            results: Vec::new(),
            errors: Vec::new(),
            in_progress: false,
            started_at: None,
            finished_at: None,
        }
    }
}

impl ImageBatch {
    /// Fresh, in-progress batch with no results yet.
    pub fn start() -> Self {
        Self {
            id: Uuid::new_v4(),
            in_progress: true,
            started_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    /// Aggregate error log shown above the results.
    pub fn error_log(&self) -> String {
        self.errors.join("\n")
    }

    pub fn result(&self, style: Style) -> Option<&ImageResult> {
        self.results.iter().find(|r| r.style == style)
    }

    pub fn ready_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.state == ResultState::Ready)
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.state == ResultState::Failed)
            .count()
    }
}

/// Line appended to the batch error log when a style fails.
pub fn failure_line(style: Style, message: &str) -> String {
    format!("Failed to generate {} style: {}", style, message)
}
