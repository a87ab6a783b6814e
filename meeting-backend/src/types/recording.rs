//! Unified recording model across backends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingState {
    Published,
    Unpublished,
    Processing,
    Other(String),
}

impl RecordingState {
    /// Maps a provider's free-form state string.
    pub fn from_provider(state: &str) -> Self {
        match state.to_lowercase().as_str() {
            "published" | "completed" => RecordingState::Published,
            "unpublished" => RecordingState::Unpublished,
            "processing" | "processed" => RecordingState::Processing,
            other => RecordingState::Other(other.to_string()),
        }
    }
}

/// One recording as reported by a backend.
///
/// `metadata` keeps the raw provider record for display purposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub backend: String,
    pub id: String,
    pub name: Option<String>,
    pub url: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_secs: i64,
    pub state: RecordingState,
    pub image_previews: Vec<String>,
    pub metadata: Value,
}

impl Recording {
    pub fn is_published(&self) -> bool {
        self.state == RecordingState::Published
    }

    pub fn is_processing(&self) -> bool {
        self.state == RecordingState::Processing
    }

    /// Duration as `HH:MM:SS`.
    pub fn formatted_duration(&self) -> String {
        let secs = self.duration_secs.max(0);
        format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
