//! Canonical project and audio-file entities.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Entity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Pending,
    Loading,
    Processing,
    Completed,
    Error,
}

impl ProjectStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Loading => "loading",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    pub const fn all() -> &'static [ProjectStatus] {
        &[
            ProjectStatus::Pending,
            ProjectStatus::Loading,
            ProjectStatus::Processing,
            ProjectStatus::Completed,
            ProjectStatus::Error,
        ]
    }
}

impl Default for ProjectStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = std::convert::Infallible;

    /// Never fails: unknown vocabularies fall back to `pending`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(super::normalize::normalize_project_status(value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Pending,
    Queued,
    Processing,
    Completed,
    Error,
}

impl FileStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    pub const fn all() -> &'static [FileStatus] {
        &[
            FileStatus::Pending,
            FileStatus::Queued,
            FileStatus::Processing,
            FileStatus::Completed,
            FileStatus::Error,
        ]
    }
}

impl Default for FileStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FileStatus {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(super::normalize::normalize_file_status(value))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: ProjectStatus,
    pub file_count: u32,
    pub transcription_count: u32,
    pub created_at: String,
    pub modified_at: String,
}

impl Entity for Project {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_processing(&self) -> bool {
        self.status == ProjectStatus::Processing
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioFile {
    pub id: String,
    pub name: String,
    /// Length of the recording in seconds.
    pub duration_secs: f64,
    pub size_bytes: u64,
    pub status: FileStatus,
    pub transcription: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub audio_url: Option<String>,
}

impl AudioFile {
    pub fn duration_label(&self) -> String {
        format_duration(self.duration_secs)
    }

    pub fn size_label(&self) -> String {
        format_file_size(self.size_bytes)
    }

    pub fn has_transcription(&self) -> bool {
        self.transcription
            .as_deref()
            .map(|text| !text.trim().is_empty())
            .unwrap_or(false)
    }
}

impl Entity for AudioFile {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_processing(&self) -> bool {
        self.status == FileStatus::Processing
    }
}

/// Partial file record, as carried by `file.updated` events and loosely-typed
/// backend payloads. Absent fields leave the current value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileChange {
    pub id: String,
    pub project_id: Option<String>,
    pub name: Option<String>,
    pub duration_secs: Option<f64>,
    pub size_bytes: Option<u64>,
    pub status: Option<FileStatus>,
    pub transcription: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub audio_url: Option<String>,
}

impl FileChange {
    /// Merge this change into an existing file.
    pub fn apply_to(&self, file: &mut AudioFile) {
        if let Some(name) = &self.name {
            file.name = name.clone();
        }
        if let Some(duration) = self.duration_secs {
            file.duration_secs = duration;
        }
        if let Some(size) = self.size_bytes {
            file.size_bytes = size;
        }
        if let Some(status) = self.status {
            file.status = status;
        }
        if let Some(transcription) = &self.transcription {
            file.transcription = Some(transcription.clone());
        }
        if let Some(created_at) = &self.created_at {
            file.created_at = created_at.clone();
        }
        if let Some(updated_at) = &self.updated_at {
            file.updated_at = updated_at.clone();
        }
        if let Some(audio_url) = &self.audio_url {
            file.audio_url = Some(audio_url.clone());
        }
        settle_transcribed_status(file);
    }

    /// Materialize a full file, filling absent fields with defaults.
    pub fn into_file(self) -> AudioFile {
        let created_at = self
            .created_at
            .unwrap_or_else(|| chrono::Utc::now().to_rfc3339());
        let mut file = AudioFile {
            id: self.id,
            name: self.name.unwrap_or_else(|| "Unknown".to_string()),
            duration_secs: self.duration_secs.unwrap_or(0.0),
            size_bytes: self.size_bytes.unwrap_or(0),
            status: self.status.unwrap_or_default(),
            transcription: self.transcription,
            updated_at: self.updated_at.unwrap_or_else(|| created_at.clone()),
            created_at,
            audio_url: self.audio_url,
        };
        settle_transcribed_status(&mut file);
        file
    }
}

/// A file that already carries its transcription is done, whatever the
/// backend's status field still says.
fn settle_transcribed_status(file: &mut AudioFile) {
    if file.status == FileStatus::Processing && file.has_transcription() {
        file.status = FileStatus::Completed;
    }
}

/// Format seconds as `HH:MM:SS`.
pub fn format_duration(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "00:00:00".to_string();
    }
    let total = seconds.floor() as u64;
    let hrs = total / 3600;
    let mins = (total % 3600) / 60;
    let secs = total % 60;
    format!("{hrs:02}:{mins:02}:{secs:02}")
}

pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}
