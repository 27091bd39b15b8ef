//! Mapping of loosely-typed backend records onto the canonical entities.
//!
//! Every field alias the backend has ever used is listed exactly once here.
//! The functions are total: missing fields fall back to defaults and unknown
//! status words become `pending`. The only rejection is a record without any
//! usable identifier.

use serde_json::Value;

use super::types::{FileChange, FileStatus, Project, ProjectStatus};

const PROJECT_ID_KEYS: &[&str] = &["id", "project_id", "projectId"];
const PROJECT_NAME_KEYS: &[&str] = &["name", "project_name", "projectName"];
const PROJECT_DESCRIPTION_KEYS: &[&str] = &["description", "project_description"];
const PROJECT_FILE_COUNT_KEYS: &[&str] = &["audio_files", "audioFiles", "file_count", "files_count"];
const PROJECT_TRANSCRIPTION_COUNT_KEYS: &[&str] =
    &["transcriptions", "transcription_count", "transcriptions_count"];

const FILE_ID_KEYS: &[&str] = &["id", "file_id", "fileId"];
const FILE_NAME_KEYS: &[&str] = &["name", "file_name", "filename", "fileName"];
const FILE_TRANSCRIPTION_KEYS: &[&str] =
    &["transcription", "transcription_text", "transcription_content"];
const FILE_DURATION_KEYS: &[&str] = &["duration", "duration_seconds", "duration_ms"];
const FILE_SIZE_KEYS: &[&str] = &["file_size", "size_bytes", "size"];
const FILE_URL_KEYS: &[&str] = &["audio_url", "audioUrl", "file_url", "public_url", "url"];

const STATUS_KEYS: &[&str] = &["status", "processing_status", "transcription_status"];
const CREATED_KEYS: &[&str] = &["created_at", "createdAt", "created"];
const UPDATED_KEYS: &[&str] = &[
    "updated_at",
    "updatedAt",
    "modified_at",
    "lastModified",
    "last_modified",
];

/// Durations above this are taken to be milliseconds.
const MILLISECOND_THRESHOLD: f64 = 1000.0;

const PROJECT_STATUS_TABLE: &[(&str, ProjectStatus)] = &[
    ("pending", ProjectStatus::Pending),
    ("new", ProjectStatus::Pending),
    ("created", ProjectStatus::Pending),
    ("idle", ProjectStatus::Pending),
    ("draft", ProjectStatus::Pending),
    ("loading", ProjectStatus::Loading),
    ("uploading", ProjectStatus::Loading),
    ("processing", ProjectStatus::Processing),
    ("in_progress", ProjectStatus::Processing),
    ("running", ProjectStatus::Processing),
    ("transcribing", ProjectStatus::Processing),
    ("ongoing", ProjectStatus::Processing),
    ("queued", ProjectStatus::Processing),
    ("completed", ProjectStatus::Completed),
    ("complete", ProjectStatus::Completed),
    ("done", ProjectStatus::Completed),
    ("finished", ProjectStatus::Completed),
    ("success", ProjectStatus::Completed),
    ("succeeded", ProjectStatus::Completed),
    ("error", ProjectStatus::Error),
    ("failed", ProjectStatus::Error),
    ("failure", ProjectStatus::Error),
];

const FILE_STATUS_TABLE: &[(&str, FileStatus)] = &[
    ("pending", FileStatus::Pending),
    ("new", FileStatus::Pending),
    ("uploaded", FileStatus::Pending),
    ("created", FileStatus::Pending),
    ("queued", FileStatus::Queued),
    ("waiting", FileStatus::Queued),
    ("scheduled", FileStatus::Queued),
    ("processing", FileStatus::Processing),
    ("in_progress", FileStatus::Processing),
    ("running", FileStatus::Processing),
    ("transcribing", FileStatus::Processing),
    ("ongoing", FileStatus::Processing),
    ("completed", FileStatus::Completed),
    ("complete", FileStatus::Completed),
    ("done", FileStatus::Completed),
    ("finished", FileStatus::Completed),
    ("success", FileStatus::Completed),
    ("succeeded", FileStatus::Completed),
    ("transcribed", FileStatus::Completed),
    ("error", FileStatus::Error),
    ("failed", FileStatus::Error),
    ("failure", FileStatus::Error),
];

fn canonical_token(raw: &str) -> String {
    raw.trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .collect()
}

fn lookup<T: Copy>(table: &[(&str, T)], raw: &str, fallback: T) -> T {
    let token = canonical_token(raw);
    table
        .iter()
        .find(|(word, _)| *word == token)
        .map(|(_, status)| *status)
        .unwrap_or(fallback)
}

pub fn normalize_project_status(raw: &str) -> ProjectStatus {
    lookup(PROJECT_STATUS_TABLE, raw, ProjectStatus::Pending)
}

pub fn normalize_file_status(raw: &str) -> FileStatus {
    lookup(FILE_STATUS_TABLE, raw, FileStatus::Pending)
}

/// First alias holding a non-empty string (numbers are stringified).
fn first_string(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match value.get(*key)? {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    })
}

fn first_number(value: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| match value.get(*key)? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    })
}

/// Counts may arrive as a number or as the list being counted.
fn first_count(value: &Value, keys: &[&str]) -> Option<u32> {
    keys.iter().find_map(|key| match value.get(*key)? {
        Value::Array(items) => Some(u32::try_from(items.len()).unwrap_or(u32::MAX)),
        Value::Number(number) => number.as_f64().map(|n| n as u32),
        _ => None,
    })
}

fn transcription_text(value: &Value) -> Option<String> {
    first_string(value, FILE_TRANSCRIPTION_KEYS).or_else(|| {
        value
            .get("transcriptions")?
            .as_array()?
            .first()?
            .get("data")?
            .as_str()
            .filter(|text| !text.trim().is_empty())
            .map(str::to_string)
    })
}

fn duration_seconds(value: &Value) -> Option<f64> {
    let raw = first_number(value, FILE_DURATION_KEYS)?;
    if !raw.is_finite() || raw < 0.0 {
        return Some(0.0);
    }
    Some(if raw > MILLISECOND_THRESHOLD {
        raw / 1000.0
    } else {
        raw
    })
}

/// Normalize a project record. `None` when the record carries no id.
pub fn project_from_value(value: &Value) -> Option<Project> {
    let id = first_string(value, PROJECT_ID_KEYS)?;
    let created_at =
        first_string(value, CREATED_KEYS).unwrap_or_else(|| chrono::Utc::now().to_rfc3339());
    Some(Project {
        id,
        name: first_string(value, PROJECT_NAME_KEYS).unwrap_or_else(|| "Untitled".to_string()),
        description: first_string(value, PROJECT_DESCRIPTION_KEYS).unwrap_or_default(),
        status: first_string(value, STATUS_KEYS)
            .map(|raw| normalize_project_status(&raw))
            .unwrap_or_default(),
        file_count: first_count(value, PROJECT_FILE_COUNT_KEYS).unwrap_or(0),
        transcription_count: first_count(value, PROJECT_TRANSCRIPTION_COUNT_KEYS).unwrap_or(0),
        modified_at: first_string(value, UPDATED_KEYS).unwrap_or_else(|| created_at.clone()),
        created_at,
    })
}

/// Normalize whatever file fields a record carries, leaving the rest unset.
pub fn file_change_from_value(value: &Value) -> Option<FileChange> {
    let id = first_string(value, FILE_ID_KEYS)?;
    Some(FileChange {
        id,
        project_id: first_string(value, &["project_id", "projectId"]),
        name: first_string(value, FILE_NAME_KEYS),
        duration_secs: duration_seconds(value),
        size_bytes: first_number(value, FILE_SIZE_KEYS).map(|n| n.max(0.0) as u64),
        status: first_string(value, STATUS_KEYS).map(|raw| normalize_file_status(&raw)),
        transcription: transcription_text(value),
        created_at: first_string(value, CREATED_KEYS),
        updated_at: first_string(value, UPDATED_KEYS),
        audio_url: first_string(value, FILE_URL_KEYS),
    })
}

pub fn file_from_value(value: &Value) -> Option<super::AudioFile> {
    file_change_from_value(value).map(FileChange::into_file)
}
