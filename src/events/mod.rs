//! Typed domain events decoded from stream messages.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{file_change_from_value, project_from_value, AudioFile, FileChange, Project};


#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EventError {
    #[error("event has no event_type field")]
    MissingType,
    #[error("{kind} event carries no entity id")]
    MissingId { kind: EventKind },
    #[error("{kind} event payload is invalid: {reason}")]
    InvalidPayload { kind: EventKind, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ProjectCreated,
    ProjectUpdated,
    ProjectDeleted,
    FileCreated,
    FileUpdated,
    FileDeleted,
}

impl EventKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ProjectCreated => "project_created",
            Self::ProjectUpdated => "project_updated",
            Self::ProjectDeleted => "project_deleted",
            Self::FileCreated => "file.created",
            Self::FileUpdated => "file.updated",
            Self::FileDeleted => "file.deleted",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    /// Accepts both the dotted and the underscored spellings.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('.', "_").as_str() {
            "project_created" => Ok(Self::ProjectCreated),
            "project_updated" => Ok(Self::ProjectUpdated),
            "project_deleted" => Ok(Self::ProjectDeleted),
            "file_created" => Ok(Self::FileCreated),
            "file_updated" => Ok(Self::FileUpdated),
            "file_deleted" => Ok(Self::FileDeleted),
            other => Err(format!("unknown event type: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    ProjectCreated(Project),
    ProjectUpdated(Project),
    ProjectDeleted { id: String },
    FileCreated(AudioFile),
    FileUpdated(FileChange),
    FileDeleted { id: String },
}

impl DomainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ProjectCreated(_) => EventKind::ProjectCreated,
            Self::ProjectUpdated(_) => EventKind::ProjectUpdated,
            Self::ProjectDeleted { .. } => EventKind::ProjectDeleted,
            Self::FileCreated(_) => EventKind::FileCreated,
            Self::FileUpdated(_) => EventKind::FileUpdated,
            Self::FileDeleted { .. } => EventKind::FileDeleted,
        }
    }

    pub fn entity_id(&self) -> &str {
        match self {
            Self::ProjectCreated(project) | Self::ProjectUpdated(project) => &project.id,
            Self::FileCreated(file) => &file.id,
            Self::FileUpdated(change) => &change.id,
            Self::ProjectDeleted { id } | Self::FileDeleted { id } => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEvent {
    pub event: DomainEvent,
    /// Backend-assigned event id (`eid`), when present.
    pub correlation_id: Option<String>,
    /// Project the event belongs to, when the payload says so.
    pub project_id: Option<String>,
}

impl DecodedEvent {
    /// Decode a stream message payload.
    ///
    /// Returns `Ok(None)` for event kinds this client does not handle, and for
    /// project upserts that arrive without a project body.
    pub fn from_json(value: &Value) -> Result<Option<Self>, EventError> {
        let raw_kind = value
            .get("event_type")
            .or_else(|| value.get("type"))
            .and_then(Value::as_str)
            .ok_or(EventError::MissingType)?;
        let Ok(kind) = raw_kind.parse::<EventKind>() else {
            return Ok(None);
        };

        let correlation_id = string_field(value, &["eid", "event_id"]);
        let project_id = string_field(value, &["project_id", "projectId"]);

        let event = match kind {
            EventKind::ProjectCreated | EventKind::ProjectUpdated => {
                let Some(project) = project_payload(kind, value, project_id.as_deref())? else {
                    return Ok(None);
                };
                let project = project_from_value(&project).ok_or(EventError::MissingId { kind })?;
                if kind == EventKind::ProjectCreated {
                    DomainEvent::ProjectCreated(project)
                } else {
                    DomainEvent::ProjectUpdated(project)
                }
            }
            EventKind::ProjectDeleted => {
                let id = project_id
                    .clone()
                    .or_else(|| value.get("data").and_then(|data| string_field(data, &["id"])))
                    .ok_or(EventError::MissingId { kind })?;
                DomainEvent::ProjectDeleted { id }
            }
            EventKind::FileCreated | EventKind::FileUpdated => {
                let change = file_change_from_value(value).ok_or(EventError::MissingId { kind })?;
                if kind == EventKind::FileCreated {
                    DomainEvent::FileCreated(change.into_file())
                } else {
                    DomainEvent::FileUpdated(change)
                }
            }
            EventKind::FileDeleted => {
                let id = string_field(value, &["file_id", "fileId", "id"])
                    .ok_or(EventError::MissingId { kind })?;
                DomainEvent::FileDeleted { id }
            }
        };

        Ok(Some(Self {
            event,
            correlation_id,
            project_id,
        }))
    }
}

fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match value.get(*key)? {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    })
}

/// The project body of an upsert event, with the envelope's `project_id`
/// filled in when the body lacks an id of its own.
fn project_payload(
    kind: EventKind,
    value: &Value,
    envelope_id: Option<&str>,
) -> Result<Option<Value>, EventError> {
    let mut body = match value.get("data") {
        None | Some(Value::Null) => return Ok(None),
        Some(data @ Value::Object(_)) => data.clone(),
        Some(_) => {
            return Err(EventError::InvalidPayload {
                kind,
                reason: "data is not an object".to_string(),
            })
        }
    };
    if let (Some(id), Some(map)) = (envelope_id, body.as_object_mut()) {
        if !map.contains_key("id") {
            map.insert("id".to_string(), Value::String(id.to_string()));
        }
    }
    Ok(Some(body))
}
