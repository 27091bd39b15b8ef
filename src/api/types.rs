use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Tsv,
}

impl ExportFormat {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Tsv => "tsv",
        }
    }
}

impl Default for ExportFormat {
    fn default() -> Self {
        Self::Csv
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "tsv" => Ok(Self::Tsv),
            _ => Err(format!("unsupported export format: {value}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilePatch {
    pub name: Option<String>,
}

impl FilePatch {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }

    /// The backend calls the display name `file_name`.
    pub fn to_body(&self) -> Value {
        let mut body = serde_json::Map::new();
        if let Some(name) = &self.name {
            body.insert("file_name".to_string(), json!(name));
        }
        Value::Object(body)
    }
}

/// A downloaded project export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    pub format: ExportFormat,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

const LIST_KEYS: &[&str] = &["data", "files", "projects", "items"];

/// Records out of a list response: a bare array or an object wrapping one.
pub fn list_items(payload: Value) -> Result<Vec<Value>, ApiError> {
    match payload {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => LIST_KEYS
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .ok_or_else(|| {
                ApiError::InvalidResponse("list response carries no array of records".to_string())
            }),
        Value::Null => Ok(Vec::new()),
        other => Err(ApiError::InvalidResponse(format!(
            "expected a list response, got {}",
            json_kind(&other)
        ))),
    }
}

/// The record out of a single-entity response, unwrapping `key` or `data`.
pub fn single_item(payload: Value, key: &str) -> Value {
    match payload {
        Value::Object(mut map) => {
            if let Some(inner @ Value::Object(_)) = map.remove(key) {
                return inner;
            }
            if let Some(inner @ Value::Object(_)) = map.remove("data") {
                return inner;
            }
            Value::Object(map)
        }
        other => other,
    }
}

/// Best-effort `filename=` from a Content-Disposition header.
pub fn disposition_file_name(header: &str) -> Option<String> {
    header.split(';').find_map(|part| {
        let (key, value) = part.trim().split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("filename") {
            return None;
        }
        let value = value.trim().trim_matches('"');
        (!value.is_empty()).then(|| value.to_string())
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
