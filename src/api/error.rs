use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("session expired")]
    SessionExpired,
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("request failed: {0}")]
    Request(String),
    #[error("request timeout: {0}")]
    Timeout(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("config error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            return Self::Timeout(value.to_string());
        }
        Self::Request(value.to_string())
    }
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::SessionExpired => Some(401),
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }

    /// Text suitable for showing to a person.
    pub fn friendly_message(&self) -> String {
        match self {
            Self::SessionExpired => "Your session has expired. Please sign in again.".to_string(),
            Self::Http { status, message } => friendly_http_message(*status, message),
            Self::Request(_) => {
                "Unable to reach the server. Please check your connection and try again."
                    .to_string()
            }
            Self::Timeout(_) => {
                "The server took too long to respond. Please try again.".to_string()
            }
            Self::InvalidResponse(_) => {
                "The server sent a response we could not understand.".to_string()
            }
            Self::Config(message) => message.clone(),
        }
    }
}

fn friendly_http_message(status: u16, message: &str) -> String {
    let backend = message.trim();
    let fallback_only = backend.is_empty() || backend == format!("HTTP {status}");
    match status {
        400 | 409 | 422 if !fallback_only => backend.to_string(),
        400 | 422 => "The request was invalid. Please check your input and try again.".to_string(),
        403 => "You do not have permission to perform this action.".to_string(),
        404 => "The requested resource could not be found.".to_string(),
        500 => "Something went wrong on our end. Please try again in a moment.".to_string(),
        s if s >= 500 => {
            "The server is temporarily unavailable. Please try again in a moment.".to_string()
        }
        _ if !fallback_only => backend.to_string(),
        _ => format!("HTTP {status}"),
    }
}

/// Pull the most useful message out of an error body.
///
/// Looks at `message`, `error` and `detail` in a JSON body, falls back to a
/// short plain-text body, and finally to `HTTP <status>`.
pub fn backend_message(status: u16, body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        for key in ["message", "error", "detail"] {
            match json.get(key) {
                Some(Value::String(text)) => {
                    if !text.trim().is_empty() {
                        return text.trim().to_string();
                    }
                }
                Some(Value::Null) | None => {}
                Some(other) => return other.to_string(),
            }
        }
    }
    let text = body.trim();
    if !text.is_empty() && text.len() <= 200 && !text.starts_with('<') && !text.starts_with('{') {
        return text.to_string();
    }
    format!("HTTP {status}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceErrorView {
    pub title: String,
    pub description: String,
    pub is_service_outage: bool,
}

impl ServiceErrorView {
    fn new(title: &str, description: impl Into<String>, is_service_outage: bool) -> Self {
        Self {
            title: title.to_string(),
            description: description.into(),
            is_service_outage,
        }
    }
}

/// Classify free-form error text into a headline and description.
pub fn describe_service_error(error: Option<&str>) -> ServiceErrorView {
    let Some(error) = error.filter(|e| !e.trim().is_empty()) else {
        return ServiceErrorView::new("Something went wrong", "Please try again later.", false);
    };
    let lower = error.to_lowercase();

    if lower.contains("503")
        || lower.contains("service unavailable")
        || (lower.contains("server") && (lower.contains("down") || lower.contains("unavailable")))
    {
        return ServiceErrorView::new(
            "Service temporarily unavailable",
            "We're having trouble connecting to our servers. This is usually temporary, please try again in a moment.",
            true,
        );
    }

    if ["network", "connection", "fetch"]
        .iter()
        .any(|needle| lower.contains(needle))
    {
        return ServiceErrorView::new(
            "Connection problem",
            "Unable to reach our servers. Please check your internet connection and try again.",
            true,
        );
    }

    if lower.contains("timeout") || lower.contains("timed out") {
        return ServiceErrorView::new(
            "Request timed out",
            "The server took too long to respond. This might be temporary, please try again.",
            true,
        );
    }

    if lower.contains("500") || lower.contains("internal server error") {
        return ServiceErrorView::new(
            "Server error",
            "Something went wrong on our end. Please try again in a moment.",
            true,
        );
    }

    if lower.contains("404") || lower.contains("not found") {
        return ServiceErrorView::new(
            "Not found",
            "The requested resource could not be found.",
            false,
        );
    }

    if let Some(status) = http_status_in(error) {
        if status >= 500 {
            return ServiceErrorView::new(
                "Server error",
                "Our servers are experiencing issues. Please try again in a moment.",
                true,
            );
        }
        if (400..500).contains(&status) {
            return ServiceErrorView::new("Request error", error, false);
        }
    }

    ServiceErrorView::new("Unable to load projects", error, false)
}

/// Status code from an `HTTP <n>` fragment.
fn http_status_in(text: &str) -> Option<u16> {
    let (_, rest) = text.split_once("HTTP ")?;
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}
