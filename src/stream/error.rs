/// Why a stream attempt ended, or why a line was dropped.
///
/// These never surface as return values; they drive the reconnect loop and
/// reach the optional error observer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    #[error("no access token available")]
    MissingToken,
    #[error("request failed: {0}")]
    Request(String),
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("stream read failed: {0}")]
    Body(String),
    #[error("stream closed by server")]
    Closed,
    #[error("failed to parse event data: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for StreamError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_body() || value.is_decode() {
            return Self::Body(value.to_string());
        }
        Self::Request(value.to_string())
    }
}
