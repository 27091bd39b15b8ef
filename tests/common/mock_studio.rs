//! An httpmock-backed stand-in for the transcription backend.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use httpmock::Method::{GET, POST};
use httpmock::{Mock, MockServer};
use serde_json::Value;

use scribeline_lib::auth::AuthSession;
use scribeline_lib::config::{ClientConfig, PollSettings, StreamSettings, TokenPlacement};

pub const TOKEN: &str = "integration-token";
pub const EVENT_DELAY: Duration = Duration::from_millis(200);

/// Render stream payloads as `data:` lines.
pub fn event_body(events: &[Value]) -> String {
    events
        .iter()
        .map(|event| format!("data: {event}\n"))
        .collect()
}

pub struct MockStudio {
    pub server: MockServer,
    pub session: Arc<AuthSession>,
}

impl MockStudio {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start_async().await,
            session: Arc::new(AuthSession::new(Some(TOKEN.to_string()))),
        }
    }

    /// Config pointing at the mock, with reconnects slow enough that a
    /// closed stream is only requested once per test.
    pub fn config(&self, poll_interval_ms: u64) -> ClientConfig {
        ClientConfig {
            base_url: self.server.base_url(),
            api_key: Some("studio-key".to_string()),
            stream: StreamSettings {
                enabled: true,
                reconnect_base_ms: 5_000,
                max_backoff_ms: 10_000,
                token_placement: TokenPlacement::Query,
            },
            poll: PollSettings {
                enabled: true,
                interval_ms: poll_interval_ms,
            },
            ..ClientConfig::default()
        }
    }

    pub async fn projects(&self, body: Value) -> Mock<'_> {
        self.server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v1/project")
                    .header("authorization", format!("Bearer {TOKEN}"))
                    .header("x-api-key", "studio-key");
                then.status(200).json_body(body);
            })
            .await
    }

    pub async fn projects_status(&self, status: u16, body: Value) -> Mock<'_> {
        self.server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/project");
                then.status(status).json_body(body);
            })
            .await
    }

    pub async fn files(&self, project_id: &str, body: Value) -> Mock<'_> {
        let path = format!("/v1/project/{project_id}/files");
        self.server
            .mock_async(|when, then| {
                when.method(GET).path(path);
                then.status(200).json_body(body);
            })
            .await
    }

    pub async fn process(&self, project_id: &str, status: u16, body: Value) -> Mock<'_> {
        let path = format!("/v1/project/{project_id}/process");
        self.server
            .mock_async(|when, then| {
                when.method(POST).path(path);
                then.status(status).json_body(body);
            })
            .await
    }

    /// Events are held back by `EVENT_DELAY` so the initial fetch lands first.
    pub async fn project_events(&self, events: &[Value]) -> Mock<'_> {
        self.events("/v1/project/events".to_string(), events).await
    }

    pub async fn file_events(&self, project_id: &str, events: &[Value]) -> Mock<'_> {
        self.events(format!("/v1/project/{project_id}/files/events"), events)
            .await
    }

    async fn events(&self, path: String, events: &[Value]) -> Mock<'_> {
        let body = event_body(events);
        self.server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(path)
                    .query_param("token", TOKEN)
                    .header("accept", "text/event-stream");
                then.status(200)
                    .header("content-type", "text/event-stream")
                    .delay(EVENT_DELAY)
                    .body(body);
            })
            .await
    }
}
