use std::sync::Arc;
use std::time::Duration;

use httpmock::Method::GET;
use httpmock::MockServer;
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::auth::StaticToken;
use crate::config::{ClientConfig, PollSettings, StreamSettings, TokenPlacement};
use crate::domain::{FileStatus, ProjectStatus};
use crate::store::ApplyEvent;
use crate::stream::ConnectionState;
use crate::testing::{sample_file, sample_project, MockFileBackend, MockProjectBackend};

use super::{apply_message, LiveFiles, LiveProjects, SyncContext, SyncHub};

fn config(base_url: &str, stream_enabled: bool, poll_interval_ms: u64) -> ClientConfig {
    ClientConfig {
        base_url: base_url.to_string(),
        stream: StreamSettings {
            enabled: stream_enabled,
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

fn context(
    config: ClientConfig,
    projects: Arc<MockProjectBackend>,
    files: Arc<MockFileBackend>,
) -> SyncContext {
    SyncContext::with_backends(config, projects, files, Arc::new(StaticToken::new("tok")))
}

async fn wait_for(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

#[tokio::test]
async fn project_events_reach_the_store() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1/project/events")
                .query_param("token", "tok");
            then.status(200).body(
                "data: {\"event_type\":\"project.created\",\"project_id\":\"p9\",\
                 \"data\":{\"name\":\"Live\",\"status\":\"processing\"}}\n\
                 data: {\"event_type\":\"project.deleted\",\"project_id\":\"p1\"}\n",
            );
        })
        .await;

    let projects = Arc::new(MockProjectBackend::with_projects(vec![sample_project(
        "p1",
        ProjectStatus::Completed,
    )]));
    let ctx = context(
        config(&server.base_url(), true, 60_000),
        projects,
        Arc::new(MockFileBackend::with_files(Vec::new())),
    );

    let live = LiveProjects::start(&ctx).await;
    let store = Arc::clone(live.store());

    assert!(wait_for(|| store.get("p9").is_some() && store.get("p1").is_none()).await);
    mock.assert_async().await;
    assert_eq!(store.get("p9").unwrap().status, ProjectStatus::Processing);
    assert_eq!(store.processing_count(), 1);

    live.shutdown();
    assert_eq!(live.connection_state(), ConnectionState::Idle);
}

#[tokio::test]
async fn file_events_for_other_projects_are_ignored() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/project/p1/files/events");
            then.status(200).body(
                "data: {\"event_type\":\"file.created\",\"project_id\":\"p2\",\"file_id\":\"b\",\"file_name\":\"b.wav\"}\n\
                 data: {\"event_type\":\"file.created\",\"project_id\":\"p1\",\"file_id\":\"a\",\"file_name\":\"a.wav\"}\n",
            );
        })
        .await;

    let ctx = context(
        config(&server.base_url(), true, 60_000),
        Arc::new(MockProjectBackend::default()),
        Arc::new(MockFileBackend::with_files(Vec::new())),
    );

    let live = LiveFiles::start(&ctx, "p1").await;
    let store = Arc::clone(live.store());

    assert!(wait_for(|| store.get("a").is_some()).await);
    assert!(store.get("b").is_none());
    assert_eq!(store.get("a").unwrap().name, "a.wav");
    live.shutdown();
}

#[tokio::test]
async fn polling_picks_up_completion_without_stream() {
    let files = Arc::new(MockFileBackend::with_files(vec![sample_file(
        "a",
        FileStatus::Processing,
    )]));
    let ctx = context(
        config("http://127.0.0.1:9", false, 30),
        Arc::new(MockProjectBackend::default()),
        files.clone(),
    );

    let live = LiveFiles::start(&ctx, "p1").await;
    assert_eq!(live.connection_state(), ConnectionState::Idle);
    assert_eq!(live.store().processing_count(), 1);
    assert!(live.is_polling());

    let mut done = sample_file("a", FileStatus::Completed);
    done.transcription = Some("hello".to_string());
    files.set_files(vec![done]);

    let store = Arc::clone(live.store());
    assert!(wait_for(|| store.processing_count() == 0).await);
    assert_eq!(store.get("a").unwrap().transcription.as_deref(), Some("hello"));

    live.shutdown();
    assert!(wait_for(|| !live.is_polling()).await);
}

#[tokio::test]
async fn hub_keeps_one_file_channel_per_project() {
    let ctx = context(
        config("http://127.0.0.1:9", false, 60_000),
        Arc::new(MockProjectBackend::with_projects(vec![sample_project(
            "p1",
            ProjectStatus::Pending,
        )])),
        Arc::new(MockFileBackend::with_files(Vec::new())),
    );
    let hub = SyncHub::new(ctx);

    let projects = hub.start_projects().await;
    assert_eq!(projects.store().len(), 1);
    assert!(Arc::ptr_eq(&projects, &hub.start_projects().await));

    let first = hub.files_for("p2").await;
    let again = hub.files_for("p2").await;
    hub.files_for("p1").await;
    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!(hub.active_file_channels(), vec!["p1".to_string(), "p2".to_string()]);

    assert!(hub.release_files("p2"));
    assert!(!hub.release_files("p2"));
    assert_eq!(hub.active_file_channels(), vec!["p1".to_string()]);

    hub.shutdown().await;
    assert!(hub.active_file_channels().is_empty());
    assert!(hub.projects().await.is_none());
}

#[test]
fn undecodable_and_unknown_messages_change_nothing() {
    let store = crate::store::FileStore::new(
        "p1",
        Arc::new(MockFileBackend::with_files(Vec::new())),
        Default::default(),
    );

    assert!(!apply_message(&store, &json!({"event_type": "file.renamed"}), Some("p1")));
    assert!(!apply_message(&store, &json!({"event_type": "file.deleted"}), Some("p1")));
    assert!(!apply_message(&store, &json!("not an object"), Some("p1")));
    assert!(apply_message(
        &store,
        &json!({"event_type": "file.created", "file_id": "x"}),
        Some("p1")
    ));
    assert!(store.apply_event(&crate::events::DomainEvent::FileDeleted { id: "x".to_string() }));
}
