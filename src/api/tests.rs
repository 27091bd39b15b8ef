use std::sync::Arc;

use httpmock::Method::{DELETE, GET, PATCH, POST};
use httpmock::MockServer;
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::api::{
    describe_service_error, ApiError, BackendClient, ExportFormat, FileBackend, FilePatch,
    ProjectBackend, ProjectDraft,
};
use crate::auth::{AuthSession, StaticToken, TokenProvider};
use crate::config::ClientConfig;
use crate::domain::{FileStatus, ProjectStatus};

fn client_for(server: &MockServer, tokens: Arc<dyn TokenProvider>) -> BackendClient {
    let config = ClientConfig {
        base_url: server.base_url(),
        api_key: Some("key-1".to_string()),
        ..ClientConfig::default()
    };
    BackendClient::new(&config, tokens).unwrap()
}

#[tokio::test]
async fn list_projects_sends_credentials_and_normalizes() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1/project")
                .header("authorization", "Bearer tok")
                .header("x-api-key", "key-1");
            then.status(200).json_body(json!({
                "projects": [
                    {"project_id": "p1", "project_name": "One", "status": "done"},
                    {"id": "p2", "name": "Two", "status": "transcribing", "audio_files": 4},
                    {"name": "no id"}
                ]
            }));
        })
        .await;

    let client = client_for(&server, Arc::new(StaticToken::new("tok")));
    let projects = client.list_projects().await.unwrap();

    mock.assert_async().await;
    assert_eq!(projects.len(), 2);
    assert_eq!(projects[0].id, "p1");
    assert_eq!(projects[0].status, ProjectStatus::Completed);
    assert_eq!(projects[1].status, ProjectStatus::Processing);
    assert_eq!(projects[1].file_count, 4);
}

#[tokio::test]
async fn list_files_accepts_bare_arrays() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/project/p1/files");
            then.status(200).json_body(json!([
                {"file_id": "f1", "file_name": "a.wav", "duration": 125000, "status": "queued"}
            ]));
        })
        .await;

    let client = client_for(&server, Arc::new(StaticToken::new("tok")));
    let files = client.list_files("p1").await.unwrap();

    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name, "a.wav");
    assert_eq!(files[0].duration_secs, 125.0);
    assert_eq!(files[0].status, FileStatus::Queued);
}

#[tokio::test]
async fn unauthorized_marks_session_expired() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/project");
            then.status(401).json_body(json!({"message": "jwt expired"}));
        })
        .await;

    let session = Arc::new(AuthSession::new(Some("tok".to_string())));
    let client = client_for(&server, session.clone());
    let error = client.list_projects().await.unwrap_err();

    assert_eq!(error, ApiError::SessionExpired);
    assert!(session.is_expired());
    assert_eq!(session.access_token().await, None);
}

#[tokio::test]
async fn http_errors_keep_backend_message() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1/project/p1/download")
                .query_param("format", "tsv");
            then.status(400)
                .json_body(json!({"message": "All files must be transcribed before export"}));
        })
        .await;

    let client = client_for(&server, Arc::new(StaticToken::new("tok")));
    let error = client
        .download_dataset("p1", ExportFormat::Tsv)
        .await
        .unwrap_err();

    assert_eq!(error.status(), Some(400));
    assert_eq!(
        error.friendly_message(),
        "All files must be transcribed before export"
    );
}

#[tokio::test]
async fn download_returns_bytes_and_metadata() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1/project/p1/download")
                .query_param("format", "csv");
            then.status(200)
                .header("content-type", "text/csv")
                .header("content-disposition", "attachment; filename=\"dataset.csv\"")
                .body("file,text\na.wav,hello\n");
        })
        .await;

    let client = client_for(&server, Arc::new(StaticToken::new("tok")));
    let dataset = client
        .download_dataset("p1", ExportFormat::Csv)
        .await
        .unwrap();

    assert_eq!(dataset.content_type.as_deref(), Some("text/csv"));
    assert_eq!(dataset.file_name.as_deref(), Some("dataset.csv"));
    assert_eq!(dataset.bytes, b"file,text\na.wav,hello\n".to_vec());
}

#[tokio::test]
async fn create_and_rename_use_backend_field_names() {
    let server = MockServer::start_async().await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/project")
                .json_body(json!({"name": "Podcast", "description": "weekly"}));
            then.status(201)
                .json_body(json!({"data": {"id": "p7", "name": "Podcast", "description": "weekly"}}));
        })
        .await;
    let rename = server
        .mock_async(|when, then| {
            when.method(PATCH)
                .path("/v1/project/p7/files/f1")
                .json_body(json!({"file_name": "intro.wav"}));
            then.status(200).json_body(json!({"file": {"file_name": "intro.wav"}}));
        })
        .await;

    let client = client_for(&server, Arc::new(StaticToken::new("tok")));
    let project = client
        .create_project(&ProjectDraft {
            name: "Podcast".to_string(),
            description: "weekly".to_string(),
        })
        .await
        .unwrap();
    let file = client
        .update_file("p7", "f1", &FilePatch::rename("intro.wav"))
        .await
        .unwrap();

    create.assert_async().await;
    rename.assert_async().await;
    assert_eq!(project.id, "p7");
    assert_eq!(file.id, "f1");
    assert_eq!(file.name, "intro.wav");
}

#[tokio::test]
async fn deletes_and_processing_hit_expected_routes() {
    let server = MockServer::start_async().await;
    let delete_file = server
        .mock_async(|when, then| {
            when.method(DELETE).path("/v1/project/p1/files/f1");
            then.status(204);
        })
        .await;
    let process = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/project/p1/process")
                .json_body(json!({"language": "en"}));
            then.status(202).json_body(json!({"queued": 3}));
        })
        .await;

    let client = client_for(&server, Arc::new(StaticToken::none()));
    client.delete_file("p1", "f1").await.unwrap();
    let accepted = client
        .start_processing("p1", &json!({"language": "en"}))
        .await
        .unwrap();

    delete_file.assert_async().await;
    process.assert_async().await;
    assert_eq!(accepted, json!({"queued": 3}));
}

#[tokio::test]
async fn unreachable_backend_is_a_request_error() {
    let config = ClientConfig {
        base_url: "http://127.0.0.1:9".to_string(),
        ..ClientConfig::default()
    };
    let client = BackendClient::new(&config, Arc::new(StaticToken::none())).unwrap();
    let error = client.list_projects().await.unwrap_err();
    assert!(matches!(error, ApiError::Request(_)), "{error:?}");
}

#[test]
fn friendly_messages_by_status() {
    let http = |status: u16, message: &str| ApiError::Http {
        status,
        message: message.to_string(),
    };
    assert_eq!(
        http(403, "HTTP 403").friendly_message(),
        "You do not have permission to perform this action."
    );
    assert_eq!(
        http(404, "missing").friendly_message(),
        "The requested resource could not be found."
    );
    assert_eq!(
        http(500, "boom").friendly_message(),
        "Something went wrong on our end. Please try again in a moment."
    );
    assert_eq!(
        http(400, "").friendly_message(),
        "The request was invalid. Please check your input and try again."
    );
}

#[test]
fn backend_message_extraction() {
    use crate::api::backend_message;
    assert_eq!(backend_message(400, r#"{"message":"bad name"}"#), "bad name");
    assert_eq!(backend_message(400, r#"{"error":"nope"}"#), "nope");
    assert_eq!(
        backend_message(422, r#"{"detail":[{"loc":"name"}]}"#),
        r#"[{"loc":"name"}]"#
    );
    assert_eq!(backend_message(502, "<html>bad gateway</html>"), "HTTP 502");
    assert_eq!(backend_message(500, ""), "HTTP 500");
    assert_eq!(backend_message(503, "upstream down"), "upstream down");
}

#[test]
fn service_error_classification() {
    let outage = describe_service_error(Some("HTTP 503: Service Unavailable"));
    assert_eq!(outage.title, "Service temporarily unavailable");
    assert!(outage.is_service_outage);

    assert_eq!(
        describe_service_error(Some("TypeError: Failed to fetch")).title,
        "Connection problem"
    );
    assert_eq!(
        describe_service_error(Some("request timed out")).title,
        "Request timed out"
    );
    assert_eq!(
        describe_service_error(Some("Internal Server Error")).title,
        "Server error"
    );
    assert_eq!(describe_service_error(Some("HTTP 404")).title, "Not found");

    let client = describe_service_error(Some("HTTP 422: name taken"));
    assert_eq!(client.title, "Request error");
    assert_eq!(client.description, "HTTP 422: name taken");
    assert!(!client.is_service_outage);

    assert_eq!(describe_service_error(Some("HTTP 502")).title, "Server error");
    assert_eq!(describe_service_error(None).title, "Something went wrong");
    assert_eq!(
        describe_service_error(Some("quota exceeded")).title,
        "Unable to load projects"
    );
}
