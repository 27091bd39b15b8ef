use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::TokenProvider;
use crate::config::ClientConfig;
use crate::domain::{file_from_value, project_from_value, AudioFile, Project};

use super::error::{backend_message, ApiError};
use super::routes::ApiRoutes;
use super::types::{
    disposition_file_name, list_items, single_item, Dataset, ExportFormat, FilePatch,
    ProjectDraft, ProjectPatch,
};

/// Project endpoints the project store depends on.
#[async_trait]
pub trait ProjectBackend: Send + Sync {
    async fn list_projects(&self) -> Result<Vec<Project>, ApiError>;
    async fn create_project(&self, draft: &ProjectDraft) -> Result<Project, ApiError>;
    async fn update_project(&self, project_id: &str, patch: &ProjectPatch)
        -> Result<Project, ApiError>;
    async fn delete_project(&self, project_id: &str) -> Result<(), ApiError>;
    async fn download_dataset(
        &self,
        project_id: &str,
        format: ExportFormat,
    ) -> Result<Dataset, ApiError>;
}

/// File endpoints the file store depends on.
#[async_trait]
pub trait FileBackend: Send + Sync {
    async fn list_files(&self, project_id: &str) -> Result<Vec<AudioFile>, ApiError>;
    async fn update_file(
        &self,
        project_id: &str,
        file_id: &str,
        patch: &FilePatch,
    ) -> Result<AudioFile, ApiError>;
    async fn delete_file(&self, project_id: &str, file_id: &str) -> Result<(), ApiError>;
    async fn start_processing(&self, project_id: &str, options: &Value)
        -> Result<Value, ApiError>;
}

/// reqwest-backed implementation of both backend traits.
pub struct BackendClient {
    http: reqwest::Client,
    routes: ApiRoutes,
    api_key: Option<String>,
    tokens: Arc<dyn TokenProvider>,
}

impl BackendClient {
    pub fn new(config: &ClientConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self, ApiError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|error| ApiError::Config(error.to_string()))?;

        Ok(Self {
            http,
            routes: ApiRoutes::from_config(config),
            api_key: config
                .api_key
                .as_deref()
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_string),
            tokens,
        })
    }

    pub fn routes(&self) -> &ApiRoutes {
        &self.routes
    }

    async fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut request = self.http.request(method, url);
        if let Some(token) = self.tokens.access_token().await {
            request = request.bearer_auth(token);
        }
        if let Some(key) = &self.api_key {
            request = request.header("X-API-Key", key);
        }
        request
    }

    /// Send and turn non-2xx statuses into errors.
    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        debug!(url = %response.url(), status = status.as_u16(), "backend response");

        if status == StatusCode::UNAUTHORIZED {
            warn!(url = %response.url(), "backend rejected credentials");
            self.tokens.on_unauthorized();
            return Err(ApiError::SessionExpired);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Http {
                status: status.as_u16(),
                message: backend_message(status.as_u16(), &body),
            });
        }

        Ok(response)
    }

    async fn send_json(&self, request: RequestBuilder) -> Result<Value, ApiError> {
        let response = self.send(request).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|error| {
            ApiError::InvalidResponse(format!("failed to parse response JSON: {error}"))
        })
    }
}

/// Fill in the id a single-entity response may omit.
fn with_fallback_id(mut record: Value, key: &str, id: &str) -> Value {
    if let Some(map) = record.as_object_mut() {
        if !map.contains_key("id") && !map.contains_key(key) {
            map.insert("id".to_string(), Value::String(id.to_string()));
        }
    }
    record
}

#[async_trait]
impl ProjectBackend for BackendClient {
    async fn list_projects(&self) -> Result<Vec<Project>, ApiError> {
        let request = self.request(Method::GET, &self.routes.projects()).await;
        let payload = self.send_json(request).await?;
        let records = list_items(payload)?;
        let total = records.len();
        let projects: Vec<Project> = records.iter().filter_map(project_from_value).collect();
        if projects.len() < total {
            warn!(
                skipped = total - projects.len(),
                "dropped project records without an id"
            );
        }
        Ok(projects)
    }

    async fn create_project(&self, draft: &ProjectDraft) -> Result<Project, ApiError> {
        let request = self
            .request(Method::POST, &self.routes.projects())
            .await
            .json(draft);
        let payload = self.send_json(request).await?;
        project_from_value(&single_item(payload, "project")).ok_or_else(|| {
            ApiError::InvalidResponse("created project has no id".to_string())
        })
    }

    async fn update_project(
        &self,
        project_id: &str,
        patch: &ProjectPatch,
    ) -> Result<Project, ApiError> {
        let request = self
            .request(Method::PATCH, &self.routes.project(project_id))
            .await
            .json(patch);
        let payload = self.send_json(request).await?;
        let record = with_fallback_id(single_item(payload, "project"), "project_id", project_id);
        project_from_value(&record).ok_or_else(|| {
            ApiError::InvalidResponse("updated project has no id".to_string())
        })
    }

    async fn delete_project(&self, project_id: &str) -> Result<(), ApiError> {
        let request = self
            .request(Method::DELETE, &self.routes.project(project_id))
            .await;
        self.send(request).await?;
        Ok(())
    }

    async fn download_dataset(
        &self,
        project_id: &str,
        format: ExportFormat,
    ) -> Result<Dataset, ApiError> {
        let request = self
            .request(Method::GET, &self.routes.project_download(project_id))
            .await
            .query(&[("format", format.as_str())]);
        let response = self.send(request).await?;
        let headers = response.headers();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let file_name = headers
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(disposition_file_name);
        let bytes = response.bytes().await?;
        Ok(Dataset {
            format,
            content_type,
            file_name,
            bytes: bytes.to_vec(),
        })
    }
}

#[async_trait]
impl FileBackend for BackendClient {
    async fn list_files(&self, project_id: &str) -> Result<Vec<AudioFile>, ApiError> {
        let request = self
            .request(Method::GET, &self.routes.project_files(project_id))
            .await;
        let payload = self.send_json(request).await?;
        let records = list_items(payload)?;
        let total = records.len();
        let files: Vec<AudioFile> = records.iter().filter_map(file_from_value).collect();
        if files.len() < total {
            warn!(
                project_id,
                skipped = total - files.len(),
                "dropped file records without an id"
            );
        }
        Ok(files)
    }

    async fn update_file(
        &self,
        project_id: &str,
        file_id: &str,
        patch: &FilePatch,
    ) -> Result<AudioFile, ApiError> {
        let request = self
            .request(Method::PATCH, &self.routes.project_file(project_id, file_id))
            .await
            .json(&patch.to_body());
        let payload = self.send_json(request).await?;
        let record = with_fallback_id(single_item(payload, "file"), "file_id", file_id);
        file_from_value(&record)
            .ok_or_else(|| ApiError::InvalidResponse("updated file has no id".to_string()))
    }

    async fn delete_file(&self, project_id: &str, file_id: &str) -> Result<(), ApiError> {
        let request = self
            .request(Method::DELETE, &self.routes.project_file(project_id, file_id))
            .await;
        self.send(request).await?;
        Ok(())
    }

    async fn start_processing(
        &self,
        project_id: &str,
        options: &Value,
    ) -> Result<Value, ApiError> {
        let request = self
            .request(Method::POST, &self.routes.project_process(project_id))
            .await
            .json(options);
        self.send_json(request).await
    }
}
