//! In-memory backends and fixtures for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::api::{
    ApiError, Dataset, ExportFormat, FileBackend, FilePatch, ProjectBackend, ProjectDraft,
    ProjectPatch,
};
use crate::domain::{AudioFile, FileStatus, Project, ProjectStatus};

pub(crate) fn sample_project(id: &str, status: ProjectStatus) -> Project {
    Project {
        id: id.to_string(),
        name: format!("Project {id}"),
        description: String::new(),
        status,
        file_count: 0,
        transcription_count: 0,
        created_at: "2025-01-01T00:00:00Z".to_string(),
        modified_at: "2025-01-01T00:00:00Z".to_string(),
    }
}

pub(crate) fn sample_file(id: &str, status: FileStatus) -> AudioFile {
    AudioFile {
        id: id.to_string(),
        name: format!("{id}.wav"),
        duration_secs: 60.0,
        size_bytes: 1024,
        status,
        transcription: None,
        created_at: "2025-01-01T00:00:00Z".to_string(),
        updated_at: "2025-01-01T00:00:00Z".to_string(),
        audio_url: None,
    }
}

type Scripted<T> = (Duration, Result<Vec<T>, ApiError>);

/// Project backend serving `projects`, unless a scripted list response is queued.
#[derive(Default)]
pub(crate) struct MockProjectBackend {
    pub projects: Mutex<Vec<Project>>,
    scripted: Mutex<VecDeque<Scripted<Project>>>,
    pub fail_mutations: Mutex<Option<ApiError>>,
    pub list_calls: AtomicUsize,
}

impl MockProjectBackend {
    pub fn with_projects(projects: Vec<Project>) -> Self {
        let backend = Self::default();
        *backend.projects.lock().unwrap() = projects;
        backend
    }

    /// Queue one list response, delivered after `delay`.
    pub fn script_list(&self, delay: Duration, result: Result<Vec<Project>, ApiError>) {
        self.scripted.lock().unwrap().push_back((delay, result));
    }

    fn mutation_error(&self) -> Option<ApiError> {
        self.fail_mutations.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProjectBackend for MockProjectBackend {
    async fn list_projects(&self) -> Result<Vec<Project>, ApiError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.scripted.lock().unwrap().pop_front();
        match scripted {
            Some((delay, result)) => {
                tokio::time::sleep(delay).await;
                result
            }
            None => Ok(self.projects.lock().unwrap().clone()),
        }
    }

    async fn create_project(&self, draft: &ProjectDraft) -> Result<Project, ApiError> {
        if let Some(error) = self.mutation_error() {
            return Err(error);
        }
        let mut projects = self.projects.lock().unwrap();
        let mut project = sample_project(&format!("new-{}", projects.len() + 1), ProjectStatus::Pending);
        project.name = draft.name.clone();
        project.description = draft.description.clone();
        projects.insert(0, project.clone());
        Ok(project)
    }

    async fn update_project(
        &self,
        project_id: &str,
        patch: &ProjectPatch,
    ) -> Result<Project, ApiError> {
        if let Some(error) = self.mutation_error() {
            return Err(error);
        }
        let mut projects = self.projects.lock().unwrap();
        let project = projects
            .iter_mut()
            .find(|project| project.id == project_id)
            .ok_or_else(|| ApiError::Http {
                status: 404,
                message: "project not found".to_string(),
            })?;
        if let Some(name) = &patch.name {
            project.name = name.clone();
        }
        if let Some(description) = &patch.description {
            project.description = description.clone();
        }
        Ok(project.clone())
    }

    async fn delete_project(&self, project_id: &str) -> Result<(), ApiError> {
        if let Some(error) = self.mutation_error() {
            return Err(error);
        }
        self.projects
            .lock()
            .unwrap()
            .retain(|project| project.id != project_id);
        Ok(())
    }

    async fn download_dataset(
        &self,
        _project_id: &str,
        format: ExportFormat,
    ) -> Result<Dataset, ApiError> {
        if let Some(error) = self.mutation_error() {
            return Err(error);
        }
        Ok(Dataset {
            format,
            content_type: Some("text/csv".to_string()),
            file_name: None,
            bytes: b"file,text\n".to_vec(),
        })
    }
}

/// File backend holding the backend's view of one project's files.
pub(crate) struct MockFileBackend {
    pub files: Mutex<Vec<AudioFile>>,
    scripted: Mutex<VecDeque<Scripted<AudioFile>>>,
    pub process_result: Mutex<Result<Value, ApiError>>,
    pub list_calls: AtomicUsize,
    pub process_calls: AtomicUsize,
}

impl MockFileBackend {
    pub fn with_files(files: Vec<AudioFile>) -> Self {
        Self {
            files: Mutex::new(files),
            scripted: Mutex::new(VecDeque::new()),
            process_result: Mutex::new(Ok(json!({"status": "accepted"}))),
            list_calls: AtomicUsize::new(0),
            process_calls: AtomicUsize::new(0),
        }
    }

    pub fn script_list(&self, delay: Duration, result: Result<Vec<AudioFile>, ApiError>) {
        self.scripted.lock().unwrap().push_back((delay, result));
    }

    pub fn set_files(&self, files: Vec<AudioFile>) {
        *self.files.lock().unwrap() = files;
    }
}

#[async_trait]
impl FileBackend for MockFileBackend {
    async fn list_files(&self, _project_id: &str) -> Result<Vec<AudioFile>, ApiError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.scripted.lock().unwrap().pop_front();
        match scripted {
            Some((delay, result)) => {
                tokio::time::sleep(delay).await;
                result
            }
            None => Ok(self.files.lock().unwrap().clone()),
        }
    }

    async fn update_file(
        &self,
        _project_id: &str,
        file_id: &str,
        patch: &FilePatch,
    ) -> Result<AudioFile, ApiError> {
        let mut files = self.files.lock().unwrap();
        let file = files
            .iter_mut()
            .find(|file| file.id == file_id)
            .ok_or_else(|| ApiError::Http {
                status: 404,
                message: "file not found".to_string(),
            })?;
        if let Some(name) = &patch.name {
            file.name = name.clone();
        }
        Ok(file.clone())
    }

    async fn delete_file(&self, _project_id: &str, file_id: &str) -> Result<(), ApiError> {
        self.files.lock().unwrap().retain(|file| file.id != file_id);
        Ok(())
    }

    async fn start_processing(
        &self,
        _project_id: &str,
        _options: &Value,
    ) -> Result<Value, ApiError> {
        self.process_calls.fetch_add(1, Ordering::SeqCst);
        self.process_result.lock().unwrap().clone()
    }
}
