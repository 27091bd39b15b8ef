use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::{ApiError, Dataset, ExportFormat, ProjectBackend, ProjectDraft, ProjectPatch};
use crate::config::FetchOrdering;
use crate::domain::Project;
use crate::events::DomainEvent;
use crate::poll::Refreshable;

use super::state::{FetchOutcome, StoreCore};
use super::ApplyEvent;

/// Every project visible to the signed-in user.
pub struct ProjectStore {
    core: StoreCore<Project>,
    backend: Arc<dyn ProjectBackend>,
}

impl ProjectStore {
    pub fn new(backend: Arc<dyn ProjectBackend>, ordering: FetchOrdering) -> Self {
        Self {
            core: StoreCore::new("projects", ordering),
            backend,
        }
    }

    pub async fn fetch_all(&self) -> Result<FetchOutcome, ApiError> {
        self.fetch(false).await
    }

    /// Like `fetch_all`, without touching the loading flag.
    pub async fn fetch_all_silent(&self) -> Result<FetchOutcome, ApiError> {
        self.fetch(true).await
    }

    async fn fetch(&self, silent: bool) -> Result<FetchOutcome, ApiError> {
        let seq = self.core.begin_fetch(silent);
        let result = self.backend.list_projects().await;
        if let Err(error) = &result {
            warn!(seq, silent, error = %error, "project fetch failed");
        }
        self.core.finish_fetch(seq, silent, result)
    }

    pub fn apply_created(&self, project: Project) -> bool {
        self.core.mutate(|items| items.apply_created(project))
    }

    pub fn apply_updated(&self, project: Project) -> bool {
        self.core.mutate(|items| items.apply_updated(project))
    }

    pub fn apply_deleted(&self, project_id: &str) -> bool {
        self.core.mutate(|items| items.apply_deleted(project_id))
    }

    pub fn optimistic_transition(
        &self,
        predicate: impl Fn(&Project) -> bool,
        mutator: impl FnMut(&mut Project),
    ) -> usize {
        self.core
            .mutate(|items| items.optimistic_transition(predicate, mutator))
    }

    pub async fn create_project(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Project, ApiError> {
        let draft = ProjectDraft {
            name: name.into(),
            description: description.into(),
        };
        match self.backend.create_project(&draft).await {
            Ok(project) => {
                info!(project_id = %project.id, "project created");
                self.apply_created(project.clone());
                self.core.clear_error();
                Ok(project)
            }
            Err(error) => {
                self.core.record_error(&error);
                Err(error)
            }
        }
    }

    pub async fn update_project(
        &self,
        project_id: &str,
        patch: &ProjectPatch,
    ) -> Result<Project, ApiError> {
        match self.backend.update_project(project_id, patch).await {
            Ok(project) => {
                self.apply_updated(project.clone());
                Ok(project)
            }
            Err(error) => {
                self.core.record_error(&error);
                Err(error)
            }
        }
    }

    pub async fn delete_project(&self, project_id: &str) -> Result<(), ApiError> {
        match self.backend.delete_project(project_id).await {
            Ok(()) => {
                info!(project_id, "project deleted");
                self.apply_deleted(project_id);
                Ok(())
            }
            Err(error) => {
                self.core.record_error(&error);
                Err(error)
            }
        }
    }

    /// Export the project's transcriptions. Errors are returned but not
    /// stored; the backend refuses exports of partially transcribed projects.
    pub async fn download_dataset(
        &self,
        project_id: &str,
        format: ExportFormat,
    ) -> Result<Dataset, ApiError> {
        let dataset = self.backend.download_dataset(project_id, format).await?;
        debug!(project_id, %format, bytes = dataset.bytes.len(), "dataset downloaded");
        Ok(dataset)
    }

    pub fn snapshot(&self) -> Vec<Project> {
        self.core.snapshot()
    }

    pub fn get(&self, project_id: &str) -> Option<Project> {
        self.core.get(project_id)
    }

    pub fn len(&self) -> usize {
        self.core.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_loading(&self) -> bool {
        self.core.is_loading()
    }

    pub fn last_error(&self) -> Option<ApiError> {
        self.core.last_error()
    }

    pub fn processing_count(&self) -> usize {
        self.core.processing_count()
    }

    pub fn watch_processing(&self) -> watch::Receiver<usize> {
        self.core.watch_processing()
    }
}

impl ApplyEvent for ProjectStore {
    fn apply_event(&self, event: &DomainEvent) -> bool {
        match event {
            DomainEvent::ProjectCreated(project) => self.apply_created(project.clone()),
            DomainEvent::ProjectUpdated(project) => self.apply_updated(project.clone()),
            DomainEvent::ProjectDeleted { id } => self.apply_deleted(id),
            DomainEvent::FileCreated(_)
            | DomainEvent::FileUpdated(_)
            | DomainEvent::FileDeleted { .. } => false,
        }
    }
}

#[async_trait]
impl Refreshable for ProjectStore {
    fn label(&self) -> String {
        "projects".to_string()
    }

    fn watch_processing(&self) -> watch::Receiver<usize> {
        self.core.watch_processing()
    }

    async fn refresh_silently(&self) -> Result<(), ApiError> {
        self.fetch_all_silent().await.map(|_| ())
    }
}
