use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::{ApiError, FileBackend, FilePatch};
use crate::config::FetchOrdering;
use crate::domain::{AudioFile, FileStatus};
use crate::events::DomainEvent;
use crate::poll::Refreshable;

use super::state::{FetchOutcome, StoreCore};
use super::ApplyEvent;

/// Audio files of a single project.
pub struct FileStore {
    project_id: String,
    core: StoreCore<AudioFile>,
    backend: Arc<dyn FileBackend>,
}

impl FileStore {
    pub fn new(
        project_id: impl Into<String>,
        backend: Arc<dyn FileBackend>,
        ordering: FetchOrdering,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            core: StoreCore::new("files", ordering),
            backend,
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub async fn fetch_all(&self) -> Result<FetchOutcome, ApiError> {
        self.fetch(false).await
    }

    pub async fn fetch_all_silent(&self) -> Result<FetchOutcome, ApiError> {
        self.fetch(true).await
    }

    async fn fetch(&self, silent: bool) -> Result<FetchOutcome, ApiError> {
        let seq = self.core.begin_fetch(silent);
        let result = self.backend.list_files(&self.project_id).await;
        if let Err(error) = &result {
            warn!(project_id = %self.project_id, seq, silent, error = %error, "file fetch failed");
        }
        self.core.finish_fetch(seq, silent, result)
    }

    pub fn apply_created(&self, file: AudioFile) -> bool {
        self.core.mutate(|items| items.apply_created(file))
    }

    pub fn apply_updated(&self, file: AudioFile) -> bool {
        self.core.mutate(|items| items.apply_updated(file))
    }

    pub fn apply_deleted(&self, file_id: &str) -> bool {
        self.core.mutate(|items| items.apply_deleted(file_id))
    }

    pub fn optimistic_transition(
        &self,
        predicate: impl Fn(&AudioFile) -> bool,
        mutator: impl FnMut(&mut AudioFile),
    ) -> usize {
        self.core
            .mutate(|items| items.optimistic_transition(predicate, mutator))
    }

    pub async fn update_file(&self, file_id: &str, patch: &FilePatch) -> Result<AudioFile, ApiError> {
        match self
            .backend
            .update_file(&self.project_id, file_id, patch)
            .await
        {
            Ok(file) => {
                self.apply_updated(file.clone());
                Ok(file)
            }
            Err(error) => {
                self.core.record_error(&error);
                Err(error)
            }
        }
    }

    pub async fn rename_file(&self, file_id: &str, name: &str) -> Result<AudioFile, ApiError> {
        self.update_file(file_id, &FilePatch::rename(name)).await
    }

    pub async fn delete_file(&self, file_id: &str) -> Result<(), ApiError> {
        match self.backend.delete_file(&self.project_id, file_id).await {
            Ok(()) => {
                info!(project_id = %self.project_id, file_id, "file deleted");
                self.apply_deleted(file_id);
                Ok(())
            }
            Err(error) => {
                self.core.record_error(&error);
                Err(error)
            }
        }
    }

    /// Ask the backend to transcribe every pending file.
    ///
    /// Pending files are shown as processing straight away. If the request
    /// fails, a refetch restores whatever the backend actually holds.
    pub async fn start_processing(&self, options: &Value) -> Result<Value, ApiError> {
        let flipped = self.optimistic_transition(
            |file| file.status == FileStatus::Pending,
            |file| file.status = FileStatus::Processing,
        );
        debug!(project_id = %self.project_id, flipped, "marked pending files as processing");

        match self.backend.start_processing(&self.project_id, options).await {
            Ok(response) => {
                info!(project_id = %self.project_id, flipped, "processing started");
                Ok(response)
            }
            Err(error) => {
                warn!(
                    project_id = %self.project_id,
                    error = %error,
                    "start processing failed; refetching files"
                );
                if let Err(refetch_error) = self.fetch_all().await {
                    warn!(
                        project_id = %self.project_id,
                        error = %refetch_error,
                        "refetch after failed start processing also failed"
                    );
                }
                self.core.record_error(&error);
                Err(error)
            }
        }
    }

    pub fn snapshot(&self) -> Vec<AudioFile> {
        self.core.snapshot()
    }

    pub fn get(&self, file_id: &str) -> Option<AudioFile> {
        self.core.get(file_id)
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

impl ApplyEvent for FileStore {
    fn apply_event(&self, event: &DomainEvent) -> bool {
        match event {
            DomainEvent::FileCreated(file) => self.apply_created(file.clone()),
            DomainEvent::FileUpdated(change) => {
                if change
                    .project_id
                    .as_deref()
                    .is_some_and(|project_id| project_id != self.project_id)
                {
                    return false;
                }
                self.core
                    .mutate(|items| items.update_with(&change.id, |file| change.apply_to(file)))
            }
            DomainEvent::FileDeleted { id } => self.apply_deleted(id),
            DomainEvent::ProjectCreated(_)
            | DomainEvent::ProjectUpdated(_)
            | DomainEvent::ProjectDeleted { .. } => false,
        }
    }
}

#[async_trait]
impl Refreshable for FileStore {
    fn label(&self) -> String {
        format!("files:{}", self.project_id)
    }

    fn watch_processing(&self) -> watch::Receiver<usize> {
        self.core.watch_processing()
    }

    async fn refresh_silently(&self) -> Result<(), ApiError> {
        self.fetch_all_silent().await.map(|_| ())
    }
}
