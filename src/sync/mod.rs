//! Wires a store, its event stream and its polling fallback together.
//!
//! The stream listener and the poller never talk to each other; both only
//! write to the store.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::api::{ApiError, ApiRoutes, BackendClient, FileBackend, ProjectBackend};
use crate::auth::TokenProvider;
use crate::config::ClientConfig;
use crate::events::DecodedEvent;
use crate::poll::{PollingFallback, Refreshable};
use crate::store::{ApplyEvent, FileStore, ProjectStore};
use crate::stream::{ConnectionState, EventStreamClient};

#[cfg(test)]
mod tests;

/// Everything a live store needs: configuration, backends and credentials.
#[derive(Clone)]
pub struct SyncContext {
    config: Arc<ClientConfig>,
    projects: Arc<dyn ProjectBackend>,
    files: Arc<dyn FileBackend>,
    tokens: Arc<dyn TokenProvider>,
    routes: ApiRoutes,
}

impl SyncContext {
    /// Use one `BackendClient` for both project and file calls.
    pub fn new(config: ClientConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self, ApiError> {
        let client = Arc::new(BackendClient::new(&config, Arc::clone(&tokens))?);
        Ok(Self::with_backends(config, client.clone(), client, tokens))
    }

    pub fn with_backends(
        config: ClientConfig,
        projects: Arc<dyn ProjectBackend>,
        files: Arc<dyn FileBackend>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        let routes = ApiRoutes::from_config(&config);
        Self {
            config: Arc::new(config),
            projects,
            files,
            tokens,
            routes,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn routes(&self) -> &ApiRoutes {
        &self.routes
    }

    fn stream_client(&self, label: impl Into<String>) -> EventStreamClient {
        EventStreamClient::new(
            label,
            self.config.stream.clone(),
            self.config.api_key.clone(),
            Arc::clone(&self.tokens),
        )
    }

    fn poller(&self, target: Arc<dyn Refreshable>) -> Option<PollingFallback> {
        self.config
            .poll
            .enabled
            .then(|| PollingFallback::spawn(target, self.config.poll.interval()))
    }
}

/// Decode one stream payload and apply it. `scope` restricts events to one
/// project when the payload names a project.
fn apply_message(target: &dyn ApplyEvent, data: &Value, scope: Option<&str>) -> bool {
    let decoded = match DecodedEvent::from_json(data) {
        Ok(Some(decoded)) => decoded,
        Ok(None) => {
            debug!("ignoring stream message without a known event");
            return false;
        }
        Err(error) => {
            warn!(error = %error, "dropping undecodable stream event");
            return false;
        }
    };

    if let (Some(scope), Some(project_id)) = (scope, decoded.project_id.as_deref()) {
        if scope != project_id {
            debug!(scope, project_id, "ignoring event for another project");
            return false;
        }
    }

    let changed = target.apply_event(&decoded.event);
    debug!(
        kind = %decoded.event.kind(),
        id = decoded.event.entity_id(),
        correlation_id = decoded.correlation_id.as_deref().unwrap_or(""),
        changed,
        "stream event applied"
    );
    changed
}

/// The project list, kept live.
pub struct LiveProjects {
    store: Arc<ProjectStore>,
    stream: EventStreamClient,
    poller: Option<PollingFallback>,
}

impl LiveProjects {
    /// Connect the stream, start polling and run the initial fetch. A failed
    /// initial fetch is logged and left on the store's `last_error`.
    pub async fn start(ctx: &SyncContext) -> Self {
        let store = Arc::new(ProjectStore::new(
            Arc::clone(&ctx.projects),
            ctx.config.fetch_ordering,
        ));

        let stream = ctx.stream_client("projects");
        let target = Arc::clone(&store);
        stream.add_listener(move |message| {
            apply_message(target.as_ref(), &message.data, None);
        });
        stream.connect(
            Some(ctx.routes.project_events().as_str()),
            ctx.config.stream.enabled,
        );

        let poller = ctx.poller(store.clone());

        if let Err(error) = store.fetch_all().await {
            warn!(error = %error, "initial project fetch failed");
        }
        info!(projects = store.len(), "live projects started");

        Self {
            store,
            stream,
            poller,
        }
    }

    pub fn store(&self) -> &Arc<ProjectStore> {
        &self.store
    }

    pub fn stream(&self) -> &EventStreamClient {
        &self.stream
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.stream.state()
    }

    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.stream.watch_state()
    }

    pub fn is_polling(&self) -> bool {
        self.poller.as_ref().is_some_and(PollingFallback::is_running)
    }

    pub fn shutdown(&self) {
        self.stream.disconnect();
        if let Some(poller) = &self.poller {
            poller.stop();
        }
    }
}

/// One project's files, kept live.
pub struct LiveFiles {
    project_id: String,
    store: Arc<FileStore>,
    stream: EventStreamClient,
    poller: Option<PollingFallback>,
}

impl LiveFiles {
    pub async fn start(ctx: &SyncContext, project_id: &str) -> Self {
        let store = Arc::new(FileStore::new(
            project_id,
            Arc::clone(&ctx.files),
            ctx.config.fetch_ordering,
        ));

        let stream = ctx.stream_client(format!("files:{project_id}"));
        let target = Arc::clone(&store);
        let scope = project_id.to_string();
        stream.add_listener(move |message| {
            apply_message(target.as_ref(), &message.data, Some(&scope));
        });
        stream.connect(
            Some(ctx.routes.file_events(project_id).as_str()),
            ctx.config.stream.enabled,
        );

        let poller = ctx.poller(store.clone());

        if let Err(error) = store.fetch_all().await {
            warn!(project_id, error = %error, "initial file fetch failed");
        }
        info!(project_id, files = store.len(), "live files started");

        Self {
            project_id: project_id.to_string(),
            store,
            stream,
            poller,
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn store(&self) -> &Arc<FileStore> {
        &self.store
    }

    pub fn stream(&self) -> &EventStreamClient {
        &self.stream
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.stream.state()
    }

    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.stream.watch_state()
    }

    pub fn is_polling(&self) -> bool {
        self.poller.as_ref().is_some_and(PollingFallback::is_running)
    }

    pub fn shutdown(&self) {
        self.stream.disconnect();
        if let Some(poller) = &self.poller {
            poller.stop();
        }
    }
}

/// Owns the shared context, the project channel and at most one file
/// channel per project.
pub struct SyncHub {
    ctx: SyncContext,
    projects: Mutex<Option<Arc<LiveProjects>>>,
    files: DashMap<String, Arc<LiveFiles>>,
}

impl SyncHub {
    pub fn new(ctx: SyncContext) -> Self {
        Self {
            ctx,
            projects: Mutex::new(None),
            files: DashMap::new(),
        }
    }

    pub fn context(&self) -> &SyncContext {
        &self.ctx
    }

    pub async fn start_projects(&self) -> Arc<LiveProjects> {
        let mut slot = self.projects.lock().await;
        if let Some(live) = slot.as_ref() {
            return Arc::clone(live);
        }
        let live = Arc::new(LiveProjects::start(&self.ctx).await);
        *slot = Some(Arc::clone(&live));
        live
    }

    pub async fn projects(&self) -> Option<Arc<LiveProjects>> {
        self.projects.lock().await.clone()
    }

    /// The live file channel for `project_id`, started on first use.
    pub async fn files_for(&self, project_id: &str) -> Arc<LiveFiles> {
        if let Some(live) = self.files.get(project_id) {
            return Arc::clone(live.value());
        }

        let started = Arc::new(LiveFiles::start(&self.ctx, project_id).await);
        let entry = self
            .files
            .entry(project_id.to_string())
            .or_insert_with(|| Arc::clone(&started));
        let live = Arc::clone(entry.value());
        drop(entry);

        if !Arc::ptr_eq(&live, &started) {
            debug!(project_id, "file channel started concurrently; keeping the first");
            started.shutdown();
        }
        live
    }

    pub fn release_files(&self, project_id: &str) -> bool {
        match self.files.remove(project_id) {
            Some((_, live)) => {
                live.shutdown();
                info!(project_id, "file channel released");
                true
            }
            None => false,
        }
    }

    /// Project ids with an open file channel, sorted.
    pub fn active_file_channels(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.files.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    pub async fn shutdown(&self) {
        if let Some(live) = self.projects.lock().await.take() {
            live.shutdown();
        }
        let ids = self.active_file_channels();
        for id in ids {
            self.release_files(&id);
        }
        info!("sync hub shut down");
    }
}
