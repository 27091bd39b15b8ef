//! Bookkeeping shared by the project and file stores.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::debug;

use crate::api::ApiError;
use crate::config::FetchOrdering;
use crate::domain::Entity;

use super::collection::EntityCollection;

/// What happened to a completed bulk fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The response replaced the collection, which now holds `count` entities.
    Applied { count: usize },
    /// A newer response was already applied; this one was dropped.
    Discarded,
}

struct StoreState<T> {
    items: EntityCollection<T>,
    loading: usize,
    last_error: Option<ApiError>,
    issued: u64,
    applied: u64,
}

pub(crate) struct StoreCore<T> {
    name: &'static str,
    ordering: FetchOrdering,
    state: Mutex<StoreState<T>>,
    processing_tx: watch::Sender<usize>,
}

impl<T: Entity + Clone> StoreCore<T> {
    pub(crate) fn new(name: &'static str, ordering: FetchOrdering) -> Self {
        let (processing_tx, _) = watch::channel(0);
        Self {
            name,
            ordering,
            state: Mutex::new(StoreState {
                items: EntityCollection::new(),
                loading: 0,
                last_error: None,
                issued: 0,
                applied: 0,
            }),
            processing_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tag a new fetch with the next sequence number.
    pub(crate) fn begin_fetch(&self, silent: bool) -> u64 {
        let mut state = self.lock();
        state.issued += 1;
        if !silent {
            state.loading += 1;
            state.last_error = None;
        }
        state.issued
    }

    pub(crate) fn finish_fetch(
        &self,
        seq: u64,
        silent: bool,
        result: Result<Vec<T>, ApiError>,
    ) -> Result<FetchOutcome, ApiError> {
        let mut state = self.lock();
        if !silent {
            state.loading = state.loading.saturating_sub(1);
        }

        let stale = self.ordering == FetchOrdering::LatestIssued && seq < state.applied;
        if stale {
            debug!(store = self.name, seq, applied = state.applied, "discarding stale fetch result");
            return result.map(|_| FetchOutcome::Discarded);
        }

        match result {
            Ok(items) => {
                state.items.replace_all(items);
                state.applied = state.applied.max(seq);
                state.last_error = None;
                let count = state.items.len();
                self.publish_processing(&state.items);
                debug!(store = self.name, seq, count, "fetch applied");
                Ok(FetchOutcome::Applied { count })
            }
            Err(error) => {
                state.last_error = Some(error.clone());
                Err(error)
            }
        }
    }

    /// Run `f` against the collection under the lock, then refresh the
    /// processing count.
    pub(crate) fn mutate<R>(&self, f: impl FnOnce(&mut EntityCollection<T>) -> R) -> R {
        let mut state = self.lock();
        let result = f(&mut state.items);
        self.publish_processing(&state.items);
        result
    }

    pub(crate) fn record_error(&self, error: &ApiError) {
        self.lock().last_error = Some(error.clone());
    }

    pub(crate) fn clear_error(&self) {
        self.lock().last_error = None;
    }

    pub(crate) fn last_error(&self) -> Option<ApiError> {
        self.lock().last_error.clone()
    }

    pub(crate) fn is_loading(&self) -> bool {
        self.lock().loading > 0
    }

    pub(crate) fn snapshot(&self) -> Vec<T> {
        self.lock().items.snapshot()
    }

    pub(crate) fn get(&self, id: &str) -> Option<T> {
        self.lock().items.get(id).cloned()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub(crate) fn processing_count(&self) -> usize {
        *self.processing_tx.borrow()
    }

    pub(crate) fn watch_processing(&self) -> watch::Receiver<usize> {
        self.processing_tx.subscribe()
    }

    fn publish_processing(&self, items: &EntityCollection<T>) {
        let count = items.processing_count();
        self.processing_tx.send_if_modified(|current| {
            let changed = *current != count;
            *current = count;
            changed
        });
    }
}
