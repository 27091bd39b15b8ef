//! Periodic silent refresh while anything is still processing.
//!
//! Push updates can be missed while the stream reconnects, so a store whose
//! processing count is above zero is refetched on a fixed interval. The
//! poller parks as soon as the count drops back to zero.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::ApiError;

/// A store the poller can refresh.
#[async_trait]
pub trait Refreshable: Send + Sync {
    fn label(&self) -> String;

    /// Number of entities currently processing.
    fn watch_processing(&self) -> watch::Receiver<usize>;

    /// Refetch without raising the loading flag.
    async fn refresh_silently(&self) -> Result<(), ApiError>;
}

/// Handle to a running poll loop. Dropping it stops the loop.
pub struct PollingFallback {
    label: String,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PollingFallback {
    pub fn spawn(target: Arc<dyn Refreshable>, interval: Duration) -> Self {
        let label = target.label();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(target, interval, cancel.clone()));
        debug!(store = %label, interval_ms = interval.as_millis() as u64, "poller started");
        Self {
            label,
            cancel,
            task,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            debug!(store = %self.label, "poller stopped");
        }
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for PollingFallback {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(target: Arc<dyn Refreshable>, interval: Duration, cancel: CancellationToken) {
    let label = target.label();
    let mut processing = target.watch_processing();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            open = wait_until(&mut processing, |count| *count > 0) => {
                if !open {
                    return;
                }
            }
        }
        debug!(store = %label, "entities processing; polling");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                open = wait_until(&mut processing, |count| *count == 0) => {
                    if !open {
                        return;
                    }
                    debug!(store = %label, "nothing processing; poller idle");
                    break;
                }
                _ = tokio::time::sleep(interval) => {}
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                result = target.refresh_silently() => {
                    if let Err(error) = result {
                        warn!(store = %label, error = %error, "poll refresh failed");
                    }
                }
            }
        }
    }
}

/// False once the sender is gone.
async fn wait_until(
    rx: &mut watch::Receiver<usize>,
    predicate: impl FnMut(&usize) -> bool,
) -> bool {
    rx.wait_for(predicate).await.is_ok()
}
