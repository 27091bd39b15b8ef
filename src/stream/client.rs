use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::TokenProvider;
use crate::config::{StreamSettings, TokenPlacement};

use super::backoff::ReconnectBackoff;
use super::decoder::{data_payload, LineDecoder};
use super::error::StreamError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No connection wanted.
    Idle,
    /// A request is being made.
    Connecting,
    /// The server answered 2xx and the body is being read.
    Connected,
    /// The last attempt ended; a retry is scheduled.
    Disconnected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Idle => write!(f, "idle"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// One decoded `data: ` line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMessage {
    pub event: String,
    pub data: Value,
}

impl StreamMessage {
    fn new(data: Value) -> Self {
        Self {
            event: "message".to_string(),
            data,
        }
    }
}

pub type MessageListener = Arc<dyn Fn(&StreamMessage) + Send + Sync>;
pub type ErrorObserver = Arc<dyn Fn(&StreamError) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the client handle and its connection worker.
///
/// Every mutation made on behalf of a worker is checked against the current
/// generation, so a worker that has been torn down can no longer touch it.
struct Shared {
    generation: Mutex<u64>,
    state_tx: watch::Sender<ConnectionState>,
    last_message: Mutex<Option<StreamMessage>>,
    listeners: Mutex<Vec<(ListenerId, MessageListener)>>,
    error_observer: Mutex<Option<ErrorObserver>>,
    next_listener: AtomicU64,
}

impl Shared {
    fn new() -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        Self {
            generation: Mutex::new(0),
            state_tx,
            last_message: Mutex::new(None),
            listeners: Mutex::new(Vec::new()),
            error_observer: Mutex::new(None),
            next_listener: AtomicU64::new(1),
        }
    }

    /// Start a new generation in `Connecting`; returns its number.
    fn begin_generation(&self) -> u64 {
        let mut generation = lock(&self.generation);
        *generation += 1;
        self.state_tx.send_replace(ConnectionState::Connecting);
        *generation
    }

    /// Retire the current generation and go idle.
    fn invalidate(&self) {
        let mut generation = lock(&self.generation);
        *generation += 1;
        self.state_tx.send_replace(ConnectionState::Idle);
    }

    fn is_current(&self, generation: u64) -> bool {
        *lock(&self.generation) == generation
    }

    fn set_state(&self, generation: u64, state: ConnectionState) -> bool {
        let current = lock(&self.generation);
        if *current != generation {
            return false;
        }
        self.state_tx.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
        true
    }

    /// Listeners run outside the locks. Each one is skipped once `generation`
    /// is no longer current, so a listener that disconnects stops delivery
    /// of the message to the listeners after it.
    fn publish(&self, generation: u64, message: StreamMessage) {
        let listeners: Vec<MessageListener> = {
            let current = lock(&self.generation);
            if *current != generation {
                return;
            }
            *lock(&self.last_message) = Some(message.clone());
            lock(&self.listeners)
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect()
        };
        for listener in listeners {
            if !self.is_current(generation) {
                return;
            }
            listener(&message);
        }
    }

    fn report(&self, generation: u64, error: &StreamError) {
        if !self.is_current(generation) {
            return;
        }
        let observer = lock(&self.error_observer).clone();
        if let Some(observer) = observer {
            observer(error);
        }
    }
}

struct ActiveConnection {
    id: Uuid,
    url: String,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Reconnecting client for one line-delimited event stream.
///
/// Must be used from within a tokio runtime: `connect` spawns the
/// connection worker.
pub struct EventStreamClient {
    label: String,
    http: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
    settings: StreamSettings,
    api_key: Option<String>,
    shared: Arc<Shared>,
    active: Mutex<Option<ActiveConnection>>,
}

impl EventStreamClient {
    pub fn new(
        label: impl Into<String>,
        settings: StreamSettings,
        api_key: Option<String>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self::with_http_client(label, reqwest::Client::new(), settings, api_key, tokens)
    }

    pub fn with_http_client(
        label: impl Into<String>,
        http: reqwest::Client,
        settings: StreamSettings,
        api_key: Option<String>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            label: label.into(),
            http,
            tokens,
            settings,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            shared: Arc::new(Shared::new()),
            active: Mutex::new(None),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Bring the connection in line with `url` and `enabled`.
    ///
    /// Disabled or without a URL, any existing connection is torn down. An
    /// existing live connection to the same URL is left alone; a different URL
    /// replaces it.
    pub fn connect(&self, url: Option<&str>, enabled: bool) {
        let url = match url.map(str::trim).filter(|url| !url.is_empty()) {
            Some(url) if enabled && self.settings.enabled => url,
            _ => {
                self.disconnect();
                return;
            }
        };

        let mut active = lock(&self.active);
        if let Some(existing) = active.as_ref() {
            if existing.url == url && !existing.task.is_finished() {
                debug!(stream = %self.label, connection_id = %existing.id, "already connected");
                return;
            }
        }
        if let Some(previous) = active.take() {
            info!(
                stream = %self.label,
                connection_id = %previous.id,
                url = %previous.url,
                "replacing event stream connection"
            );
            previous.cancel.cancel();
        }

        let generation = self.shared.begin_generation();
        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let worker = ConnectionWorker {
            id,
            label: self.label.clone(),
            url: url.to_string(),
            generation,
            cancel: cancel.clone(),
            http: self.http.clone(),
            tokens: Arc::clone(&self.tokens),
            settings: self.settings.clone(),
            api_key: self.api_key.clone(),
            shared: Arc::clone(&self.shared),
        };
        info!(stream = %self.label, connection_id = %id, url, "starting event stream");
        let task = tokio::spawn(worker.run());
        *active = Some(ActiveConnection {
            id,
            url: url.to_string(),
            cancel,
            task,
        });
    }

    /// Cancel the in-flight request and any pending reconnect. Idempotent.
    pub fn disconnect(&self) {
        let previous = lock(&self.active).take();
        if let Some(connection) = previous {
            info!(
                stream = %self.label,
                connection_id = %connection.id,
                "disconnecting event stream"
            );
            connection.cancel.cancel();
        }
        self.shared.invalidate();
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state_tx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    pub fn last_message(&self) -> Option<StreamMessage> {
        lock(&self.shared.last_message).clone()
    }

    /// URL of the connection currently wanted, if any.
    pub fn current_url(&self) -> Option<String> {
        lock(&self.active).as_ref().map(|active| active.url.clone())
    }

    /// Register a listener called synchronously, in wire order, for each message.
    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&StreamMessage) + Send + Sync + 'static,
    {
        let id = ListenerId(self.shared.next_listener.fetch_add(1, Ordering::Relaxed));
        lock(&self.shared.listeners).push((id, Arc::new(listener)));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = lock(&self.shared.listeners);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn set_error_observer<F>(&self, observer: F)
    where
        F: Fn(&StreamError) + Send + Sync + 'static,
    {
        *lock(&self.shared.error_observer) = Some(Arc::new(observer));
    }
}

impl Drop for EventStreamClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

struct ConnectionWorker {
    id: Uuid,
    label: String,
    url: String,
    generation: u64,
    cancel: CancellationToken,
    http: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
    settings: StreamSettings,
    api_key: Option<String>,
    shared: Arc<Shared>,
}

impl ConnectionWorker {
    async fn run(self) {
        let mut backoff =
            ReconnectBackoff::new(self.settings.reconnect_base(), self.settings.max_backoff());
        let mut attempt: u64 = 0;

        loop {
            attempt += 1;
            if !self.shared.set_state(self.generation, ConnectionState::Connecting) {
                break;
            }

            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                outcome = self.stream_once(attempt, &mut backoff) => outcome,
            };

            if self.cancel.is_cancelled() {
                break;
            }
            self.shared.report(self.generation, &outcome);
            if !self
                .shared
                .set_state(self.generation, ConnectionState::Disconnected)
            {
                break;
            }

            let delay = backoff.record_failure();
            warn!(
                stream = %self.label,
                connection_id = %self.id,
                url = %self.url,
                attempt,
                failures = backoff.failures(),
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %outcome,
                "event stream interrupted; reconnecting"
            );

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        debug!(stream = %self.label, connection_id = %self.id, "event stream worker stopped");
    }

    /// One connection attempt. Returns the reason it ended.
    async fn stream_once(&self, attempt: u64, backoff: &mut ReconnectBackoff) -> StreamError {
        let Some(token) = self
            .tokens
            .access_token()
            .await
            .filter(|token| !token.trim().is_empty())
        else {
            return StreamError::MissingToken;
        };

        let mut request = self
            .http
            .get(&self.url)
            .header(ACCEPT, "text/event-stream");
        request = match self.settings.token_placement {
            TokenPlacement::Query => request.query(&[("token", token.as_str())]),
            TokenPlacement::Header => request.bearer_auth(&token),
        };
        if let Some(key) = &self.api_key {
            request = request.header("X-API-Key", key);
        }

        debug!(stream = %self.label, connection_id = %self.id, url = %self.url, attempt, "connecting");
        let response = match request.send().await {
            Ok(response) => response,
            Err(error) => return StreamError::from(error),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return StreamError::Http {
                status: status.as_u16(),
                message: crate::api::backend_message(status.as_u16(), &body),
            };
        }

        backoff.reset();
        if !self
            .shared
            .set_state(self.generation, ConnectionState::Connected)
        {
            return StreamError::Closed;
        }
        info!(
            stream = %self.label,
            connection_id = %self.id,
            url = %self.url,
            attempt,
            "event stream connected"
        );

        let mut body = response.bytes_stream();
        let mut decoder = LineDecoder::new();
        while let Some(chunk) = body.next().await {
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(error) => return StreamError::Body(error.to_string()),
            };
            for line in decoder.push(&bytes) {
                if self.cancel.is_cancelled() {
                    return StreamError::Closed;
                }
                self.handle_line(&line);
            }
        }

        if decoder.pending_len() > 0 {
            debug!(
                stream = %self.label,
                connection_id = %self.id,
                discarded_bytes = decoder.pending_len(),
                "dropping unterminated trailing line"
            );
        }
        info!(stream = %self.label, connection_id = %self.id, "event stream ended by server");
        StreamError::Closed
    }

    fn handle_line(&self, line: &str) {
        let Some(payload) = data_payload(line) else {
            return;
        };
        debug!(stream = %self.label, connection_id = %self.id, payload, "event data");
        match serde_json::from_str::<Value>(payload) {
            Ok(data) => self.shared.publish(self.generation, StreamMessage::new(data)),
            Err(error) => {
                warn!(
                    stream = %self.label,
                    connection_id = %self.id,
                    error = %error,
                    "dropping malformed event data"
                );
                self.shared
                    .report(self.generation, &StreamError::Parse(error.to_string()));
            }
        }
    }
}
