//! Access-token seam between the sync client and the identity provider.

use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{info, warn};

/// Supplies bearer tokens. Called once per connection attempt and per REST
/// request, so implementations may rotate tokens between calls.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Option<String>;

    /// The backend rejected a request as unauthenticated.
    fn on_unauthorized(&self) {}
}

/// Fixed token, mostly for tools and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Settable token plus a session-expired signal.
///
/// Once expired, no token is handed out until a new one is set.
#[derive(Debug)]
pub struct AuthSession {
    token: RwLock<Option<String>>,
    expired: watch::Sender<bool>,
}

impl AuthSession {
    pub fn new(token: Option<String>) -> Self {
        let (expired, _) = watch::channel(false);
        Self {
            token: RwLock::new(token.filter(|t| !t.trim().is_empty())),
            expired,
        }
    }

    pub fn set_token(&self, token: impl Into<String>) {
        let token = token.into();
        *self.token.write().unwrap_or_else(PoisonError::into_inner) =
            Some(token).filter(|t| !t.trim().is_empty());
        self.expired.send_replace(false);
        info!("auth session token updated");
    }

    pub fn mark_expired(&self) {
        if !self.expired.send_replace(true) {
            warn!("auth session expired; sign in again");
        }
    }

    pub fn is_expired(&self) -> bool {
        *self.expired.borrow()
    }

    pub fn watch_expired(&self) -> watch::Receiver<bool> {
        self.expired.subscribe()
    }
}

#[async_trait]
impl TokenProvider for AuthSession {
    async fn access_token(&self) -> Option<String> {
        if self.is_expired() {
            return None;
        }
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn on_unauthorized(&self) {
        self.mark_expired();
    }
}
