//! In-memory project and file state, kept in sync by events, fetches and polling.

pub mod collection;
pub mod files;
pub mod projects;
mod state;


pub use collection::EntityCollection;
pub use files::FileStore;
pub use projects::ProjectStore;
pub use state::FetchOutcome;

use crate::events::DomainEvent;

/// Something a decoded stream event can be applied to.
pub trait ApplyEvent: Send + Sync {
    /// Returns whether the state changed. Events of another domain are ignored.
    fn apply_event(&self, event: &DomainEvent) -> bool;
}
