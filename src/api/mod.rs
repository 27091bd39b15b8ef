pub mod client;
pub mod error;
pub mod routes;
pub mod types;

#[cfg(test)]
mod tests;

pub use client::{BackendClient, FileBackend, ProjectBackend};
pub use error::{backend_message, describe_service_error, ApiError, ServiceErrorView};
pub use routes::ApiRoutes;
pub use types::{Dataset, ExportFormat, FilePatch, ProjectDraft, ProjectPatch};
