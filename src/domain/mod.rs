pub mod normalize;
pub mod types;

pub use normalize::{
    file_change_from_value, file_from_value, normalize_file_status, normalize_project_status,
    project_from_value,
};
pub use types::{
    format_duration, format_file_size, AudioFile, FileChange, FileStatus, Project, ProjectStatus,
};

/// Anything kept in an id-keyed, display-ordered collection.
pub trait Entity {
    fn id(&self) -> &str;

    /// Whether the backend is still working on this entity.
    fn is_processing(&self) -> bool;
}
