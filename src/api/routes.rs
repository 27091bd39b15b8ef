//! Backend endpoint paths.

use std::borrow::Cow;

use crate::config::ClientConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRoutes {
    root: String,
}

fn segment(id: &str) -> Cow<'_, str> {
    urlencoding::encode(id)
}

impl ApiRoutes {
    /// `root` is the versioned API root, e.g. `http://host:8080/v1`.
    pub fn new(root: impl Into<String>) -> Self {
        let root = root.into();
        Self {
            root: root.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.api_root())
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn projects(&self) -> String {
        format!("{}/project", self.root)
    }

    pub fn project(&self, project_id: &str) -> String {
        format!("{}/project/{}", self.root, segment(project_id))
    }

    pub fn project_process(&self, project_id: &str) -> String {
        format!("{}/process", self.project(project_id))
    }

    pub fn project_download(&self, project_id: &str) -> String {
        format!("{}/download", self.project(project_id))
    }

    pub fn project_files(&self, project_id: &str) -> String {
        format!("{}/files", self.project(project_id))
    }

    pub fn project_file(&self, project_id: &str, file_id: &str) -> String {
        format!("{}/{}", self.project_files(project_id), segment(file_id))
    }

    pub fn project_events(&self) -> String {
        format!("{}/project/events", self.root)
    }

    pub fn file_events(&self, project_id: &str) -> String {
        format!("{}/events", self.project_files(project_id))
    }
}
