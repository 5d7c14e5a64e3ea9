//! Source of projects and builds to index.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use buildsearch_types::BuildRecord;

use crate::error::HostError;

/// A project known to the host.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProjectInfo {
    /// Short name, used to select projects in a rebuild request.
    pub name: String,
    /// Folder-qualified name, stored in the `j` field.
    pub full_name: String,
}

impl ProjectInfo {
    pub fn new(name: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            full_name: full_name.into(),
        }
    }

    /// Top-level project whose full name equals its short name.
    pub fn top_level(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            full_name: name.clone(),
            name,
        }
    }
}

/// Read-only access to the host's project and build model.
pub trait BuildHost: Send + Sync {
    /// Every project in the inventory.
    fn projects(&self) -> Vec<ProjectInfo>;

    /// Every build of `project`.
    fn builds(&self, project: &ProjectInfo) -> Result<Vec<Arc<dyn BuildRecord>>, HostError>;
}

/// Fixed in-memory inventory.
#[derive(Default)]
pub struct StaticHost {
    projects: BTreeMap<ProjectInfo, Vec<Arc<dyn BuildRecord>>>,
    broken: BTreeMap<ProjectInfo, String>,
}

impl StaticHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a project with its builds.
    pub fn with_project(
        mut self,
        project: ProjectInfo,
        builds: impl IntoIterator<Item = Arc<dyn BuildRecord>>,
    ) -> Self {
        self.projects
            .entry(project)
            .or_default()
            .extend(builds);
        self
    }

    /// Add a project whose enumeration fails with `reason`.
    pub fn with_broken_project(mut self, project: ProjectInfo, reason: impl Into<String>) -> Self {
        self.broken.insert(project, reason.into());
        self
    }
}

impl BuildHost for StaticHost {
    fn projects(&self) -> Vec<ProjectInfo> {
        let mut projects: Vec<ProjectInfo> = self
            .projects
            .keys()
            .chain(self.broken.keys())
            .cloned()
            .collect();
        projects.sort();
        projects
    }

    fn builds(&self, project: &ProjectInfo) -> Result<Vec<Arc<dyn BuildRecord>>, HostError> {
        if let Some(reason) = self.broken.get(project) {
            return Err(HostError::Malformed {
                project: project.full_name.clone(),
                reason: reason.clone(),
            });
        }
        Ok(self.projects.get(project).cloned().unwrap_or_default())
    }
}
