//! Rebuild requests and their validation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::host::ProjectInfo;

/// Mode string that selects an overwrite rebuild in the form interface.
pub const OVERWRITE_MODE: &str = "overwrite";

/// Parameters of one rebuild run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildRequest {
    /// Number of concurrent workers
    pub workers: usize,
    /// Short names of the projects to rebuild; empty means all
    pub projects: BTreeSet<String>,
    /// Clean the index before indexing
    pub overwrite: bool,
}

impl RebuildRequest {
    /// Rebuild every project.
    pub fn all(workers: usize) -> Self {
        Self {
            workers,
            projects: BTreeSet::new(),
            overwrite: false,
        }
    }

    pub fn with_projects<I, S>(mut self, projects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projects.extend(projects.into_iter().map(Into::into));
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Build a request from form values: whitespace separated project names
    /// and a mode string where only `"overwrite"` selects overwrite.
    pub fn from_form(workers: usize, project_names: &str, mode: &str) -> Self {
        Self {
            workers,
            projects: project_names.split_whitespace().map(String::from).collect(),
            overwrite: mode == OVERWRITE_MODE,
        }
    }

    /// Check the request against the host's inventory.
    pub fn validate(&self, inventory: &[ProjectInfo]) -> Result<(), ValidationError> {
        if self.workers == 0 {
            return Err(ValidationError::InvalidWorkers(self.workers));
        }

        let unknown: Vec<String> = self
            .projects
            .iter()
            .filter(|name| !inventory.iter().any(|p| &p.name == *name))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(ValidationError::UnknownProjects(unknown));
        }

        Ok(())
    }

    /// Projects of `inventory` this request selects.
    pub fn select(&self, inventory: Vec<ProjectInfo>) -> Vec<ProjectInfo> {
        if self.projects.is_empty() {
            inventory
        } else {
            inventory
                .into_iter()
                .filter(|p| self.projects.contains(&p.name))
                .collect()
        }
    }
}
