//! Error types for rebuild runs.

use thiserror::Error;

/// Reasons a rebuild request is rejected before any work starts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid number of workers: {0}")]
    InvalidWorkers(usize),

    #[error("Unknown project(s): {}", .0.join(", "))]
    UnknownProjects(Vec<String>),
}

/// Failure to enumerate the builds of a project.
#[derive(Error, Debug)]
pub enum HostError {
    #[error("I/O error reading project {project}: {source}")]
    Io {
        project: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed build record in project {project}: {reason}")]
    Malformed { project: String, reason: String },
}

/// Errors returned by the orchestrator's public operations.
#[derive(Error, Debug)]
pub enum RebuildError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Project inventory failed: {0}")]
    Inventory(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ValidationError::InvalidWorkers(0);
        assert_eq!(err.to_string(), "Invalid number of workers: 0");

        let err = ValidationError::UnknownProjects(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "Unknown project(s): a, b");

        let err = HostError::Malformed {
            project: "app".into(),
            reason: "bad number".into(),
        };
        assert_eq!(
            err.to_string(),
            "Malformed build record in project app: bad number"
        );
    }

    #[test]
    fn test_validation_converts_transparently() {
        let err: RebuildError = ValidationError::InvalidWorkers(0).into();
        assert_eq!(err.to_string(), "Invalid number of workers: 0");
    }
}
