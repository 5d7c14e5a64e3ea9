//! # buildsearch-rebuild
//!
//! Bulk rebuild of the build search index.
//!
//! ## Features
//! - [`Orchestrator`]: cleans, enumerates and fans builds out to a worker pool
//! - [`ProgressState`]: live, monotonic progress shared with status readers
//! - [`RebuildRequest`]: worker count, project selection and overwrite mode
//! - [`BuildHost`]: read-only access to the host's projects and builds
//!
//! ## Usage
//!
//! ```rust,ignore
//! use buildsearch_rebuild::{Orchestrator, RebuildConfig, RebuildRequest};
//!
//! let orchestrator = Orchestrator::new(host, backend, RebuildConfig::default());
//! let progress = orchestrator.rebuild(RebuildRequest::all(4)).await?;
//! ```

pub mod error;
pub mod host;
pub mod orchestrator;
pub mod progress;
pub mod request;

pub use error::{HostError, RebuildError, ValidationError};
pub use host::{BuildHost, ProjectInfo, StaticHost};
pub use orchestrator::{Orchestrator, RebuildConfig, DEFAULT_COMMIT_INTERVAL};
pub use progress::{Phase, ProgressSnapshot, ProgressState};
pub use request::{RebuildRequest, OVERWRITE_MODE};
