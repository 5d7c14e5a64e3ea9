//! Build host backed by a directory tree.
//!
//! Layout:
//!
//! ```text
//! <root>/<folder>/.../<project>/builds/<number>/build.json
//! <root>/<folder>/.../<project>/builds/<number>/log
//! ```
//!
//! Any directory holding a `builds` subdirectory is a project. Its full name
//! is the `/`-joined path below the root, its short name the last component.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use buildsearch_rebuild::{BuildHost, HostError, ProjectInfo};
use buildsearch_types::{BuildParameter, BuildRecord, StoredBuild};

const BUILDS_DIR: &str = "builds";
const BUILD_FILE: &str = "build.json";
const LOG_FILE: &str = "log";

/// Contents of `build.json`.
#[derive(Debug, Default, Deserialize)]
struct BuildFile {
    display_name: Option<String>,
    parameters: Option<Vec<BuildParameter>>,
}

/// Reads projects and builds from `root`.
#[derive(Debug, Clone)]
pub struct FsHost {
    root: PathBuf,
}

impl FsHost {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn project_dir(&self, project: &ProjectInfo) -> PathBuf {
        project
            .full_name
            .split('/')
            .fold(self.root.clone(), |dir, part| dir.join(part))
    }

    fn load_build(&self, project: &ProjectInfo, number: u64, dir: &Path) -> StoredBuild {
        let mut build =
            StoredBuild::new(project.full_name.clone(), number).with_log_file(dir.join(LOG_FILE));

        let meta = match fs::read_to_string(dir.join(BUILD_FILE)) {
            Ok(text) => match serde_json::from_str::<BuildFile>(&text) {
                Ok(meta) => meta,
                Err(e) => {
                    warn!(path = ?dir, error = %e, "Malformed build.json, using defaults");
                    BuildFile::default()
                }
            },
            Err(e) => {
                debug!(path = ?dir, error = %e, "No build.json");
                BuildFile::default()
            }
        };

        if let Some(name) = meta.display_name {
            build = build.with_display_name(name);
        }
        if let Some(parameters) = meta.parameters {
            build = build.with_parameters(parameters);
        }
        build
    }
}

impl BuildHost for FsHost {
    fn projects(&self) -> Vec<ProjectInfo> {
        let mut projects = Vec::new();
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.file_type().is_dir() && e.file_name() != BUILDS_DIR);

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable directory");
                    continue;
                }
            };
            if !entry.path().join(BUILDS_DIR).is_dir() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let parts: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            let Some(name) = parts.last().cloned() else {
                continue;
            };
            projects.push(ProjectInfo::new(name, parts.join("/")));
        }

        projects.sort();
        projects
    }

    fn builds(&self, project: &ProjectInfo) -> Result<Vec<Arc<dyn BuildRecord>>, HostError> {
        let builds_dir = self.project_dir(project).join(BUILDS_DIR);
        let io_error = |source: std::io::Error| HostError::Io {
            project: project.full_name.clone(),
            source,
        };

        let mut numbered = Vec::new();
        for entry in fs::read_dir(&builds_dir).map_err(io_error)? {
            let entry = entry.map_err(io_error)?;
            if !entry.file_type().map_err(io_error)?.is_dir() {
                continue;
            }
            let file_name = entry.file_name();
            match file_name.to_string_lossy().parse::<u64>() {
                Ok(number) => numbered.push((number, entry.path())),
                Err(_) => debug!(path = ?entry.path(), "Ignoring non-numeric build directory"),
            }
        }
        numbered.sort_by_key(|(number, _)| *number);

        Ok(numbered
            .into_iter()
            .map(|(number, dir)| {
                Arc::new(self.load_build(project, number, &dir)) as Arc<dyn BuildRecord>
            })
            .collect())
    }
}
