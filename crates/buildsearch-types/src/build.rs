//! Build record model.
//!
//! Builds are owned by the host; the indexer only reads them through
//! [`BuildRecord`]. [`StoredBuild`] is a plain implementation used by the
//! bundled hosts and by tests.

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A named build parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildParameter {
    pub name: String,
    pub value: String,
}

impl BuildParameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Read-only view of one executed build.
pub trait BuildRecord: Send + Sync {
    /// Folder-qualified name of the project the build belongs to.
    fn project_full_name(&self) -> &str;

    /// Build number, unique within the project.
    fn number(&self) -> u64;

    /// Human readable build name.
    fn display_name(&self) -> &str;

    /// Build parameters, or `None` if the build was not parameterized.
    fn parameters(&self) -> Option<&[BuildParameter]>;

    /// Stream the console log into `sink`, returning the number of bytes written.
    fn write_log_to(&self, sink: &mut dyn Write) -> io::Result<u64>;
}

/// Where a [`StoredBuild`] reads its console log from.
#[derive(Debug, Clone)]
pub enum ConsoleLog {
    /// Log held in memory.
    Text(String),
    /// Log file streamed on demand.
    File(PathBuf),
    /// No log is available; reading it fails.
    Missing,
}

/// Simple owned build record.
#[derive(Debug, Clone)]
pub struct StoredBuild {
    pub project: String,
    pub number: u64,
    pub display_name: String,
    pub parameters: Option<Vec<BuildParameter>>,
    pub log: ConsoleLog,
}

impl StoredBuild {
    /// Create a build with the default `#<number>` display name and no log.
    pub fn new(project: impl Into<String>, number: u64) -> Self {
        Self {
            project: project.into(),
            number,
            display_name: format!("#{}", number),
            parameters: None,
            log: ConsoleLog::Missing,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_parameters(mut self, parameters: Vec<BuildParameter>) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn with_log_text(mut self, text: impl Into<String>) -> Self {
        self.log = ConsoleLog::Text(text.into());
        self
    }

    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log = ConsoleLog::File(path.into());
        self
    }
}

impl BuildRecord for StoredBuild {
    fn project_full_name(&self) -> &str {
        &self.project
    }

    fn number(&self) -> u64 {
        self.number
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn parameters(&self) -> Option<&[BuildParameter]> {
        self.parameters.as_deref()
    }

    fn write_log_to(&self, sink: &mut dyn Write) -> io::Result<u64> {
        match &self.log {
            ConsoleLog::Text(text) => {
                sink.write_all(text.as_bytes())?;
                Ok(text.len() as u64)
            }
            ConsoleLog::File(path) => {
                let mut file = File::open(path)?;
                io::copy(&mut file, sink)
            }
            ConsoleLog::Missing => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no console log for {} #{}", self.project, self.number),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_display_name() {
        let build = StoredBuild::new("app", 7);
        assert_eq!(build.display_name(), "#7");
        assert!(build.parameters().is_none());
    }

    #[test]
    fn test_log_text() {
        let build = StoredBuild::new("app", 1).with_log_text("Started by user\nFinished: SUCCESS\n");
        let mut out = Vec::new();
        let written = build.write_log_to(&mut out).unwrap();
        assert_eq!(written as usize, out.len());
        assert!(String::from_utf8(out).unwrap().ends_with("SUCCESS\n"));
    }

    #[test]
    fn test_log_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("log");
        std::fs::write(&path, "compiling...").unwrap();

        let build = StoredBuild::new("app", 2).with_log_file(&path);
        let mut out = Vec::new();
        build.write_log_to(&mut out).unwrap();
        assert_eq!(out, b"compiling...");
    }

    #[test]
    fn test_missing_log_fails() {
        let build = StoredBuild::new("app", 3);
        let mut out = Vec::new();
        let err = build.write_log_to(&mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
