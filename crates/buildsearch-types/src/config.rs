//! Configuration loading for buildsearch.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at `<config dir>/buildsearch/config.toml`.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigError;

/// Which backend implementation stores the index.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Tantivy index on disk (default)
    #[default]
    Tantivy,
    /// Process-local index, lost on exit
    Memory,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Tantivy => "tantivy",
            BackendKind::Memory => "memory",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Backend used to store the index
    #[serde(default)]
    pub backend: BackendKind,

    /// Path to the Tantivy index directory
    #[serde(default = "default_index_path")]
    pub index_path: String,

    /// Memory budget for the index writer in MB
    #[serde(default = "default_writer_memory_mb")]
    pub writer_memory_mb: usize,

    /// Commit after this many documents during a rebuild (0 = only at the end)
    #[serde(default = "default_commit_interval")]
    pub commit_interval: u64,

    /// Root directory of the build records read by the filesystem host
    #[serde(default = "default_builds_root")]
    pub builds_root: String,

    /// Worker count used when a rebuild does not specify one
    #[serde(default = "default_workers")]
    pub default_workers: usize,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_index_path() -> String {
    ProjectDirs::from("", "", "buildsearch")
        .map(|p| p.data_local_dir().join("index"))
        .unwrap_or_else(|| PathBuf::from("./buildsearch-index"))
        .to_string_lossy()
        .to_string()
}

fn default_writer_memory_mb() -> usize {
    50
}

fn default_commit_interval() -> u64 {
    500
}

fn default_builds_root() -> String {
    "./jobs".to_string()
}

fn default_workers() -> usize {
    2
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            index_path: default_index_path(),
            writer_memory_mb: default_writer_memory_mb(),
            commit_interval: default_commit_interval(),
            builds_root: default_builds_root(),
            default_workers: default_workers(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (`<config dir>/buildsearch/config.toml`)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (BUILDSEARCH_*)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, ConfigError> {
        let config_dir = ProjectDirs::from("", "", "buildsearch")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("backend", BackendKind::default().as_str())?
            .set_default("index_path", default_index_path())?
            .set_default("writer_memory_mb", default_writer_memory_mb() as i64)?
            .set_default("commit_interval", default_commit_interval() as i64)?
            .set_default("builds_root", default_builds_root())?
            .set_default("default_workers", default_workers() as i64)?
            .set_default("log_level", default_log_level())?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Format: BUILDSEARCH_INDEX_PATH, BUILDSEARCH_BACKEND, ...
        // No separator: keys contain underscores and the config is flat.
        builder = builder.add_source(Environment::with_prefix("BUILDSEARCH").try_parsing(true));

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check values that deserialize fine but make no sense.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.writer_memory_mb == 0 {
            return Err(ConfigError::Invalid {
                key: "writer_memory_mb".into(),
                reason: "must be > 0".into(),
            });
        }
        if self.default_workers == 0 {
            return Err(ConfigError::Invalid {
                key: "default_workers".into(),
                reason: "must be > 0".into(),
            });
        }
        Ok(())
    }

    /// Index path with a leading `~/` expanded.
    pub fn expanded_index_path(&self) -> PathBuf {
        expand_home(&self.index_path)
    }

    /// Builds root with a leading `~/` expanded.
    pub fn expanded_builds_root(&self) -> PathBuf {
        expand_home(&self.builds_root)
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(dirs) = directories::BaseDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.backend, BackendKind::Tantivy);
        assert_eq!(settings.writer_memory_mb, 50);
        assert_eq!(settings.commit_interval, 500);
        assert_eq!(settings.default_workers, 2);
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn test_load_with_cli_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "backend = \"memory\"\ncommit_interval = 10\nbuilds_root = \"/srv/jobs\"\n",
        )
        .unwrap();

        let settings = Settings::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(settings.backend, BackendKind::Memory);
        assert_eq!(settings.commit_interval, 10);
        assert_eq!(settings.builds_root, "/srv/jobs");
        assert_eq!(settings.writer_memory_mb, 50);
    }

    #[test]
    fn test_load_rejects_zero_workers() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.toml");
        std::fs::write(&path, "default_workers = 0\n").unwrap();

        let result = Settings::load(Some(path.to_str().unwrap()));
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_backend_kind_serde() {
        let kind: BackendKind = serde_json::from_str("\"memory\"").unwrap();
        assert_eq!(kind, BackendKind::Memory);
        assert_eq!(BackendKind::Tantivy.to_string(), "tantivy");
    }

    #[test]
    fn test_expand_plain_path() {
        let settings = Settings {
            index_path: "/var/lib/buildsearch".into(),
            ..Default::default()
        };
        assert_eq!(
            settings.expanded_index_path(),
            PathBuf::from("/var/lib/buildsearch")
        );
    }
}
