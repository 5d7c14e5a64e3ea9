//! Command implementations for the buildsearch binary.
//!
//! Handles:
//! - rebuild: start a rebuild and follow it to completion
//! - clean: delete the index
//! - search: query the index
//! - fields: print the field schema

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{info, warn};

use buildsearch_backend::{open_backend, SearchBackend, SearchQuery};
use buildsearch_control::{AllowAll, IndexManager, StatusResponse};
use buildsearch_rebuild::{Orchestrator, RebuildConfig, RebuildRequest};
use buildsearch_types::{all_fields, Field, Settings};

use crate::cli::Cli;
use crate::fs_host::FsHost;

/// Interval between status polls while following a run.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Load settings and apply CLI overrides (highest precedence).
pub fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings =
        Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;

    if let Some(log_level) = &cli.log_level {
        settings.log_level = log_level.clone();
    }
    if let Some(index_path) = &cli.index_path {
        settings.index_path = index_path.clone();
    }
    if let Some(builds_root) = &cli.builds_root {
        settings.builds_root = builds_root.clone();
    }

    Ok(settings)
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the setting.
pub fn init_logging(settings: &Settings) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Wire the filesystem host, configured backend and orchestrator together.
pub fn build_manager(settings: &Settings) -> Result<IndexManager> {
    let backend = open_backend(settings).context("Failed to open search backend")?;
    let builds_root = settings.expanded_builds_root();
    info!(builds_root = ?builds_root, backend = backend.name(), "Using build records");

    let host = Arc::new(FsHost::new(builds_root));
    let config = RebuildConfig::default().with_commit_interval(settings.commit_interval);
    let orchestrator = Orchestrator::new(host, backend, config);

    // Local CLI users own the index files; no further permission model.
    Ok(IndexManager::new(Arc::new(orchestrator), Arc::new(AllowAll)))
}

/// Poll until the current run is terminal. Ctrl+C aborts the run.
async fn follow(manager: &IndexManager) -> Result<StatusResponse> {
    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let status = manager.status().await?;
        if !status.running {
            return Ok(status);
        }
        if let Some(progress) = &status.progress {
            info!(
                total = progress.total,
                processed = progress.processed,
                failed = progress.failed,
                "Progress"
            );
        }

        tokio::select! {
            result = &mut ctrl_c => {
                result.context("Failed to listen for Ctrl+C")?;
                warn!("Received Ctrl+C, aborting...");
                let last = manager.status().await?;
                manager.abort().await?;
                return Ok(StatusResponse {
                    message: format!("Aborted: {}", last.message),
                    ..last
                });
            }
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
        }
    }
}

/// Start a rebuild and wait for it to finish.
pub async fn handle_rebuild(
    settings: &Settings,
    workers: Option<usize>,
    projects: Vec<String>,
    overwrite: bool,
) -> Result<StatusResponse> {
    let manager = build_manager(settings)?;
    let request = RebuildRequest::all(workers.unwrap_or(settings.default_workers))
        .with_projects(projects)
        .with_overwrite(overwrite);

    let response = manager.start_rebuild(request).await?;
    if !response.is_ok() {
        return Ok(response);
    }
    follow(&manager).await
}

/// Clean the index and wait for it to finish.
pub async fn handle_clean(settings: &Settings) -> Result<StatusResponse> {
    let manager = build_manager(settings)?;
    let response = manager.clean().await?;
    if !response.is_ok() {
        return Ok(response);
    }
    follow(&manager).await
}

/// Run a query and return one formatted line per hit.
pub fn handle_search(
    backend: &dyn SearchBackend,
    terms: &[String],
    project: Option<&str>,
    build: Option<u64>,
    limit: usize,
) -> Result<Vec<String>> {
    let mut query = SearchQuery::new(terms.join(" ")).with_limit(limit);
    if let Some(project) = project {
        query = query.with_filter(Field::ProjectName, project);
    }
    if let Some(build) = build {
        query = query.with_filter(Field::BuildNumber, build.to_string());
    }

    let hits = backend.query(&query).context("Search failed")?;
    Ok(hits
        .iter()
        .map(|doc| {
            let key = doc
                .key()
                .map(|k| k.to_string())
                .unwrap_or_else(|| "?".to_string());
            let name = doc.text(Field::BuildDisplayName).unwrap_or("");
            format!("{}\t{}", key, name)
        })
        .collect())
}

/// Field schema as a printable table.
pub fn fields_table() -> String {
    let mut out = format!(
        "{:<6}{:<20}{:<10}{:<10}{}\n",
        "NAME", "FIELD", "SEARCH", "NUMERIC", "PERSIST"
    );
    for descriptor in all_fields() {
        out.push_str(&format!(
            "{:<6}{:<20}{:<10}{:<10}{}\n",
            descriptor.name,
            format!("{:?}", descriptor.field),
            descriptor.default_searchable,
            descriptor.numeric,
            descriptor.persist
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildsearch_backend::MemoryBackend;
    use buildsearch_types::{Document, FieldValue};

    #[test]
    fn test_fields_table_lists_every_field() {
        let table = fields_table();
        assert_eq!(table.lines().count(), 1 + all_fields().len());
        assert!(table.contains("BuildNumber"));
        assert!(table.lines().nth(2).unwrap().starts_with("n "));
    }

    #[test]
    fn test_handle_search_formats_hits() {
        let backend = MemoryBackend::new().unwrap();
        let doc = Document::new()
            .with(Field::ProjectName, FieldValue::Text("api".into()))
            .with(Field::BuildNumber, FieldValue::Number(7))
            .with(Field::BuildDisplayName, FieldValue::Text("nightly".into()))
            .with(Field::Console, FieldValue::Text("tests failed".into()));
        backend.index(&doc, false).unwrap();
        backend.commit().unwrap();

        let lines =
            handle_search(&backend, &["failed".to_string()], Some("api"), Some(7), 10).unwrap();
        assert_eq!(lines, vec!["api#7\tnightly".to_string()]);

        let lines = handle_search(&backend, &["passed".to_string()], None, None, 10).unwrap();
        assert!(lines.is_empty());
    }
}
