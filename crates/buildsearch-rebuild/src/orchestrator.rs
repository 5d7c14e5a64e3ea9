//! Rebuild orchestrator.
//!
//! A rebuild runs as a supervisor task on the Tokio runtime:
//! 1. clean the index (overwrite runs only)
//! 2. enumerate every build of the selected projects
//! 3. fan the builds out to a fixed pool of blocking workers
//! 4. commit and mark the [`ProgressState`] terminal
//!
//! Workers claim builds through a shared cursor and check the cancellation
//! token before each claim, so an abort stops new work after at most one
//! in-flight build per worker.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use buildsearch_backend::SearchBackend;
use buildsearch_types::{BuildRecord, Document, DocumentKey};

use crate::error::RebuildError;
use crate::host::{BuildHost, ProjectInfo};
use crate::progress::ProgressState;
use crate::request::RebuildRequest;

/// Default number of indexed builds between intermediate commits.
pub const DEFAULT_COMMIT_INTERVAL: u64 = 500;

/// Tuning for rebuild runs.
#[derive(Debug, Clone)]
pub struct RebuildConfig {
    /// Commit after every this many builds; 0 commits only at the end
    pub commit_interval: u64,
}

impl Default for RebuildConfig {
    fn default() -> Self {
        Self {
            commit_interval: DEFAULT_COMMIT_INTERVAL,
        }
    }
}

impl RebuildConfig {
    pub fn with_commit_interval(mut self, interval: u64) -> Self {
        self.commit_interval = interval;
        self
    }
}

/// Handle to the most recently started run.
struct ActiveRun {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Builds claimed by workers in enumeration order.
struct WorkQueue {
    builds: Vec<Arc<dyn BuildRecord>>,
    cursor: AtomicUsize,
    done: AtomicU64,
}

impl WorkQueue {
    fn new(builds: Vec<Arc<dyn BuildRecord>>) -> Self {
        Self {
            builds,
            cursor: AtomicUsize::new(0),
            done: AtomicU64::new(0),
        }
    }

    fn claim(&self) -> Option<&Arc<dyn BuildRecord>> {
        let next = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.builds.get(next)
    }

    /// Mark one claimed build as handled, returning the new count.
    fn complete(&self) -> u64 {
        self.done.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn unclaimed(&self) -> usize {
        let claimed = self.cursor.load(Ordering::Acquire).min(self.builds.len());
        self.builds.len() - claimed
    }
}

/// Everything one worker needs, cloned per worker.
#[derive(Clone)]
struct WorkerContext {
    queue: Arc<WorkQueue>,
    backend: Arc<dyn SearchBackend>,
    progress: Arc<ProgressState>,
    cancel: CancellationToken,
    overwrite: bool,
    commit_interval: u64,
}

impl WorkerContext {
    fn run(&self, worker: usize) {
        loop {
            if self.cancel.is_cancelled() {
                debug!(worker, "Worker stopping on cancellation");
                break;
            }
            let Some(build) = self.queue.claim() else {
                break;
            };

            self.index_one(build.as_ref());

            let done = self.queue.complete();
            if self.commit_interval > 0 && done % self.commit_interval == 0 {
                match self.backend.commit() {
                    Ok(()) => info!(worker, done, "Intermediate commit"),
                    Err(e) => {
                        warn!(worker, done, error = %e, "Intermediate commit failed");
                        self.progress
                            .record_reason(format!("Commit after {} builds failed: {}", done, e));
                    }
                }
            }
        }
    }

    fn index_one(&self, build: &dyn BuildRecord) {
        let key = DocumentKey::new(build.project_full_name(), build.number());
        let document = Document::from_build(build);
        match self.backend.index(&document, self.overwrite) {
            Ok(()) => {
                debug!(key = %key, fields = document.len(), "Indexed build");
                self.progress.record_processed();
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to index build");
                self.progress.record_failure(format!("{}: {}", key, e));
            }
        }
    }
}

/// Runs rebuild and clean operations against one backend.
pub struct Orchestrator {
    host: Arc<dyn BuildHost>,
    backend: Arc<dyn SearchBackend>,
    config: RebuildConfig,
    active: Mutex<Option<ActiveRun>>,
}

impl Orchestrator {
    pub fn new(
        host: Arc<dyn BuildHost>,
        backend: Arc<dyn SearchBackend>,
        config: RebuildConfig,
    ) -> Self {
        Self {
            host,
            backend,
            config,
            active: Mutex::new(None),
        }
    }

    /// Validate `request` and start a rebuild in the background.
    ///
    /// Nothing is touched when validation fails. On success the returned
    /// progress is live; poll it for completion.
    pub async fn rebuild(
        &self,
        request: RebuildRequest,
    ) -> Result<Arc<ProgressState>, RebuildError> {
        let host = Arc::clone(&self.host);
        let inventory = tokio::task::spawn_blocking(move || host.projects()).await?;
        request.validate(&inventory)?;
        let selected = request.select(inventory);

        info!(
            workers = request.workers,
            projects = selected.len(),
            overwrite = request.overwrite,
            backend = self.backend.name(),
            "Starting rebuild"
        );

        let progress = Arc::new(ProgressState::new());
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(supervise(
            Arc::clone(&self.host),
            Arc::clone(&self.backend),
            self.config.clone(),
            request,
            selected,
            Arc::clone(&progress),
            cancel.clone(),
        ));
        self.install(ActiveRun { cancel, handle });

        Ok(progress)
    }

    /// Delete the whole index in the background.
    pub async fn clean(&self) -> Arc<ProgressState> {
        info!(backend = self.backend.name(), "Starting clean");

        let progress = Arc::new(ProgressState::new());
        let backend = Arc::clone(&self.backend);
        let run_progress = Arc::clone(&progress);
        let handle = tokio::spawn(async move {
            let result = run_blocking(move || {
                backend.clean()?;
                backend.commit()
            })
            .await;
            match result {
                Ok(()) => {
                    run_progress.finish();
                    info!("Index cleaned");
                }
                Err(reason) => {
                    warn!(%reason, "Clean failed");
                    run_progress.complete_with_error(format!("Failed to clean index: {}", reason));
                }
            }
        });
        self.install(ActiveRun {
            cancel: CancellationToken::new(),
            handle,
        });

        progress
    }

    /// Cancel the most recent run and wait for its workers to drain.
    ///
    /// Returns whether a run was still in progress. Documents already
    /// written stay in the index.
    pub async fn abort(&self) -> bool {
        let Some(run) = self.take_active() else {
            return false;
        };

        let was_running = !run.handle.is_finished();
        run.cancel.cancel();
        if let Err(e) = run.handle.await {
            warn!(error = %e, "Run supervisor ended abnormally");
        }

        if was_running {
            info!("Run aborted");
        }
        was_running
    }

    fn install(&self, run: ActiveRun) {
        let previous = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(run);
        if let Some(previous) = previous {
            if !previous.handle.is_finished() {
                warn!("Replacing a run that has not finished");
            }
        }
    }

    fn take_active(&self) -> Option<ActiveRun> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Run blocking backend work, flattening a panicked task into its message.
async fn run_blocking<F>(work: F) -> Result<(), String>
where
    F: FnOnce() -> Result<(), buildsearch_backend::BackendError> + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    }
}

fn enumerate(
    host: &dyn BuildHost,
    projects: &[ProjectInfo],
    progress: &ProgressState,
) -> Vec<Arc<dyn BuildRecord>> {
    let mut builds = Vec::new();
    for project in projects {
        match host.builds(project) {
            Ok(found) => {
                debug!(project = %project.full_name, builds = found.len(), "Enumerated project");
                builds.extend(found);
            }
            Err(e) => {
                warn!(project = %project.full_name, error = %e, "Skipping project");
                progress.record_reason(e.to_string());
            }
        }
    }
    builds
}

async fn supervise(
    host: Arc<dyn BuildHost>,
    backend: Arc<dyn SearchBackend>,
    config: RebuildConfig,
    request: RebuildRequest,
    projects: Vec<ProjectInfo>,
    progress: Arc<ProgressState>,
    cancel: CancellationToken,
) {
    if request.overwrite {
        let cleaner = Arc::clone(&backend);
        if let Err(reason) = run_blocking(move || cleaner.clean()).await {
            warn!(%reason, "Clean before rebuild failed");
            progress.complete_with_error(format!("Failed to clean index: {}", reason));
            return;
        }
        debug!("Cleaned index before rebuild");
    }

    if cancel.is_cancelled() {
        info!("Rebuild aborted before enumeration");
        progress.record_reason("Rebuild aborted before any build was enumerated");
        progress.finish();
        return;
    }

    let enumerated = {
        let progress = Arc::clone(&progress);
        tokio::task::spawn_blocking(move || enumerate(host.as_ref(), &projects, &progress)).await
    };
    let builds = match enumerated {
        Ok(builds) => builds,
        Err(e) => {
            progress.complete_with_error(format!("Build enumeration failed: {}", e));
            return;
        }
    };

    let total = builds.len();
    progress.set_total(total);
    info!(total, workers = request.workers, "Enumerated builds");

    let context = WorkerContext {
        queue: Arc::new(WorkQueue::new(builds)),
        backend: Arc::clone(&backend),
        progress: Arc::clone(&progress),
        cancel: cancel.clone(),
        overwrite: request.overwrite,
        commit_interval: config.commit_interval,
    };

    let workers: Vec<_> = (0..request.workers)
        .map(|worker| {
            let context = context.clone();
            tokio::task::spawn_blocking(move || context.run(worker))
        })
        .collect();
    for worker in workers {
        if let Err(e) = worker.await {
            warn!(error = %e, "Worker ended abnormally");
            progress.record_reason(format!("Worker failed: {}", e));
        }
    }

    let committer = Arc::clone(&backend);
    if let Err(reason) = run_blocking(move || committer.commit()).await {
        warn!(%reason, "Final commit failed");
        progress.record_reason(format!("Final commit failed: {}", reason));
    }

    let unclaimed = context.queue.unclaimed();
    if cancel.is_cancelled() && unclaimed > 0 {
        progress.record_reason(format!(
            "Rebuild aborted with {} of {} build(s) not indexed",
            unclaimed, total
        ));
    }

    progress.finish();
    let snapshot = progress.snapshot();
    info!(
        total,
        processed = snapshot.processed,
        failed = snapshot.failed,
        phase = ?snapshot.phase,
        "Rebuild finished"
    );
}
