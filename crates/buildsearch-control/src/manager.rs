//! Control surface over the rebuild orchestrator.
//!
//! [`IndexManager`] owns the current [`ProgressState`] and enforces that at
//! most one run is in progress at a time. The check for a running run and the
//! installation of a new one happen under the same lock.

use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use buildsearch_rebuild::{
    Orchestrator, Phase, ProgressState, RebuildError, RebuildRequest, ValidationError,
};

use crate::error::AccessDenied;
use crate::status::{
    ResponseCode, StatusResponse, MSG_CLEAN_STARTED, MSG_COMPLETED, MSG_INVALID_WORKERS,
    MSG_PROCESSING, MSG_REBUILD_STARTED,
};

/// Operation being authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlAction {
    Rebuild,
    Abort,
    Clean,
    Status,
}

impl fmt::Display for ControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ControlAction::Rebuild => "rebuild",
            ControlAction::Abort => "abort",
            ControlAction::Clean => "clean",
            ControlAction::Status => "status",
        })
    }
}

/// Permission predicate consulted before every operation.
pub trait Authorizer: Send + Sync {
    fn is_permitted(&self, action: ControlAction) -> bool;
}

impl<F> Authorizer for F
where
    F: Fn(ControlAction) -> bool + Send + Sync,
{
    fn is_permitted(&self, action: ControlAction) -> bool {
        self(action)
    }
}

/// Authorizer that permits everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn is_permitted(&self, _action: ControlAction) -> bool {
        true
    }
}

#[derive(Default)]
struct ManagerState {
    progress: Option<Arc<ProgressState>>,
    workers: usize,
}

impl ManagerState {
    fn is_running(&self) -> bool {
        self.progress.as_ref().is_some_and(|p| !p.is_finished())
    }
}

/// Start, abort, clean and report on index runs.
pub struct IndexManager {
    orchestrator: Arc<Orchestrator>,
    authorizer: Arc<dyn Authorizer>,
    state: Mutex<ManagerState>,
}

impl IndexManager {
    pub fn new(orchestrator: Arc<Orchestrator>, authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            orchestrator,
            authorizer,
            state: Mutex::new(ManagerState::default()),
        }
    }

    fn authorize(&self, action: ControlAction) -> Result<(), AccessDenied> {
        if self.authorizer.is_permitted(action) {
            Ok(())
        } else {
            debug!(%action, "Control action denied");
            Err(AccessDenied { action })
        }
    }

    /// Start a rebuild unless one is already running.
    pub async fn start_rebuild(
        &self,
        request: RebuildRequest,
    ) -> Result<StatusResponse, AccessDenied> {
        self.authorize(ControlAction::Rebuild)?;

        let mut state = self.state.lock().await;
        if state.is_running() {
            return Ok(StatusResponse::busy());
        }

        let workers = request.workers;
        match self.orchestrator.rebuild(request).await {
            Ok(progress) => {
                state.progress = Some(progress);
                state.workers = workers;
                info!(workers, "Rebuild accepted");
                Ok(StatusResponse {
                    workers,
                    ..StatusResponse::ok(MSG_REBUILD_STARTED)
                })
            }
            Err(RebuildError::Validation(ValidationError::InvalidWorkers(_))) => {
                Ok(StatusResponse::rejected(MSG_INVALID_WORKERS))
            }
            Err(e) => Ok(StatusResponse::rejected(e.to_string())),
        }
    }

    /// Start a rebuild from form values; see [`RebuildRequest::from_form`].
    pub async fn start_rebuild_form(
        &self,
        workers: usize,
        project_names: &str,
        mode: &str,
    ) -> Result<StatusResponse, AccessDenied> {
        self.start_rebuild(RebuildRequest::from_form(workers, project_names, mode))
            .await
    }

    /// Abort the current run and forget its progress.
    ///
    /// Returns once the run's workers have stopped.
    pub async fn abort(&self) -> Result<StatusResponse, AccessDenied> {
        self.authorize(ControlAction::Abort)?;

        let mut state = self.state.lock().await;
        let was_running = self.orchestrator.abort().await;
        state.progress = None;

        Ok(StatusResponse::ok(if was_running {
            "Aborted"
        } else {
            "Nothing to abort"
        }))
    }

    /// Delete the whole index in the background.
    pub async fn clean(&self) -> Result<StatusResponse, AccessDenied> {
        self.authorize(ControlAction::Clean)?;

        let mut state = self.state.lock().await;
        if state.is_running() {
            return Ok(StatusResponse::busy());
        }

        state.progress = Some(self.orchestrator.clean().await);
        Ok(StatusResponse::ok(MSG_CLEAN_STARTED))
    }

    /// Report on the current or last run.
    pub async fn status(&self) -> Result<StatusResponse, AccessDenied> {
        self.authorize(ControlAction::Status)?;

        let state = self.state.lock().await;
        let Some(progress) = state.progress.as_ref() else {
            return Ok(StatusResponse::never_started());
        };

        let snapshot = progress.snapshot();
        let mut response = StatusResponse {
            workers: state.workers,
            ..StatusResponse::ok("")
        };
        match snapshot.phase {
            Phase::Processing => {
                response.running = true;
                response.message = MSG_PROCESSING.to_string();
            }
            Phase::Complete => {
                response.message = MSG_COMPLETED.to_string();
            }
            Phase::CompleteWithError => {
                response.code = ResponseCode::CompletedWithErrors;
                response.message = snapshot.reasons.join("\n");
            }
        }
        response.progress = Some(snapshot);
        Ok(response)
    }
}
