//! Progress tracking for rebuild and clean runs.
//!
//! A [`ProgressState`] is shared by `Arc` between the supervisor, its workers
//! and any status reader. The phase only moves forward: `Processing` to one of
//! the two terminal phases, exactly once. Mutations that arrive after the
//! terminal transition are dropped.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

/// Lifecycle phase of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Processing,
    Complete,
    CompleteWithError,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Phase::Processing)
    }
}

/// Point-in-time copy of a [`ProgressState`], used in status responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub phase: Phase,
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
    pub reasons: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ProgressSnapshot {
    /// Builds neither indexed nor failed yet.
    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.processed + self.failed)
    }
}

#[derive(Debug)]
struct Inner {
    phase: Phase,
    total: usize,
    processed: usize,
    failed: usize,
    reasons: Vec<String>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

/// Live, internally locked progress of one run.
#[derive(Debug)]
pub struct ProgressState {
    inner: Mutex<Inner>,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressState {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                phase: Phase::Processing,
                total: 0,
                processed: 0,
                failed: 0,
                reasons: Vec::new(),
                started_at: Utc::now(),
                finished_at: None,
            }),
        }
    }

    // Counters are plain integers, so a panic mid-update cannot leave them
    // inconsistent; keep serving after poisoning.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock for mutation, or `None` once terminal.
    fn lock_live(&self, operation: &str) -> Option<MutexGuard<'_, Inner>> {
        let inner = self.lock();
        if inner.phase.is_terminal() {
            warn!(operation, phase = ?inner.phase, "Ignoring progress update after completion");
            None
        } else {
            Some(inner)
        }
    }

    pub fn set_total(&self, total: usize) {
        if let Some(mut inner) = self.lock_live("set_total") {
            inner.total = total;
        }
    }

    /// Count one successfully indexed build.
    pub fn record_processed(&self) {
        if let Some(mut inner) = self.lock_live("record_processed") {
            inner.processed += 1;
        }
    }

    /// Count one failed build and keep its reason.
    pub fn record_failure(&self, reason: impl Into<String>) {
        if let Some(mut inner) = self.lock_live("record_failure") {
            inner.failed += 1;
            inner.reasons.push(reason.into());
        }
    }

    /// Keep a reason without counting a failed build.
    pub fn record_reason(&self, reason: impl Into<String>) {
        if let Some(mut inner) = self.lock_live("record_reason") {
            inner.reasons.push(reason.into());
        }
    }

    /// Record `reason` and finish in one step.
    pub fn complete_with_error(&self, reason: impl Into<String>) -> bool {
        let mut inner = self.lock();
        if inner.phase.is_terminal() {
            warn!(phase = ?inner.phase, "Ignoring completion of a finished run");
            return false;
        }
        inner.reasons.push(reason.into());
        Self::terminate(&mut inner);
        true
    }

    /// Move to the terminal phase.
    ///
    /// The phase is `CompleteWithError` when any reason was recorded. Returns
    /// true only for the call that performed the transition.
    pub fn finish(&self) -> bool {
        let mut inner = self.lock();
        if inner.phase.is_terminal() {
            return false;
        }
        Self::terminate(&mut inner);
        true
    }

    fn terminate(inner: &mut Inner) {
        inner.phase = if inner.reasons.is_empty() {
            Phase::Complete
        } else {
            Phase::CompleteWithError
        };
        inner.finished_at = Some(Utc::now());
    }

    pub fn is_finished(&self) -> bool {
        self.lock().phase.is_terminal()
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    pub fn reasons(&self) -> Vec<String> {
        self.lock().reasons.clone()
    }

    /// Failure reasons joined by newlines, in the order they were recorded.
    pub fn reasons_as_string(&self) -> String {
        self.lock().reasons.join("\n")
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let inner = self.lock();
        ProgressSnapshot {
            phase: inner.phase,
            total: inner.total,
            processed: inner.processed,
            failed: inner.failed,
            reasons: inner.reasons.clone(),
            started_at: inner.started_at,
            finished_at: inner.finished_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_new_is_processing() {
        let progress = ProgressState::new();
        assert_eq!(progress.phase(), Phase::Processing);
        assert!(!progress.is_finished());
        assert!(progress.snapshot().finished_at.is_none());
    }

    #[test]
    fn test_finish_without_reasons_completes() {
        let progress = ProgressState::new();
        progress.set_total(2);
        progress.record_processed();
        progress.record_processed();
        assert!(progress.finish());

        let snapshot = progress.snapshot();
        assert_eq!(snapshot.phase, Phase::Complete);
        assert_eq!(snapshot.processed, 2);
        assert_eq!(snapshot.remaining(), 0);
        assert!(snapshot.finished_at.is_some());
    }

    #[test]
    fn test_finish_with_reasons_is_error() {
        let progress = ProgressState::new();
        progress.set_total(3);
        progress.record_processed();
        progress.record_failure("app#2: disk full");
        progress.record_reason("aborted");
        assert!(progress.finish());

        assert_eq!(progress.phase(), Phase::CompleteWithError);
        assert_eq!(progress.reasons_as_string(), "app#2: disk full\naborted");
        let snapshot = progress.snapshot();
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.remaining(), 1);
    }

    #[test]
    fn test_terminal_transition_happens_once() {
        let progress = ProgressState::new();
        assert!(progress.finish());
        assert!(!progress.finish());
        assert!(!progress.complete_with_error("late"));
        assert_eq!(progress.phase(), Phase::Complete);
    }

    #[test]
    fn test_mutations_after_finish_are_ignored() {
        let progress = ProgressState::new();
        progress.set_total(1);
        progress.complete_with_error("clean failed");

        progress.record_processed();
        progress.record_failure("late");
        progress.set_total(10);

        let snapshot = progress.snapshot();
        assert_eq!(snapshot.phase, Phase::CompleteWithError);
        assert_eq!(snapshot.total, 1);
        assert_eq!(snapshot.processed, 0);
        assert_eq!(snapshot.reasons, vec!["clean failed".to_string()]);
    }

    #[test]
    fn test_concurrent_finish_has_one_winner() {
        let progress = Arc::new(ProgressState::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let progress = Arc::clone(&progress);
                std::thread::spawn(move || progress.finish())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_snapshot_serializes_phase_snake_case() {
        let progress = ProgressState::new();
        progress.complete_with_error("boom");
        let json = serde_json::to_value(progress.snapshot()).unwrap();
        assert_eq!(json["phase"], "complete_with_error");
        assert_eq!(json["reasons"][0], "boom");
    }
}
