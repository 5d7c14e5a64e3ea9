//! Responses returned by every control operation.

use serde::{Serialize, Serializer};

use buildsearch_rebuild::ProgressSnapshot;

pub const MSG_BUSY: &str = "Currently working, wait for it ....";
pub const MSG_INVALID_WORKERS: &str = "Invalid number of workers";
pub const MSG_REBUILD_STARTED: &str = "Rebuild started";
pub const MSG_CLEAN_STARTED: &str = "Clean started";
pub const MSG_NEVER_STARTED: &str = "Never started";
pub const MSG_PROCESSING: &str = "processing";
pub const MSG_COMPLETED: &str = "Completed without errors";

/// Outcome class of a control operation, serialized as 0, 1 or 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    /// Accepted, or nothing to report
    Ok = 0,
    /// Rejected: busy or invalid request
    Rejected = 1,
    /// Last run completed with errors
    CompletedWithErrors = 2,
}

impl ResponseCode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl Serialize for ResponseCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

/// Status reported to the transport.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub code: ResponseCode,
    pub message: String,
    pub running: bool,
    pub never_started: bool,
    pub workers: usize,
    pub progress: Option<ProgressSnapshot>,
}

impl StatusResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            code: ResponseCode::Ok,
            message: message.into(),
            running: false,
            never_started: false,
            workers: 0,
            progress: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            code: ResponseCode::Rejected,
            ..Self::ok(message)
        }
    }

    /// Rejection because a run is in progress.
    pub fn busy() -> Self {
        Self {
            running: true,
            ..Self::rejected(MSG_BUSY)
        }
    }

    pub fn never_started() -> Self {
        Self {
            never_started: true,
            ..Self::ok(MSG_NEVER_STARTED)
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == ResponseCode::Ok
    }
}
