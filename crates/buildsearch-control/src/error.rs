//! Error types for the control surface.

use thiserror::Error;

use crate::manager::ControlAction;

/// The injected authorizer refused an operation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Access denied: {action} requires administer permission")]
pub struct AccessDenied {
    pub action: ControlAction,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AccessDenied {
            action: ControlAction::Clean,
        };
        assert_eq!(
            err.to_string(),
            "Access denied: clean requires administer permission"
        );
    }
}
