//! Control surface for the build search index.
//!
//! Provides:
//! - [`IndexManager`]: start, abort, clean and status with single-run exclusion
//! - [`StatusResponse`]: serde response with a 0/1/2 outcome code
//! - [`Authorizer`]: permission predicate injected by the host

pub mod error;
pub mod manager;
pub mod status;

pub use error::AccessDenied;
pub use manager::{AllowAll, Authorizer, ControlAction, IndexManager};
pub use status::{ResponseCode, StatusResponse};
