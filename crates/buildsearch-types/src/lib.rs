//! # buildsearch-types
//!
//! Shared domain types for the build search index.
//!
//! - [`field`]: the fixed field schema and its extraction rules
//! - [`build`]: the read-only build record model supplied by the host
//! - [`document`]: documents extracted from builds
//! - [`config`]: layered settings

pub mod build;
pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod field;

pub use build::{BuildParameter, BuildRecord, ConsoleLog, StoredBuild};
pub use config::{BackendKind, Settings};
pub use document::{Document, DocumentKey, FieldValue};
pub use error::ConfigError;
pub use extract::extract;
pub use field::{all_fields, default_searchable_fields, describe, Field, FieldDescriptor};
