//! Backend error types.

use thiserror::Error;

/// Errors that can occur in a search backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Tantivy index error
    #[error("Tantivy error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    /// Query parse error
    #[error("Query parse error: {0}")]
    QueryParse(#[from] tantivy::query::QueryParserError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend does not map every schema field, or an existing index disagrees with the schema
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Document lacks the project name or build number it is keyed by
    #[error("Document has no key: {0}")]
    MissingKey(String),

    /// Query or filter value cannot be evaluated
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Internal lock was poisoned by a panicking writer
    #[error("Backend is locked: {0}")]
    Locked(String),
}
