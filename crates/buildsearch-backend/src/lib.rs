//! # buildsearch-backend
//!
//! Storage and search backends for the build search index.
//!
//! ## Features
//! - [`SearchBackend`]: the contract every backend implements
//! - [`TantivyBackend`]: embedded Tantivy index with MmapDirectory persistence
//! - [`MemoryBackend`]: process-local backend for tests and embedding
//! - [`open_backend`]: picks the backend named in the settings

pub mod backend;
pub mod error;
pub mod memory;
pub mod schema;
pub mod tantivy_backend;

pub use backend::{
    ensure_schema_complete, open_backend, FieldFilter, SearchBackend, SearchHits, SearchQuery,
    DEFAULT_QUERY_LIMIT,
};
pub use error::BackendError;
pub use memory::{BackendOp, MemoryBackend};
pub use schema::{build_schema, BuildSchema};
pub use tantivy_backend::{TantivyBackend, TantivyConfig};
