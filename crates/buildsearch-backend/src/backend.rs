//! Backend contract.
//!
//! Every storage/search implementation provides [`SearchBackend`]. The rebuild
//! orchestrator shares one backend instance across all of its workers, so
//! implementations serialize their own writes.

use std::sync::Arc;

use tracing::info;

use buildsearch_types::{all_fields, BackendKind, Document, Field, Settings};

use crate::error::BackendError;
use crate::memory::MemoryBackend;
use crate::tantivy_backend::{TantivyBackend, TantivyConfig};

/// Default number of hits returned by a query.
pub const DEFAULT_QUERY_LIMIT: usize = 100;

/// Operations any index backend supports.
pub trait SearchBackend: Send + Sync {
    /// Write one document.
    ///
    /// With `overwrite == false` this is an upsert keyed by project name and
    /// build number, so repeating it is harmless. With `overwrite == true` the
    /// caller guarantees the index was cleaned for this run and the backend
    /// may skip the delete.
    fn index(&self, document: &Document, overwrite: bool) -> Result<(), BackendError>;

    /// Remove the document of one build, if present.
    fn remove(&self, project: &str, number: u64) -> Result<(), BackendError>;

    /// Run a query against committed documents.
    fn query(&self, query: &SearchQuery) -> Result<SearchHits, BackendError>;

    /// Delete the entire index. Safe on an empty index; visible immediately.
    fn clean(&self) -> Result<(), BackendError>;

    /// Make buffered writes visible to subsequent queries.
    ///
    /// Expensive for some backends - batch writes before calling.
    fn commit(&self) -> Result<(), BackendError>;

    /// Name of this backend for logging.
    fn name(&self) -> &str;
}

/// Exact match on a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFilter {
    pub field: Field,
    pub value: String,
}

/// Search terms plus field filters.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// Free text matched against default-searchable fields (may be empty)
    pub terms: String,
    /// Filters that every hit must satisfy
    pub filters: Vec<FieldFilter>,
    /// Maximum hits to return
    pub limit: usize,
}

impl SearchQuery {
    pub fn new(terms: impl Into<String>) -> Self {
        Self {
            terms: terms.into(),
            filters: Vec::new(),
            limit: DEFAULT_QUERY_LIMIT,
        }
    }

    /// Query matching every document, narrowed by filters only.
    pub fn all() -> Self {
        Self::new("")
    }

    pub fn with_filter(mut self, field: Field, value: impl Into<String>) -> Self {
        self.filters.push(FieldFilter {
            field,
            value: value.into(),
        });
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Query for one build by project name and number.
    pub fn for_build(project: &str, number: u64) -> Self {
        Self::all()
            .with_filter(Field::ProjectName, project)
            .with_filter(Field::BuildNumber, number.to_string())
    }
}

/// Finite query result. Iterating does not consume it.
#[derive(Debug, Clone, Default)]
pub struct SearchHits {
    documents: Vec<Document>,
}

impl SearchHits {
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Document> {
        self.documents.iter()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn first(&self) -> Option<&Document> {
        self.documents.first()
    }
}

impl IntoIterator for SearchHits {
    type Item = Document;
    type IntoIter = std::vec::IntoIter<Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.into_iter()
    }
}

impl<'a> IntoIterator for &'a SearchHits {
    type Item = &'a Document;
    type IntoIter = std::slice::Iter<'a, Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.iter()
    }
}

/// Fail unless `is_mapped` accepts every field of the schema.
///
/// Backends call this while being constructed so that a field added to the
/// schema without backend support is caught at startup.
pub fn ensure_schema_complete(
    backend: &str,
    is_mapped: impl Fn(Field) -> bool,
) -> Result<(), BackendError> {
    let missing: Vec<&str> = all_fields()
        .iter()
        .filter(|d| !is_mapped(d.field))
        .map(|d| d.name)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(BackendError::SchemaMismatch(format!(
            "{} backend has no mapping for field(s): {}",
            backend,
            missing.join(", ")
        )))
    }
}

/// Open the backend selected in the settings.
pub fn open_backend(settings: &Settings) -> Result<Arc<dyn SearchBackend>, BackendError> {
    info!(backend = %settings.backend, "Opening search backend");
    match settings.backend {
        BackendKind::Tantivy => {
            let config = TantivyConfig::new(settings.expanded_index_path())
                .with_writer_memory_mb(settings.writer_memory_mb);
            Ok(Arc::new(TantivyBackend::open_or_create(config)?))
        }
        BackendKind::Memory => Ok(Arc::new(MemoryBackend::new()?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ensure_schema_complete_reports_missing() {
        let err = ensure_schema_complete("partial", |f| f != Field::Console).unwrap_err();
        match err {
            BackendError::SchemaMismatch(msg) => {
                assert!(msg.contains("partial"));
                assert!(msg.contains('c'));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_ensure_schema_complete_accepts_full_mapping() {
        assert!(ensure_schema_complete("full", |_| true).is_ok());
    }

    #[test]
    fn test_for_build_filters() {
        let query = SearchQuery::for_build("app", 3);
        assert!(query.terms.is_empty());
        assert_eq!(query.filters.len(), 2);
        assert_eq!(query.filters[1].value, "3");
        assert_eq!(query.limit, DEFAULT_QUERY_LIMIT);
    }

    #[test]
    fn test_hits_are_restartable() {
        let hits = SearchHits::new(vec![Document::new(), Document::new()]);
        assert_eq!(hits.iter().count(), 2);
        assert_eq!(hits.iter().count(), 2);
        assert_eq!((&hits).into_iter().count(), 2);
    }

    #[test]
    fn test_open_backend_by_kind() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings {
            backend: BackendKind::Memory,
            ..Default::default()
        };
        assert_eq!(open_backend(&settings).unwrap().name(), "memory");

        let settings = Settings {
            backend: BackendKind::Tantivy,
            index_path: temp_dir.path().to_string_lossy().to_string(),
            ..Default::default()
        };
        assert_eq!(open_backend(&settings).unwrap().name(), "tantivy");
    }
}
