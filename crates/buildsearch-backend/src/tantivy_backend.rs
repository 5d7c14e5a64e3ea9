//! Tantivy-backed production backend.
//!
//! The IndexWriter sits behind `Arc<Mutex>` so all rebuild workers share it.
//! Documents are not visible until commit() is called; the reader is
//! reloaded after every commit and clean.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tantivy::collector::TopDocs;
use tantivy::query::{AllQuery, BooleanQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, info};

use buildsearch_types::{
    all_fields, default_searchable_fields, Document, DocumentKey, Field, FieldValue,
};

use crate::backend::{FieldFilter, SearchBackend, SearchHits, SearchQuery};
use crate::error::BackendError;
use crate::schema::{build_schema, BuildSchema};

const DEFAULT_WRITER_MEMORY_MB: usize = 50;

/// Where the build index lives and how much memory its writer may buffer.
#[derive(Debug, Clone)]
pub struct TantivyConfig {
    pub path: PathBuf,
    pub writer_memory_mb: usize,
}

impl TantivyConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer_memory_mb: DEFAULT_WRITER_MEMORY_MB,
        }
    }

    pub fn with_writer_memory_mb(mut self, mb: usize) -> Self {
        self.writer_memory_mb = mb;
        self
    }

    fn writer_budget(&self) -> usize {
        self.writer_memory_mb.saturating_mul(1024 * 1024)
    }
}

/// Open the build index under `path`, creating it on first use.
///
/// An existing index whose schema lacks any build field is rejected.
fn open_build_index(path: &Path) -> Result<(Index, BuildSchema), BackendError> {
    if path.join("meta.json").exists() {
        let index = Index::open_in_dir(path)?;
        let schema = BuildSchema::from_schema(index.schema())?;
        info!(path = ?path, "Opened build index");
        Ok((index, schema))
    } else {
        fs::create_dir_all(path)?;
        let schema = build_schema();
        let index = Index::create_in_dir(path, schema.schema().clone())?;
        info!(path = ?path, "Created build index");
        Ok((index, schema))
    }
}

/// Search backend storing documents in a Tantivy index.
pub struct TantivyBackend {
    index: Index,
    schema: BuildSchema,
    writer: Arc<Mutex<IndexWriter>>,
    reader: IndexReader,
    default_fields: Vec<tantivy::schema::Field>,
}

impl TantivyBackend {
    /// Open (or create) the on-disk index described by `config`.
    pub fn open_or_create(config: TantivyConfig) -> Result<Self, BackendError> {
        let (index, schema) = open_build_index(&config.path)?;
        Self::from_index(index, schema, config.writer_budget())
    }

    /// Backend over a throwaway in-RAM index.
    pub fn in_ram() -> Result<Self, BackendError> {
        let schema = build_schema();
        let index = Index::create_in_ram(schema.schema().clone());
        Self::from_index(index, schema, DEFAULT_WRITER_MEMORY_MB * 1024 * 1024)
    }

    fn from_index(
        index: Index,
        schema: BuildSchema,
        writer_budget: usize,
    ) -> Result<Self, BackendError> {
        let writer = index.writer(writer_budget)?;
        // Rebuild workers commit in batches; reload only after our own commits.
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        debug!(writer_budget, "Opened index writer and reader");

        let default_fields = default_searchable_fields()
            .map(|d| schema.field(d.field))
            .collect();

        Ok(Self {
            index,
            schema,
            writer: Arc::new(Mutex::new(writer)),
            reader,
            default_fields,
        })
    }

    /// Parser over the default-searchable fields; every term must match.
    fn query_parser(&self) -> QueryParser {
        let mut parser = QueryParser::for_index(&self.index, self.default_fields.clone());
        parser.set_conjunction_by_default();
        parser
    }

    fn schema(&self) -> &BuildSchema {
        &self.schema
    }

    fn lock_writer(&self) -> Result<MutexGuard<'_, IndexWriter>, BackendError> {
        self.writer
            .lock()
            .map_err(|e| BackendError::Locked(e.to_string()))
    }

    /// Number of committed documents.
    pub fn num_docs(&self) -> u64 {
        let searcher = self.reader.searcher();
        searcher
            .segment_readers()
            .iter()
            .map(|r| r.num_docs() as u64)
            .sum()
    }

    fn tantivy_doc(&self, document: &Document, key: &DocumentKey) -> TantivyDocument {
        let schema = self.schema();
        let mut doc = TantivyDocument::default();

        for (field, value) in document.iter() {
            let handle = schema.field(field);
            if field.descriptor().numeric {
                if let Some(n) = value.as_u64() {
                    doc.add_u64(handle, n);
                }
            } else {
                doc.add_text(handle, value.to_string());
            }
        }

        doc.add_text(schema.key, key.to_string());
        doc.add_text(schema.project, &key.project);
        doc
    }

    fn document_from(&self, doc: &TantivyDocument) -> Document {
        let mut document = Document::new();
        for descriptor in all_fields() {
            let Some(value) = doc.get_first(self.schema().field(descriptor.field)) else {
                continue;
            };
            let value = if descriptor.numeric {
                value.as_u64().map(FieldValue::Number)
            } else {
                value.as_str().map(|s| FieldValue::Text(s.to_string()))
            };
            if let Some(value) = value {
                document.insert(descriptor.field, value);
            }
        }
        document
    }

    fn filter_query(&self, filter: &FieldFilter) -> Result<Box<dyn Query>, BackendError> {
        let schema = self.schema();
        if filter.field == Field::ProjectName {
            let term = Term::from_field_text(schema.project, &filter.value);
            return Ok(Box::new(TermQuery::new(term, IndexRecordOption::Basic)));
        }

        if filter.field.descriptor().numeric {
            let n: u64 = filter.value.trim().parse().map_err(|_| {
                BackendError::InvalidQuery(format!(
                    "field {} expects a number, got {:?}",
                    filter.field, filter.value
                ))
            })?;
            let term = Term::from_field_u64(schema.field(filter.field), n);
            return Ok(Box::new(TermQuery::new(term, IndexRecordOption::Basic)));
        }

        let escaped = filter.value.replace('\\', "\\\\").replace('"', "\\\"");
        let phrase = format!("{}:\"{}\"", filter.field.name(), escaped);
        Ok(self.query_parser().parse_query(&phrase)?)
    }

    fn build_query(&self, query: &SearchQuery) -> Result<Box<dyn Query>, BackendError> {
        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();

        if !query.terms.trim().is_empty() {
            clauses.push((Occur::Must, self.query_parser().parse_query(&query.terms)?));
        }
        for filter in &query.filters {
            clauses.push((Occur::Must, self.filter_query(filter)?));
        }

        if clauses.is_empty() {
            Ok(Box::new(AllQuery))
        } else {
            Ok(Box::new(BooleanQuery::new(clauses)))
        }
    }
}

impl SearchBackend for TantivyBackend {
    fn index(&self, document: &Document, overwrite: bool) -> Result<(), BackendError> {
        let key = document.key().ok_or_else(|| {
            BackendError::MissingKey(format!("{} field(s) present", document.len()))
        })?;
        let doc = self.tantivy_doc(document, &key);

        let writer = self.lock_writer()?;
        if !overwrite {
            writer.delete_term(Term::from_field_text(self.schema().key, &key.to_string()));
        }
        writer.add_document(doc)?;

        debug!(key = %key, overwrite, "Indexed build");
        Ok(())
    }

    fn remove(&self, project: &str, number: u64) -> Result<(), BackendError> {
        let key = DocumentKey::new(project, number);
        let writer = self.lock_writer()?;
        writer.delete_term(Term::from_field_text(self.schema().key, &key.to_string()));

        debug!(key = %key, "Removed build");
        Ok(())
    }

    fn query(&self, query: &SearchQuery) -> Result<SearchHits, BackendError> {
        if query.limit == 0 {
            return Ok(SearchHits::default());
        }

        let tantivy_query = self.build_query(query)?;
        let searcher = self.reader.searcher();
        // TopDocs sizes its heap from the limit; never ask for more than exist.
        let limit = query
            .limit
            .min(usize::try_from(searcher.num_docs()).unwrap_or(usize::MAX))
            .max(1);
        let top_docs = searcher.search(&tantivy_query, &TopDocs::with_limit(limit))?;

        let mut documents = Vec::with_capacity(top_docs.len());
        for (_score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher.doc(doc_address)?;
            documents.push(self.document_from(&doc));
        }

        debug!(
            terms = %query.terms,
            filters = query.filters.len(),
            hits = documents.len(),
            "Query complete"
        );
        Ok(SearchHits::new(documents))
    }

    fn clean(&self) -> Result<(), BackendError> {
        let mut writer = self.lock_writer()?;
        writer.delete_all_documents()?;
        let opstamp = writer.commit()?;
        drop(writer);
        self.reader.reload()?;

        info!(opstamp, "Cleaned index");
        Ok(())
    }

    fn commit(&self) -> Result<(), BackendError> {
        let mut writer = self.lock_writer()?;
        let opstamp = writer.commit()?;
        drop(writer);
        self.reader.reload()?;

        info!(opstamp, "Committed index changes");
        Ok(())
    }

    fn name(&self) -> &str {
        "tantivy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildsearch_types::{BuildParameter, StoredBuild};
    use tempfile::TempDir;

    fn sample_doc(project: &str, number: u64, log: &str) -> Document {
        let build = StoredBuild::new(project, number)
            .with_parameters(vec![BuildParameter::new("BRANCH", "main")])
            .with_log_text(log);
        Document::from_build(&build)
    }

    #[test]
    fn test_index_and_query_by_build() {
        let backend = TantivyBackend::in_ram().unwrap();
        backend.index(&sample_doc("app", 1, "first"), false).unwrap();
        backend.index(&sample_doc("app", 2, "second"), false).unwrap();
        backend.commit().unwrap();

        let hits = backend.query(&SearchQuery::for_build("app", 2)).unwrap();
        assert_eq!(hits.len(), 1);
        let doc = hits.first().unwrap();
        assert_eq!(doc.number(), Some(2));
        assert_eq!(doc.text(Field::Console), Some("second"));
        assert_eq!(doc.text(Field::BuildParameter), Some("main "));
        assert_eq!(doc.text(Field::BuildDisplayName), Some("#2"));
    }

    #[test]
    fn test_uncommitted_writes_are_invisible() {
        let backend = TantivyBackend::in_ram().unwrap();
        backend.index(&sample_doc("app", 1, "log"), false).unwrap();

        assert!(backend.query(&SearchQuery::all()).unwrap().is_empty());
        backend.commit().unwrap();
        assert_eq!(backend.query(&SearchQuery::all()).unwrap().len(), 1);
    }

    #[test]
    fn test_upsert_replaces_existing() {
        let backend = TantivyBackend::in_ram().unwrap();
        backend.index(&sample_doc("app", 1, "version one"), false).unwrap();
        backend.commit().unwrap();
        backend.index(&sample_doc("app", 1, "version two"), false).unwrap();
        backend.commit().unwrap();

        assert_eq!(backend.num_docs(), 1);
        let hits = backend.query(&SearchQuery::new("two")).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(backend.query(&SearchQuery::new("one")).unwrap().is_empty());
    }

    #[test]
    fn test_free_text_matches_default_fields() {
        let backend = TantivyBackend::in_ram().unwrap();
        backend.index(&sample_doc("app", 1, "BUILD FAILURE in module core"), false).unwrap();
        backend.index(&sample_doc("lib", 1, "all good"), false).unwrap();
        backend.commit().unwrap();

        let hits = backend.query(&SearchQuery::new("failure core")).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits.first().unwrap().text(Field::ProjectName), Some("app"));

        // Parameter values are searchable too.
        assert_eq!(backend.query(&SearchQuery::new("main")).unwrap().len(), 2);
    }

    #[test]
    fn test_project_filter_is_exact() {
        let backend = TantivyBackend::in_ram().unwrap();
        backend.index(&sample_doc("app", 1, "x"), false).unwrap();
        backend.index(&sample_doc("my-app", 1, "x"), false).unwrap();
        backend.commit().unwrap();

        let query = SearchQuery::all().with_filter(Field::ProjectName, "app");
        assert_eq!(backend.query(&query).unwrap().len(), 1);
    }

    #[test]
    fn test_numeric_filter_rejects_text() {
        let backend = TantivyBackend::in_ram().unwrap();
        let query = SearchQuery::all().with_filter(Field::BuildNumber, "latest");
        assert!(matches!(
            backend.query(&query),
            Err(BackendError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_remove() {
        let backend = TantivyBackend::in_ram().unwrap();
        backend.index(&sample_doc("app", 1, "x"), false).unwrap();
        backend.index(&sample_doc("app", 2, "x"), false).unwrap();
        backend.commit().unwrap();

        backend.remove("app", 1).unwrap();
        backend.commit().unwrap();

        assert_eq!(backend.num_docs(), 1);
        assert!(backend.query(&SearchQuery::for_build("app", 1)).unwrap().is_empty());
    }

    #[test]
    fn test_clean_empty_and_populated() {
        let backend = TantivyBackend::in_ram().unwrap();
        backend.clean().unwrap();

        backend.index(&sample_doc("app", 1, "x"), true).unwrap();
        backend.commit().unwrap();
        assert_eq!(backend.num_docs(), 1);

        backend.clean().unwrap();
        assert_eq!(backend.num_docs(), 0);
    }

    #[test]
    fn test_document_without_key_is_rejected() {
        let backend = TantivyBackend::in_ram().unwrap();
        let doc = Document::new().with(Field::Console, FieldValue::Text("orphan".into()));
        assert!(matches!(
            backend.index(&doc, false),
            Err(BackendError::MissingKey(_))
        ));
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let backend =
                TantivyBackend::open_or_create(TantivyConfig::new(temp_dir.path())).unwrap();
            backend.index(&sample_doc("app", 5, "kept"), false).unwrap();
            backend.commit().unwrap();
        }

        let backend =
            TantivyBackend::open_or_create(TantivyConfig::new(temp_dir.path())).unwrap();
        let hits = backend.query(&SearchQuery::new("kept")).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits.first().unwrap().number(), Some(5));
    }

    #[test]
    fn test_huge_limit_returns_all_hits() {
        let backend = TantivyBackend::in_ram().unwrap();
        backend.index(&sample_doc("app", 1, "x"), false).unwrap();
        backend.index(&sample_doc("app", 2, "x"), false).unwrap();
        backend.commit().unwrap();

        let hits = backend.query(&SearchQuery::all().with_limit(usize::MAX)).unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_huge_limit_on_empty_index() {
        let backend = TantivyBackend::in_ram().unwrap();
        let hits = backend.query(&SearchQuery::new("x").with_limit(usize::MAX)).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_creates_index_directory() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("index");
        let config = TantivyConfig::new(&path).with_writer_memory_mb(20);
        assert_eq!(config.writer_memory_mb, 20);

        let backend = TantivyBackend::open_or_create(config).unwrap();
        assert!(path.join("meta.json").exists());
        assert_eq!(backend.num_docs(), 0);
    }
}
