//! In-memory backend.
//!
//! Keeps committed documents in a map and buffers writes until commit(),
//! mirroring the visibility rules of the Tantivy backend. Every call is also
//! appended to a journal so tests can check operation ordering.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use buildsearch_types::{default_searchable_fields, Document, DocumentKey, Field};

use crate::backend::{ensure_schema_complete, FieldFilter, SearchBackend, SearchHits, SearchQuery};
use crate::error::BackendError;

/// How a field's values are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Matcher {
    /// Case-insensitive token match
    Tokens,
    /// Numeric equality
    Number,
    /// Exact string equality
    Exact,
}

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendOp {
    Index(DocumentKey),
    Remove(DocumentKey),
    Clean,
    Commit,
}

#[derive(Debug)]
enum PendingWrite {
    Upsert(DocumentKey, Document),
    Remove(DocumentKey),
}

#[derive(Debug, Default)]
struct MemoryState {
    committed: BTreeMap<DocumentKey, Document>,
    pending: Vec<PendingWrite>,
    journal: Vec<BackendOp>,
}

/// Process-local backend for tests and embedding.
#[derive(Debug)]
pub struct MemoryBackend {
    state: RwLock<MemoryState>,
    matchers: HashMap<Field, Matcher>,
}

impl MemoryBackend {
    pub fn new() -> Result<Self, BackendError> {
        let matchers: HashMap<Field, Matcher> = HashMap::from([
            (Field::ProjectName, Matcher::Exact),
            (Field::BuildNumber, Matcher::Number),
            (Field::BuildDisplayName, Matcher::Tokens),
            (Field::BuildParameter, Matcher::Tokens),
            (Field::Console, Matcher::Tokens),
        ]);
        Self::with_matchers(matchers)
    }

    fn with_matchers(matchers: HashMap<Field, Matcher>) -> Result<Self, BackendError> {
        ensure_schema_complete("memory", |f| matchers.contains_key(&f))?;
        Ok(Self {
            state: RwLock::new(MemoryState::default()),
            matchers,
        })
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryState>, BackendError> {
        self.state
            .read()
            .map_err(|e| BackendError::Locked(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>, BackendError> {
        self.state
            .write()
            .map_err(|e| BackendError::Locked(e.to_string()))
    }

    /// Number of committed documents.
    pub fn len(&self) -> usize {
        self.read().map(|s| s.committed.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of writes waiting for commit.
    pub fn pending(&self) -> usize {
        self.read().map(|s| s.pending.len()).unwrap_or(0)
    }

    /// Every call made so far, in order.
    pub fn journal(&self) -> Vec<BackendOp> {
        self.read().map(|s| s.journal.clone()).unwrap_or_default()
    }

    fn matches_filter(&self, document: &Document, filter: &FieldFilter) -> bool {
        let Some(value) = document.get(filter.field) else {
            return false;
        };
        match self.matchers[&filter.field] {
            Matcher::Exact => value.to_string() == filter.value,
            Matcher::Number => {
                value.as_u64().is_some() && value.as_u64() == filter.value.trim().parse().ok()
            }
            Matcher::Tokens => {
                let haystack = tokenize(&value.to_string());
                let needle = tokenize(&filter.value);
                !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle.as_slice())
            }
        }
    }

    fn matches_terms(document: &Document, terms: &[String]) -> bool {
        let searchable: Vec<String> = default_searchable_fields()
            .filter_map(|d| document.get(d.field))
            .flat_map(|v| tokenize(&v.to_string()))
            .collect();
        terms.iter().all(|t| searchable.contains(t))
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

impl SearchBackend for MemoryBackend {
    fn index(&self, document: &Document, overwrite: bool) -> Result<(), BackendError> {
        let key = document.key().ok_or_else(|| {
            BackendError::MissingKey(format!("{} field(s) present", document.len()))
        })?;

        let mut state = self.write()?;
        state.journal.push(BackendOp::Index(key.clone()));
        state
            .pending
            .push(PendingWrite::Upsert(key.clone(), document.clone()));

        debug!(key = %key, overwrite, "Buffered build");
        Ok(())
    }

    fn remove(&self, project: &str, number: u64) -> Result<(), BackendError> {
        let key = DocumentKey::new(project, number);
        let mut state = self.write()?;
        state.journal.push(BackendOp::Remove(key.clone()));
        state.pending.push(PendingWrite::Remove(key));
        Ok(())
    }

    fn query(&self, query: &SearchQuery) -> Result<SearchHits, BackendError> {
        for filter in &query.filters {
            if filter.field.descriptor().numeric && filter.value.trim().parse::<u64>().is_err() {
                return Err(BackendError::InvalidQuery(format!(
                    "field {} expects a number, got {:?}",
                    filter.field, filter.value
                )));
            }
        }

        let terms = tokenize(&query.terms);
        let state = self.read()?;
        let documents = state
            .committed
            .values()
            .filter(|doc| Self::matches_terms(doc, &terms))
            .filter(|doc| query.filters.iter().all(|f| self.matches_filter(doc, f)))
            .take(query.limit)
            .cloned()
            .collect();

        Ok(SearchHits::new(documents))
    }

    fn clean(&self) -> Result<(), BackendError> {
        let mut state = self.write()?;
        state.journal.push(BackendOp::Clean);
        state.committed.clear();
        state.pending.clear();
        debug!("Cleaned memory index");
        Ok(())
    }

    fn commit(&self) -> Result<(), BackendError> {
        let mut state = self.write()?;
        state.journal.push(BackendOp::Commit);
        let pending = std::mem::take(&mut state.pending);
        let applied = pending.len();
        for write in pending {
            match write {
                PendingWrite::Upsert(key, doc) => {
                    state.committed.insert(key, doc);
                }
                PendingWrite::Remove(key) => {
                    state.committed.remove(&key);
                }
            }
        }
        debug!(applied, total = state.committed.len(), "Committed memory index");
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
