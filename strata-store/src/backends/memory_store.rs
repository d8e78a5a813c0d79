//! In-memory document store: the reference backend used by tests and
//! ephemeral deployments. Enforces declared unique indexes on insert.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use strata_core::errors::BackendError;
use strata_core::traits::{
    Document, DocumentCollection, DocumentDatabase, DocumentStore, Filter, FindQuery,
};

use super::matcher;

/// Process-local document store. Databases and collections are created on
/// first access.
#[derive(Default)]
pub struct MemoryDocumentStore {
    databases: Mutex<BTreeMap<String, Arc<MemoryDatabase>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn database(&self, name: &str) -> Arc<dyn DocumentDatabase> {
        let mut databases = lock(&self.databases);
        databases
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryDatabase::default()))
            .clone()
    }
}

#[derive(Default)]
struct MemoryDatabase {
    collections: Mutex<BTreeMap<String, Arc<MemoryCollection>>>,
}

impl DocumentDatabase for MemoryDatabase {
    fn collection(&self, name: &str) -> Arc<dyn DocumentCollection> {
        let mut collections = lock(&self.collections);
        collections
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(MemoryCollection {
                    name: name.to_string(),
                    state: Mutex::new(CollectionState::default()),
                })
            })
            .clone()
    }
}

struct MemoryCollection {
    name: String,
    state: Mutex<CollectionState>,
}

#[derive(Default)]
struct CollectionState {
    documents: Vec<Document>,
    unique_indexes: Vec<Vec<String>>,
    next_id: u64,
}

impl CollectionState {
    fn index_conflict(&self, candidate: &Document) -> Option<&[String]> {
        for fields in &self.unique_indexes {
            let collides = self.documents.iter().any(|existing| {
                fields.iter().all(|field| {
                    existing.get(field).unwrap_or(&Value::Null)
                        == candidate.get(field).unwrap_or(&Value::Null)
                })
            });
            if collides {
                return Some(fields);
            }
        }
        None
    }
}

impl DocumentCollection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn ensure_unique_index(&self, fields: &[String]) -> Result<(), BackendError> {
        let mut state = lock(&self.state);
        let fields = fields.to_vec();
        if !state.unique_indexes.contains(&fields) {
            state.unique_indexes.push(fields);
        }
        Ok(())
    }

    fn insert_one(&self, mut document: Document) -> Result<(), BackendError> {
        let mut state = lock(&self.state);
        if let Some(fields) = state.index_conflict(&document) {
            return Err(BackendError::new(format!(
                "unique index violation on ({}) in collection '{}'",
                fields.join(", "),
                self.name
            )));
        }
        let id = state.next_id;
        state.next_id += 1;
        document.insert(
            strata_core::constants::INTERNAL_ID.to_string(),
            Value::from(id),
        );
        state.documents.push(document);
        Ok(())
    }

    fn find_one(&self, filter: &Filter) -> Result<Option<Document>, BackendError> {
        let state = lock(&self.state);
        let query = FindQuery::default();
        Ok(state
            .documents
            .iter()
            .find(|doc| matcher::matches(doc, filter))
            .cloned()
            .map(|doc| matcher::project(doc, &query)))
    }

    fn find(&self, query: &FindQuery) -> Result<Vec<Document>, BackendError> {
        let state = lock(&self.state);
        Ok(matcher::run_query(state.documents.iter().cloned(), query))
    }

    fn update_one(&self, filter: &Filter, set: &Document) -> Result<u64, BackendError> {
        let mut state = lock(&self.state);
        let target = state
            .documents
            .iter_mut()
            .find(|doc| matcher::matches(doc, filter));
        match target {
            None => Ok(0),
            Some(doc) => {
                for (key, value) in set {
                    doc.insert(key.clone(), value.clone());
                }
                Ok(1)
            }
        }
    }

    fn delete_many(&self, filter: &Filter) -> Result<u64, BackendError> {
        let mut state = lock(&self.state);
        let before = state.documents.len();
        state.documents.retain(|doc| !matcher::matches(doc, filter));
        Ok((before - state.documents.len()) as u64)
    }

    fn count(&self, filter: &Filter) -> Result<u64, BackendError> {
        let state = lock(&self.state);
        Ok(state
            .documents
            .iter()
            .filter(|doc| matcher::matches(doc, filter))
            .count() as u64)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
