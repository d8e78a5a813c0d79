//! The document-database contract the store consumes.
//!
//! The concrete backend is an external collaborator; the store only relies on
//! this interface. Filters are JSON objects mapping field names to either a
//! literal (equality) or an operator object using `$gt`, `$gte`, `$lt`,
//! `$lte`, `$ne`, `$in` and `$exists`.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::errors::BackendError;

/// A stored document.
pub type Document = Map<String, Value>;
/// A query filter.
pub type Filter = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// A find request: filter plus optional projection, sort and limit.
#[derive(Debug, Clone, Default)]
pub struct FindQuery {
    pub filter: Filter,
    /// Inclusion projection: only the named fields are returned. Backends
    /// always strip the internal `_id` key, projected or not.
    pub projection: Option<Vec<String>>,
    /// Applied in order; later fields break ties of earlier ones.
    pub sort: Vec<(String, SortOrder)>,
    pub limit: Option<usize>,
}

impl FindQuery {
    pub fn with_filter(filter: Filter) -> Self {
        FindQuery {
            filter,
            ..FindQuery::default()
        }
    }
}

/// One named collection of documents.
pub trait DocumentCollection: Send + Sync {
    fn name(&self) -> &str;

    /// Declare a unique index over the given fields. Backends enforce it on
    /// insert; calling again with the same fields is a no-op.
    fn ensure_unique_index(&self, fields: &[String]) -> Result<(), BackendError>;

    fn insert_one(&self, document: Document) -> Result<(), BackendError>;

    fn find_one(&self, filter: &Filter) -> Result<Option<Document>, BackendError>;

    fn find(&self, query: &FindQuery) -> Result<Vec<Document>, BackendError>;

    /// Set the given fields on the first matching document.
    /// Returns the number of documents modified (0 or 1).
    fn update_one(&self, filter: &Filter, set: &Document) -> Result<u64, BackendError>;

    /// Hard-delete all matching documents; returns the count.
    fn delete_many(&self, filter: &Filter) -> Result<u64, BackendError>;

    fn count(&self, filter: &Filter) -> Result<u64, BackendError>;
}

/// A named database: a namespace of collections.
pub trait DocumentDatabase: Send + Sync {
    fn collection(&self, name: &str) -> Arc<dyn DocumentCollection>;
}

/// The client handle: a namespace of databases.
pub trait DocumentStore: Send + Sync {
    fn database(&self, name: &str) -> Arc<dyn DocumentDatabase>;
}
