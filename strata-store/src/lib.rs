//! # strata-store
//!
//! Transactional, schema-validated, versioned object store.
//!
//! Records live in a document store, array payloads live on a filesystem
//! behind pluggable file-format adapters, and transient handles live in a
//! process-local map. The three are coordinated by repositories inside a
//! unit of work that rolls back by replaying per-repository operation
//! histories in reverse.

pub mod adapters;
pub mod backends;
pub mod dao;
pub mod provider;
pub mod repo;
pub mod uow;

pub use adapters::{AdapterRegistry, ArrayBundleAdapter, ChunkedArrayAdapter};
pub use dao::{DocumentDao, FileSystemDao, InMemoryObjectDao, ObjectHandle};
pub use provider::{MemoryObjectStore, UnitOfWorkProvider};
pub use repo::{DataRepository, DomainModelRepository, FindOptions, InMemoryObjectRepository};
pub use uow::{OperationLedger, UnitOfWork};
