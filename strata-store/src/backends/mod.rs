//! Embedded backends implementing the document-store and filesystem
//! contracts, plus the shared filter evaluator.

pub mod local_fs;
pub mod matcher;
pub mod memory_fs;
pub mod memory_store;
pub mod scoped;
pub mod sqlite_store;

pub use local_fs::LocalFileSystem;
pub use memory_fs::MemoryFileSystem;
pub use memory_store::MemoryDocumentStore;
pub use scoped::ScopedFileSystem;
pub use sqlite_store::SqliteDocumentStore;
