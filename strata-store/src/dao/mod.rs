//! Data access objects for the three collections: documents, data files and
//! in-memory handles.

pub mod document;
pub mod filesystem;
pub mod in_memory;

pub use document::DocumentDao;
pub use filesystem::{FileSystemDao, TombstonedFile};
pub use in_memory::{InMemoryObjectDao, ObjectHandle, RemovedEntry};
