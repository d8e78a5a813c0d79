mod adapter;
mod document_store;
mod filesystem;
mod schema_resolver;

pub use adapter::DataFileAdapter;
pub use document_store::{
    Document, DocumentCollection, DocumentDatabase, DocumentStore, Filter, FindQuery, SortOrder,
};
pub use filesystem::FileSystem;
pub use schema_resolver::SchemaResolver;
