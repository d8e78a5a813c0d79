//! # strata-core
//!
//! Foundation crate for the strata object store.
//! Defines all types, traits, errors, config, constants and time utilities.
//! Every other crate in the workspace depends on this.

pub mod config;
pub mod constants;
pub mod errors;
pub mod models;
pub mod time;
pub mod traits;

// Re-export the most commonly used types at the crate root.
pub use config::StoreConfig;
pub use errors::{ErrorKind, StrataError, StrataResult};
pub use models::{
    DataArray, DataObject, DataObjectKind, DomainModel, FileFormat, OperationEntry, OperationKind,
    Record, SchemaType, VersionTimestamp,
};
