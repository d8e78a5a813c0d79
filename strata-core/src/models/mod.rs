mod data_object;
mod domain_model;
mod file_format;
mod history;
mod record;
mod version;

pub use data_object::{Checkpoint, DataArray, DataFileId, DataObject, DataObjectKind};
pub use domain_model::{DomainModel, SchemaType};
pub use file_format::FileFormat;
pub use history::{OperationEntry, OperationKind};
pub use record::Record;
pub use version::VersionTimestamp;
