//! The file-format adapter contract.

use crate::errors::FileDaoError;
use crate::models::{DataFileId, DataObject, DataObjectKind, FileFormat};
use crate::traits::FileSystem;

/// Reads, writes and identifies one data-file format on a filesystem.
///
/// The filesystem DAO is polymorphic over this capability set;
/// `data_object_kind` is the discriminant it checks before dispatching a
/// payload to an adapter.
pub trait DataFileAdapter: Send + Sync {
    /// Extension including the leading dot, or `""` for directory layouts.
    fn file_extension(&self) -> &str;

    fn file_format(&self) -> FileFormat;

    /// The payload class this adapter handles.
    fn data_object_kind(&self) -> DataObjectKind;

    /// Identity read from a data object, if its attributes carry one.
    fn id_of(&self, object: &DataObject) -> Option<DataFileId> {
        object.id()
    }

    fn read_file(&self, fs: &dyn FileSystem, path: &str) -> Result<DataObject, FileDaoError>;

    fn write_file(
        &self,
        fs: &dyn FileSystem,
        path: &str,
        object: &DataObject,
    ) -> Result<(), FileDaoError>;
}
