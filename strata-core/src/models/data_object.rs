//! Data objects: records, self-describing arrays and opaque checkpoints.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::{DATA_NAME, SCHEMA_REF, VERSION_TIMESTAMP};
use crate::models::{Record, VersionTimestamp};

/// Discriminant an adapter declares for the payloads it can handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataObjectKind {
    Record,
    Array,
    Blob,
}

impl std::fmt::Display for DataObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DataObjectKind::Record => "record",
            DataObjectKind::Array => "array",
            DataObjectKind::Blob => "blob",
        };
        f.write_str(s)
    }
}

/// Identity of a data file: `(schema_ref, data_name, version_timestamp)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataFileId {
    pub schema_ref: String,
    pub data_name: String,
    pub version_timestamp: VersionTimestamp,
}

impl std::fmt::Display for DataFileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}@{}",
            self.schema_ref, self.data_name, self.version_timestamp
        )
    }
}

/// A self-describing multi-dimensional array with named dimensions, optional
/// per-dimension coordinates, and a free-form attribute map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataArray {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub dims: Vec<String>,
    pub shape: Vec<usize>,
    #[serde(default)]
    pub coords: BTreeMap<String, Vec<f64>>,
    /// Row-major values; length equals the product of `shape`.
    pub values: Vec<f64>,
    #[serde(default)]
    pub attrs: Map<String, Value>,
}

impl DataArray {
    /// Build an array, checking shape/value-length coherence.
    pub fn new(
        name: Option<String>,
        dims: Vec<String>,
        shape: Vec<usize>,
        values: Vec<f64>,
    ) -> Option<Self> {
        let expected: usize = shape.iter().product();
        if dims.len() != shape.len() || values.len() != expected {
            return None;
        }
        Some(DataArray {
            name,
            dims,
            shape,
            coords: BTreeMap::new(),
            values,
            attrs: Map::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// An opaque payload, e.g. a serialized model checkpoint. Unlike arrays the
/// bytes are mutable between versions.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub attrs: Map<String, Value>,
    pub bytes: Vec<u8>,
}

/// Tagged union distinguishing record-only objects from payload-carrying
/// ones. A payload-carrying object's attribute map doubles as its record.
#[derive(Debug, Clone, PartialEq)]
pub enum DataObject {
    Record(Record),
    Array(DataArray),
    Blob(Checkpoint),
}

impl DataObject {
    pub fn kind(&self) -> DataObjectKind {
        match self {
            DataObject::Record(_) => DataObjectKind::Record,
            DataObject::Array(_) => DataObjectKind::Array,
            DataObject::Blob(_) => DataObjectKind::Blob,
        }
    }

    pub fn has_payload(&self) -> bool {
        !matches!(self, DataObject::Record(_))
    }

    /// The attribute map: the record fields for record-only objects, the
    /// attrs of the payload otherwise.
    pub fn attrs(&self) -> &Map<String, Value> {
        match self {
            DataObject::Record(record) => record.fields(),
            DataObject::Array(array) => &array.attrs,
            DataObject::Blob(blob) => &blob.attrs,
        }
    }

    pub fn attrs_mut(&mut self) -> &mut Map<String, Value> {
        match self {
            DataObject::Record(record) => record.fields_mut(),
            DataObject::Array(array) => &mut array.attrs,
            DataObject::Blob(blob) => &mut blob.attrs,
        }
    }

    /// Identity read from the attribute map, if complete.
    pub fn id(&self) -> Option<DataFileId> {
        let attrs = self.attrs();
        Some(DataFileId {
            schema_ref: attrs.get(SCHEMA_REF)?.as_str()?.to_string(),
            data_name: attrs.get(DATA_NAME)?.as_str()?.to_string(),
            version_timestamp: VersionTimestamp::from_value(attrs.get(VERSION_TIMESTAMP))?,
        })
    }
}

impl From<Record> for DataObject {
    fn from(record: Record) -> Self {
        DataObject::Record(record)
    }
}

impl From<DataArray> for DataObject {
    fn from(array: DataArray) -> Self {
        DataObject::Array(array)
    }
}

impl From<Checkpoint> for DataObject {
    fn from(blob: Checkpoint) -> Self {
        DataObject::Blob(blob)
    }
}
