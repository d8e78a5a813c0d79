//! Self-describing single-file array container (extension `.nc`).
//!
//! Layout: 8-byte magic, little-endian u32 header length, JSON header
//! (name, dims, coords, shape, storage-encoded attrs, payload checksum),
//! then the row-major little-endian f64 payload.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use strata_core::errors::FileDaoError;
use strata_core::models::{DataArray, DataObject, DataObjectKind, FileFormat};
use strata_core::traits::{DataFileAdapter, FileSystem};

use super::attrs::{decode_attrs, encode_attrs};

const MAGIC: &[u8; 8] = b"STRARR01";

#[derive(Serialize, Deserialize)]
struct BundleHeader {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    dims: Vec<String>,
    shape: Vec<usize>,
    coords: std::collections::BTreeMap<String, Vec<f64>>,
    attrs: Map<String, Value>,
    checksum: String,
}

/// Adapter for reading and writing `DataArray`s as array bundles.
#[derive(Debug, Default)]
pub struct ArrayBundleAdapter;

impl ArrayBundleAdapter {
    pub fn new() -> Self {
        ArrayBundleAdapter
    }
}

impl DataFileAdapter for ArrayBundleAdapter {
    fn file_extension(&self) -> &str {
        ".nc"
    }

    fn file_format(&self) -> FileFormat {
        FileFormat::array_bundle()
    }

    fn data_object_kind(&self) -> DataObjectKind {
        DataObjectKind::Array
    }

    fn read_file(&self, fs: &dyn FileSystem, path: &str) -> Result<DataObject, FileDaoError> {
        let bytes = fs.read(path).map_err(|e| FileDaoError::io("read", path, e))?;
        if bytes.len() < MAGIC.len() + 4 || &bytes[..MAGIC.len()] != MAGIC {
            return Err(corrupt(path, "bad magic"));
        }
        let header_len = u32::from_le_bytes(
            bytes[MAGIC.len()..MAGIC.len() + 4]
                .try_into()
                .map_err(|_| corrupt(path, "truncated header length"))?,
        ) as usize;
        let header_start = MAGIC.len() + 4;
        let payload_start = header_start + header_len;
        if bytes.len() < payload_start {
            return Err(corrupt(path, "truncated header"));
        }

        let header: BundleHeader = serde_json::from_slice(&bytes[header_start..payload_start])
            .map_err(|e| corrupt(path, &format!("unreadable header: {e}")))?;

        let payload = &bytes[payload_start..];
        if payload.len() % 8 != 0 {
            return Err(corrupt(path, "payload is not a whole number of f64s"));
        }
        if blake3::hash(payload).to_hex().to_string() != header.checksum {
            return Err(corrupt(path, "payload checksum mismatch"));
        }

        let values: Vec<f64> = payload
            .chunks_exact(8)
            .map(|chunk| f64::from_le_bytes(chunk.try_into().unwrap_or_default()))
            .collect();
        let expected: usize = header.shape.iter().product();
        if values.len() != expected {
            return Err(corrupt(path, "payload length does not match shape"));
        }

        let array = DataArray {
            name: header.name,
            dims: header.dims,
            shape: header.shape,
            coords: header.coords,
            values,
            attrs: decode_attrs(&header.attrs),
        };
        Ok(DataObject::Array(array))
    }

    fn write_file(
        &self,
        fs: &dyn FileSystem,
        path: &str,
        object: &DataObject,
    ) -> Result<(), FileDaoError> {
        let DataObject::Array(array) = object else {
            return Err(FileDaoError::ArgumentType {
                argument: "data_object".to_string(),
                expected: "an array".to_string(),
                actual: object.kind().to_string(),
            });
        };

        let mut payload = Vec::with_capacity(array.values.len() * 8);
        for value in &array.values {
            payload.extend_from_slice(&value.to_le_bytes());
        }

        let header = BundleHeader {
            name: array.name.clone().or_else(|| default_name(&array.attrs)),
            dims: array.dims.clone(),
            shape: array.shape.clone(),
            coords: array.coords.clone(),
            attrs: encode_attrs(&array.attrs),
            checksum: blake3::hash(&payload).to_hex().to_string(),
        };
        let header_bytes = serde_json::to_vec(&header)
            .map_err(|e| corrupt(path, &format!("unwritable header: {e}")))?;

        let mut bytes = Vec::with_capacity(MAGIC.len() + 4 + header_bytes.len() + payload.len());
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&header_bytes);
        bytes.extend_from_slice(&payload);

        fs.write_new(path, &bytes)
            .map_err(|e| FileDaoError::io("write", path, e))
    }
}

/// Fall back to `{schema_ref}__{data_name}` when the array carries no name.
fn default_name(attrs: &Map<String, Value>) -> Option<String> {
    let schema_ref = attrs.get("schema_ref")?.as_str()?;
    let data_name = attrs.get("data_name")?.as_str()?;
    Some(format!("{schema_ref}__{data_name}"))
}

fn corrupt(path: &str, detail: &str) -> FileDaoError {
    FileDaoError::Corrupt {
        path: path.to_string(),
        detail: detail.to_string(),
    }
}
