//! Chunked array directory layout (no extension).
//!
//! A data object is a directory holding `meta.json` (dims, coords, shape,
//! chunk size, per-chunk checksums), `attrs.json` (storage-encoded
//! attributes) and fixed-size row-major chunk files `c0..cN`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use strata_core::errors::FileDaoError;
use strata_core::models::{DataArray, DataObject, DataObjectKind, FileFormat};
use strata_core::traits::{DataFileAdapter, FileSystem};

use super::attrs::{decode_attrs, encode_attrs};

/// Values per chunk file.
const DEFAULT_CHUNK_LEN: usize = 4096;

#[derive(Serialize, Deserialize)]
struct ChunkedMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    dims: Vec<String>,
    shape: Vec<usize>,
    coords: std::collections::BTreeMap<String, Vec<f64>>,
    chunk_len: usize,
    checksums: Vec<String>,
}

/// Adapter for reading and writing `DataArray`s as chunked directories.
#[derive(Debug)]
pub struct ChunkedArrayAdapter {
    chunk_len: usize,
}

impl ChunkedArrayAdapter {
    pub fn new() -> Self {
        ChunkedArrayAdapter {
            chunk_len: DEFAULT_CHUNK_LEN,
        }
    }

    pub fn with_chunk_len(chunk_len: usize) -> Self {
        ChunkedArrayAdapter {
            chunk_len: chunk_len.max(1),
        }
    }
}

impl Default for ChunkedArrayAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl DataFileAdapter for ChunkedArrayAdapter {
    fn file_extension(&self) -> &str {
        ""
    }

    fn file_format(&self) -> FileFormat {
        FileFormat::chunked_array()
    }

    fn data_object_kind(&self) -> DataObjectKind {
        DataObjectKind::Array
    }

    fn read_file(&self, fs: &dyn FileSystem, path: &str) -> Result<DataObject, FileDaoError> {
        let meta_path = format!("{path}/meta.json");
        let meta_bytes = fs
            .read(&meta_path)
            .map_err(|e| FileDaoError::io("read", &meta_path, e))?;
        let meta: ChunkedMeta = serde_json::from_slice(&meta_bytes)
            .map_err(|e| corrupt(path, &format!("unreadable meta.json: {e}")))?;

        let attrs_path = format!("{path}/attrs.json");
        let attrs_bytes = fs
            .read(&attrs_path)
            .map_err(|e| FileDaoError::io("read", &attrs_path, e))?;
        let stored_attrs: Map<String, Value> = serde_json::from_slice(&attrs_bytes)
            .map_err(|e| corrupt(path, &format!("unreadable attrs.json: {e}")))?;

        let expected: usize = meta.shape.iter().product();
        let mut values = Vec::with_capacity(expected);
        for (index, checksum) in meta.checksums.iter().enumerate() {
            let chunk_path = format!("{path}/c{index}");
            let chunk = fs
                .read(&chunk_path)
                .map_err(|e| FileDaoError::io("read", &chunk_path, e))?;
            if blake3::hash(&chunk).to_hex().to_string() != *checksum {
                return Err(corrupt(path, &format!("chunk c{index} checksum mismatch")));
            }
            if chunk.len() % 8 != 0 {
                return Err(corrupt(path, &format!("chunk c{index} is not whole f64s")));
            }
            values.extend(
                chunk
                    .chunks_exact(8)
                    .map(|b| f64::from_le_bytes(b.try_into().unwrap_or_default())),
            );
        }
        if values.len() != expected {
            return Err(corrupt(path, "chunk payload does not match shape"));
        }

        let array = DataArray {
            name: meta.name,
            dims: meta.dims,
            shape: meta.shape,
            coords: meta.coords,
            values,
            attrs: decode_attrs(&stored_attrs),
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

        fs.create_dir_all(path)
            .map_err(|e| FileDaoError::io("create_dir", path, e))?;

        let mut checksums = Vec::new();
        for (index, chunk_values) in array.values.chunks(self.chunk_len).enumerate() {
            let mut chunk = Vec::with_capacity(chunk_values.len() * 8);
            for value in chunk_values {
                chunk.extend_from_slice(&value.to_le_bytes());
            }
            checksums.push(blake3::hash(&chunk).to_hex().to_string());
            let chunk_path = format!("{path}/c{index}");
            fs.write_new(&chunk_path, &chunk)
                .map_err(|e| FileDaoError::io("write", &chunk_path, e))?;
        }

        let meta = ChunkedMeta {
            name: array.name.clone(),
            dims: array.dims.clone(),
            shape: array.shape.clone(),
            coords: array.coords.clone(),
            chunk_len: self.chunk_len,
            checksums,
        };
        let meta_path = format!("{path}/meta.json");
        let meta_bytes = serde_json::to_vec(&meta)
            .map_err(|e| corrupt(path, &format!("unwritable meta.json: {e}")))?;
        fs.write_new(&meta_path, &meta_bytes)
            .map_err(|e| FileDaoError::io("write", &meta_path, e))?;

        let attrs_path = format!("{path}/attrs.json");
        let attrs_bytes = serde_json::to_vec(&Value::Object(encode_attrs(&array.attrs)))
            .map_err(|e| corrupt(path, &format!("unwritable attrs.json: {e}")))?;
        fs.write_new(&attrs_path, &attrs_bytes)
            .map_err(|e| FileDaoError::io("write", &attrs_path, e))
    }
}

fn corrupt(path: &str, detail: &str) -> FileDaoError {
    FileDaoError::Corrupt {
        path: path.to_string(),
        detail: detail.to_string(),
    }
}
