//! File-format identifiers for data-file adapters.

use serde::{Deserialize, Serialize};

/// Identifies a data-file format. The two built-in formats cover the
/// self-describing single-file array container and the chunked array
/// directory; additional formats may be registered at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileFormat(String);

impl FileFormat {
    /// Self-describing single-file array container (extension `.nc`).
    pub const ARRAY_BUNDLE: &'static str = "array-bundle";
    /// Chunked array directory layout (no extension).
    pub const CHUNKED_ARRAY: &'static str = "chunked-array";

    pub fn new(name: impl Into<String>) -> Self {
        FileFormat(name.into())
    }

    pub fn array_bundle() -> Self {
        FileFormat(Self::ARRAY_BUNDLE.to_string())
    }

    pub fn chunked_array() -> Self {
        FileFormat(Self::CHUNKED_ARRAY.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FileFormat {
    fn from(name: &str) -> Self {
        FileFormat(name.to_string())
    }
}
