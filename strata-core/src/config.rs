//! Store configuration.

use serde::{Deserialize, Serialize};

use crate::errors::StrataError;
use crate::models::FileFormat;

/// Configuration consumed by the unit-of-work provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Adapter used when a data-file operation names none.
    pub default_file_type: FileFormat,
    /// When a microsecond-precision file lookup misses, retry at millisecond
    /// precision before giving up. Off unless explicitly enabled.
    pub millisecond_fallback: bool,
    /// Optional path prefix prepended to every project directory.
    pub root_prefix: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            default_file_type: FileFormat::array_bundle(),
            millisecond_fallback: false,
            root_prefix: None,
        }
    }
}

impl StoreConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, StrataError> {
        toml::from_str(raw).map_err(|e| StrataError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_select_the_array_bundle_format() {
        let config = StoreConfig::default();
        assert_eq!(config.default_file_type.as_str(), "array-bundle");
        assert!(!config.millisecond_fallback);
        assert!(config.root_prefix.is_none());
    }

    #[test]
    fn loads_from_toml_with_partial_keys() {
        let config = StoreConfig::from_toml_str(
            "default_file_type = \"chunked-array\"\nmillisecond_fallback = true\n",
        )
        .unwrap();
        assert_eq!(config.default_file_type.as_str(), "chunked-array");
        assert!(config.millisecond_fallback);
        assert!(config.root_prefix.is_none());
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(StoreConfig::from_toml_str("default_file_type = [").is_err());
    }
}
