//! File-format adapters and their registry.

pub mod attrs;
mod array_bundle;
mod chunked;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use strata_core::errors::FileDaoError;
use strata_core::models::FileFormat;
use strata_core::traits::DataFileAdapter;

pub use array_bundle::ArrayBundleAdapter;
pub use chunked::ChunkedArrayAdapter;

/// Runtime registry mapping format ids to adapters. Pre-seeded with the two
/// built-in formats; additional adapters may be registered.
pub struct AdapterRegistry {
    adapters: RwLock<HashMap<FileFormat, Arc<dyn DataFileAdapter>>>,
}

impl AdapterRegistry {
    /// Registry holding the array-bundle and chunked-array adapters.
    pub fn with_builtins() -> Self {
        let registry = AdapterRegistry {
            adapters: RwLock::new(HashMap::new()),
        };
        registry.register(Arc::new(ArrayBundleAdapter::new()));
        registry.register(Arc::new(ChunkedArrayAdapter::new()));
        registry
    }

    pub fn register(&self, adapter: Arc<dyn DataFileAdapter>) {
        let mut adapters = self
            .adapters
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        adapters.insert(adapter.file_format(), adapter);
    }

    pub fn get(&self, format: &FileFormat) -> Result<Arc<dyn DataFileAdapter>, FileDaoError> {
        let adapters = self
            .adapters
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        adapters
            .get(format)
            .cloned()
            .ok_or_else(|| FileDaoError::UnknownFormat {
                format: format.to_string(),
            })
    }

    /// Every registered adapter, longest extension first so file names parse
    /// against the most specific extension.
    pub fn all(&self) -> Vec<Arc<dyn DataFileAdapter>> {
        let adapters = self
            .adapters
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut all: Vec<Arc<dyn DataFileAdapter>> = adapters.values().cloned().collect();
        all.sort_by_key(|adapter| std::cmp::Reverse(adapter.file_extension().len()));
        all
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
