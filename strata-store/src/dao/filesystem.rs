//! Filesystem DAO: CRUD on opaque data files through pluggable file-format
//! adapters, with soft-deletion by rename.
//!
//! File naming:
//! `{schema_ref}__{data_name}[__version_{µs}][__time_of_removal_{µs}]{ext}`
//! where the microsecond components are zero-padded to fixed width so that
//! lexical order equals chronological order.

use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use regex::Regex;

use strata_core::constants::{
    FILE_NAME_SEPARATOR, FILE_REMOVAL_MARKER, FILE_VERSION_MARKER,
    RESERVED_IDENTIFIER_SUBSTRINGS,
};
use strata_core::errors::FileDaoError;
use strata_core::models::{DataFileId, DataObject, FileFormat, VersionTimestamp};
use strata_core::time::{datetime_to_microseconds, microseconds_to_datetime};
use strata_core::traits::{DataFileAdapter, FileSystem};

use crate::adapters::AdapterRegistry;

/// A tombstoned data file, as reported by `list_marked_for_deletion`.
#[derive(Debug, Clone, PartialEq)]
pub struct TombstonedFile {
    pub path: String,
    pub schema_ref: String,
    pub data_name: String,
    pub version_timestamp: VersionTimestamp,
    pub time_of_removal: DateTime<Utc>,
    pub file_format: FileFormat,
}

/// DAO over one filesystem prefix (typically a project directory).
pub struct FileSystemDao {
    fs: Arc<dyn FileSystem>,
    registry: Arc<AdapterRegistry>,
    default_format: FileFormat,
    millisecond_fallback: bool,
}

impl FileSystemDao {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        registry: Arc<AdapterRegistry>,
        default_format: FileFormat,
    ) -> Self {
        FileSystemDao {
            fs,
            registry,
            default_format,
            millisecond_fallback: false,
        }
    }

    /// Enable the millisecond-precision fallback in `get`.
    pub fn with_millisecond_fallback(mut self, enabled: bool) -> Self {
        self.millisecond_fallback = enabled;
        self
    }

    pub fn filesystem(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// Write a data object. The adapter computes the identity and the bytes;
    /// the DAO refuses to overwrite an existing path. Returns the path
    /// written.
    pub fn add(
        &self,
        object: &DataObject,
        adapter: Option<Arc<dyn DataFileAdapter>>,
    ) -> Result<String, FileDaoError> {
        let adapter = self.resolve_adapter(adapter)?;
        if adapter.data_object_kind() != object.kind() {
            return Err(FileDaoError::ArgumentType {
                argument: "data_object".to_string(),
                expected: format!("a {} data object", adapter.data_object_kind()),
                actual: object.kind().to_string(),
            });
        }
        let id = adapter.id_of(object).ok_or_else(|| FileDaoError::ArgumentValue {
            argument: "data_object".to_string(),
            message: "attrs must carry schema_ref and data_name".to_string(),
        })?;
        validate_identifier("schema_ref", &id.schema_ref)?;
        validate_identifier("data_name", &id.data_name)?;

        let path = live_path(&id, adapter.file_extension());
        if self.path_exists(&path)? {
            return Err(FileDaoError::AlreadyExists { path });
        }
        tracing::debug!(path = %path, format = %adapter.file_format(), "writing data file");
        adapter.write_file(self.fs.as_ref(), &path, object)?;
        Ok(path)
    }

    /// Read a data object.
    ///
    /// A concrete `version_timestamp` addresses exactly that file. The
    /// unversioned sentinel first tries the unversioned path, then falls back
    /// to the version series, returning the `nth_most_recent` from the tail.
    /// Returns `None` on absence.
    pub fn get(
        &self,
        schema_ref: &str,
        data_name: &str,
        version: VersionTimestamp,
        nth_most_recent: i64,
        adapter: Option<Arc<dyn DataFileAdapter>>,
    ) -> Result<Option<DataObject>, FileDaoError> {
        validate_identifier("schema_ref", schema_ref)?;
        validate_identifier("data_name", data_name)?;
        if nth_most_recent < 0 {
            return Err(FileDaoError::ArgumentValue {
                argument: "nth_most_recent".to_string(),
                message: "must be non-negative".to_string(),
            });
        }
        let adapter = self.resolve_adapter(adapter)?;
        let ext = adapter.file_extension();

        if let VersionTimestamp::At(instant) = version {
            let id = DataFileId {
                schema_ref: schema_ref.to_string(),
                data_name: data_name.to_string(),
                version_timestamp: version,
            };
            let path = live_path(&id, ext);
            if self.path_exists(&path)? {
                return adapter.read_file(self.fs.as_ref(), &path).map(Some);
            }
            if self.millisecond_fallback {
                let target_millis = datetime_to_microseconds(&instant) / 1000;
                for entry in self.version_series(schema_ref, data_name, ext)? {
                    if entry.version_micros / 1000 == target_millis {
                        return adapter.read_file(self.fs.as_ref(), &entry.path).map(Some);
                    }
                }
            }
            return Ok(None);
        }

        let id = DataFileId {
            schema_ref: schema_ref.to_string(),
            data_name: data_name.to_string(),
            version_timestamp: VersionTimestamp::Unversioned,
        };
        let unversioned = live_path(&id, ext);
        if self.path_exists(&unversioned)? {
            return adapter.read_file(self.fs.as_ref(), &unversioned).map(Some);
        }

        let series = self.version_series(schema_ref, data_name, ext)?;
        if series.is_empty() || nth_most_recent as usize > series.len() {
            return Ok(None);
        }
        // nth_most_recent counts from the tail of the lexically sorted
        // series; 0 degenerates to the oldest version.
        let index = if nth_most_recent == 0 {
            0
        } else {
            series.len() - nth_most_recent as usize
        };
        adapter.read_file(self.fs.as_ref(), &series[index].path).map(Some)
    }

    /// Fast existence check for the exact `(schema_ref, data_name, version)`
    /// path.
    pub fn exists(
        &self,
        schema_ref: &str,
        data_name: &str,
        version: VersionTimestamp,
        adapter: Option<Arc<dyn DataFileAdapter>>,
    ) -> Result<bool, FileDaoError> {
        validate_identifier("schema_ref", schema_ref)?;
        validate_identifier("data_name", data_name)?;
        let adapter = self.resolve_adapter(adapter)?;
        let id = DataFileId {
            schema_ref: schema_ref.to_string(),
            data_name: data_name.to_string(),
            version_timestamp: version,
        };
        self.path_exists(&live_path(&id, adapter.file_extension()))
    }

    /// Number of live files in the version series.
    pub fn n_versions(
        &self,
        schema_ref: &str,
        data_name: &str,
        adapter: Option<Arc<dyn DataFileAdapter>>,
    ) -> Result<usize, FileDaoError> {
        validate_identifier("schema_ref", schema_ref)?;
        validate_identifier("data_name", data_name)?;
        let adapter = self.resolve_adapter(adapter)?;
        Ok(self
            .version_series(schema_ref, data_name, adapter.file_extension())?
            .len())
    }

    /// Soft-delete by atomic rename to a tombstoned name. A taken tombstone
    /// name means two removals collided in the same microsecond; the caller
    /// retries with a fresh timestamp.
    pub fn mark_for_deletion(
        &self,
        schema_ref: &str,
        data_name: &str,
        version: VersionTimestamp,
        time_of_removal: DateTime<Utc>,
        adapter: Option<Arc<dyn DataFileAdapter>>,
    ) -> Result<(), FileDaoError> {
        validate_identifier("schema_ref", schema_ref)?;
        validate_identifier("data_name", data_name)?;
        let adapter = self.resolve_adapter(adapter)?;
        let id = DataFileId {
            schema_ref: schema_ref.to_string(),
            data_name: data_name.to_string(),
            version_timestamp: version,
        };
        let source = live_path(&id, adapter.file_extension());
        if !self.path_exists(&source)? {
            return Err(FileDaoError::NotFound {
                identity: id.to_string(),
            });
        }
        let destination = tombstone_path(&id, time_of_removal, adapter.file_extension());
        if self.path_exists(&destination)? {
            return Err(FileDaoError::AlreadyExists { path: destination });
        }
        tracing::debug!(from = %source, to = %destination, "tombstoning data file");
        self.fs
            .rename(&source, &destination)
            .map_err(|e| FileDaoError::io("rename", &source, e))
    }

    /// Inverse rename of the `nth_most_recent` tombstone for this identity,
    /// counted from the oldest removal upward.
    pub fn restore(
        &self,
        schema_ref: &str,
        data_name: &str,
        version: VersionTimestamp,
        nth_most_recent: i64,
        adapter: Option<Arc<dyn DataFileAdapter>>,
    ) -> Result<(), FileDaoError> {
        validate_identifier("schema_ref", schema_ref)?;
        validate_identifier("data_name", data_name)?;
        let adapter = self.resolve_adapter(adapter)?;
        let ext = adapter.file_extension();

        let mut tombstones: Vec<ParsedEntry> = self
            .entries_for(ext)?
            .into_iter()
            .filter(|entry| {
                entry.schema_ref == schema_ref
                    && entry.data_name == data_name
                    && entry.removal_micros.is_some()
                    && entry.version_micros_opt() == version_component(version)
            })
            .collect();
        tombstones.sort_by_key(|entry| entry.removal_micros);

        if nth_most_recent < 1 || nth_most_recent as usize > tombstones.len() {
            let id = DataFileId {
                schema_ref: schema_ref.to_string(),
                data_name: data_name.to_string(),
                version_timestamp: version,
            };
            return Err(FileDaoError::Range {
                requested: nth_most_recent,
                available: tombstones.len(),
                identity: id.to_string(),
            });
        }
        let candidate = &tombstones[nth_most_recent as usize - 1];

        let id = DataFileId {
            schema_ref: schema_ref.to_string(),
            data_name: data_name.to_string(),
            version_timestamp: version,
        };
        let destination = live_path(&id, ext);
        if self.path_exists(&destination)? {
            return Err(FileDaoError::AlreadyExists { path: destination });
        }
        tracing::debug!(from = %candidate.path, to = %destination, "restoring data file");
        self.fs
            .rename(&candidate.path, &destination)
            .map_err(|e| FileDaoError::io("rename", &candidate.path, e))
    }

    /// Inverse rename of one exact tombstone, addressed by its removal
    /// instant. Used to invert a recorded removal without disturbing older
    /// tombstones of the same identity.
    pub fn restore_exact(
        &self,
        schema_ref: &str,
        data_name: &str,
        version: VersionTimestamp,
        time_of_removal: DateTime<Utc>,
        adapter: Option<Arc<dyn DataFileAdapter>>,
    ) -> Result<(), FileDaoError> {
        validate_identifier("schema_ref", schema_ref)?;
        validate_identifier("data_name", data_name)?;
        let adapter = self.resolve_adapter(adapter)?;
        let id = DataFileId {
            schema_ref: schema_ref.to_string(),
            data_name: data_name.to_string(),
            version_timestamp: version,
        };
        let source = tombstone_path(&id, time_of_removal, adapter.file_extension());
        if !self.path_exists(&source)? {
            return Err(FileDaoError::NotFound {
                identity: id.to_string(),
            });
        }
        let destination = live_path(&id, adapter.file_extension());
        if self.path_exists(&destination)? {
            return Err(FileDaoError::AlreadyExists { path: destination });
        }
        self.fs
            .rename(&source, &destination)
            .map_err(|e| FileDaoError::io("rename", &source, e))
    }

    /// Tombstoned files, oldest removal first. With a threshold, only those
    /// removed strictly before it. Without an explicit adapter, every
    /// registered format is scanned.
    pub fn list_marked_for_deletion(
        &self,
        time_threshold: Option<DateTime<Utc>>,
        adapter: Option<Arc<dyn DataFileAdapter>>,
    ) -> Result<Vec<TombstonedFile>, FileDaoError> {
        let threshold_micros = time_threshold.map(|t| datetime_to_microseconds(&t));
        let mut tombstones = Vec::new();
        for (entry, format) in self.tombstone_entries(adapter)? {
            let Some(removal) = entry.removal_micros else {
                continue;
            };
            if let Some(threshold) = threshold_micros {
                if removal >= threshold {
                    continue;
                }
            }
            tombstones.push(TombstonedFile {
                path: entry.path.clone(),
                schema_ref: entry.schema_ref.clone(),
                data_name: entry.data_name.clone(),
                version_timestamp: entry.version_timestamp(),
                time_of_removal: microseconds_to_datetime(removal),
                file_format: format,
            });
        }
        tombstones.sort_by_key(|t| t.time_of_removal);
        Ok(tombstones)
    }

    /// Hard-delete tombstones; returns the count. With a threshold, only
    /// those removed at or before it are purged.
    pub fn purge(
        &self,
        time_threshold: Option<DateTime<Utc>>,
        adapter: Option<Arc<dyn DataFileAdapter>>,
    ) -> Result<u64, FileDaoError> {
        let threshold_micros = time_threshold.map(|t| datetime_to_microseconds(&t));
        let mut purged = 0u64;
        for (entry, _) in self.tombstone_entries(adapter)? {
            let Some(removal) = entry.removal_micros else {
                continue;
            };
            if let Some(threshold) = threshold_micros {
                if removal > threshold {
                    continue;
                }
            }
            if self
                .fs
                .is_dir(&entry.path)
                .map_err(|e| FileDaoError::io("stat", &entry.path, e))?
            {
                self.fs
                    .delete_dir(&entry.path)
                    .map_err(|e| FileDaoError::io("delete", &entry.path, e))?;
            } else {
                self.fs
                    .delete(&entry.path)
                    .map_err(|e| FileDaoError::io("delete", &entry.path, e))?;
            }
            purged += 1;
        }
        tracing::debug!(purged, "purged tombstoned data files");
        Ok(purged)
    }

    // --- helpers ---

    fn resolve_adapter(
        &self,
        adapter: Option<Arc<dyn DataFileAdapter>>,
    ) -> Result<Arc<dyn DataFileAdapter>, FileDaoError> {
        match adapter {
            Some(adapter) => Ok(adapter),
            None => self.registry.get(&self.default_format),
        }
    }

    fn path_exists(&self, path: &str) -> Result<bool, FileDaoError> {
        self.fs
            .exists(path)
            .map_err(|e| FileDaoError::io("stat", path, e))
    }

    /// Parsed directory entries for one extension.
    fn entries_for(&self, ext: &str) -> Result<Vec<ParsedEntry>, FileDaoError> {
        let names = self
            .fs
            .list("")
            .map_err(|e| FileDaoError::io("list", "", e))?;
        Ok(names
            .into_iter()
            .filter_map(|name| ParsedEntry::parse(&name, ext))
            .collect())
    }

    /// Live files of a version series, lexically sorted (equals
    /// chronological order thanks to the zero-padded suffixes).
    fn version_series(
        &self,
        schema_ref: &str,
        data_name: &str,
        ext: &str,
    ) -> Result<Vec<ParsedEntry>, FileDaoError> {
        let mut series: Vec<ParsedEntry> = self
            .entries_for(ext)?
            .into_iter()
            .filter(|entry| {
                entry.schema_ref == schema_ref
                    && entry.data_name == data_name
                    && entry.version_micros != 0
                    && entry.removal_micros.is_none()
            })
            .collect();
        series.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(series)
    }

    /// Tombstoned entries across the requested adapters, tagged with their
    /// format.
    fn tombstone_entries(
        &self,
        adapter: Option<Arc<dyn DataFileAdapter>>,
    ) -> Result<Vec<(ParsedEntry, FileFormat)>, FileDaoError> {
        let adapters = match adapter {
            Some(adapter) => vec![adapter],
            None => self.registry.all(),
        };
        let mut entries = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for adapter in adapters {
            for entry in self.entries_for(adapter.file_extension())? {
                if entry.removal_micros.is_some() && seen.insert(entry.path.clone()) {
                    entries.push((entry, adapter.file_format()));
                }
            }
        }
        Ok(entries)
    }
}

/// A directory entry parsed against the file naming grammar.
#[derive(Debug, Clone)]
struct ParsedEntry {
    path: String,
    schema_ref: String,
    data_name: String,
    /// `0` for unversioned files.
    version_micros: i64,
    removal_micros: Option<i64>,
}

impl ParsedEntry {
    fn parse(file_name: &str, ext: &str) -> Option<Self> {
        let stem = if ext.is_empty() {
            file_name
        } else {
            file_name.strip_suffix(ext)?
        };
        let captures = stem_regex().captures(stem)?;
        let schema_ref = captures.name("schema")?.as_str().to_string();
        let data_name = captures.name("name")?.as_str().to_string();
        let version_micros = match captures.name("version") {
            Some(m) => m.as_str().parse::<i64>().ok()?,
            None => 0,
        };
        let removal_micros = match captures.name("removal") {
            Some(m) => Some(m.as_str().parse::<i64>().ok()?),
            None => None,
        };
        Some(ParsedEntry {
            path: file_name.to_string(),
            schema_ref,
            data_name,
            version_micros,
            removal_micros,
        })
    }

    fn version_timestamp(&self) -> VersionTimestamp {
        if self.version_micros == 0 {
            VersionTimestamp::Unversioned
        } else {
            VersionTimestamp::At(microseconds_to_datetime(self.version_micros))
        }
    }

    fn version_micros_opt(&self) -> Option<i64> {
        (self.version_micros != 0).then_some(self.version_micros)
    }
}

fn stem_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(
            r"^(?P<schema>[A-Za-z0-9][A-Za-z0-9_\-]*?)__(?P<name>[A-Za-z0-9][A-Za-z0-9_\-]*?)(?:__version_(?P<version>[0-9]{20}))?(?:__time_of_removal_(?P<removal>[0-9]{20}))?$",
        )
        .unwrap_or_else(|e| unreachable!("invalid stem grammar: {e}"))
    })
}

fn version_component(version: VersionTimestamp) -> Option<i64> {
    match version {
        VersionTimestamp::Unversioned => None,
        VersionTimestamp::At(instant) => Some(datetime_to_microseconds(&instant)),
    }
}

fn live_path(id: &DataFileId, ext: &str) -> String {
    let mut stem = format!(
        "{}{}{}",
        id.schema_ref, FILE_NAME_SEPARATOR, id.data_name
    );
    if let VersionTimestamp::At(_) = id.version_timestamp {
        stem.push_str(FILE_VERSION_MARKER);
        stem.push_str(&id.version_timestamp.file_name_component());
    }
    format!("{stem}{ext}")
}

fn tombstone_path(id: &DataFileId, time_of_removal: DateTime<Utc>, ext: &str) -> String {
    let live = live_path(id, ext);
    let stem = if ext.is_empty() {
        live.as_str()
    } else {
        live.strip_suffix(ext).unwrap_or(live.as_str())
    };
    let removal = format!(
        "{:0width$}",
        datetime_to_microseconds(&time_of_removal),
        width = strata_core::constants::MICROS_FIELD_WIDTH
    );
    format!("{stem}{FILE_REMOVAL_MARKER}{removal}{ext}")
}

/// Identifiers become file-name components: conservative charset, no `__`,
/// none of the reserved marker substrings.
fn validate_identifier(argument: &str, value: &str) -> Result<(), FileDaoError> {
    static IDENTIFIER: OnceLock<Regex> = OnceLock::new();
    let regex = IDENTIFIER.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_\-]*$")
            .unwrap_or_else(|e| unreachable!("invalid identifier grammar: {e}"))
    });
    if !regex.is_match(value) || value.contains(FILE_NAME_SEPARATOR) {
        return Err(FileDaoError::ArgumentValue {
            argument: argument.to_string(),
            message: format!(
                "'{value}' must be alphanumeric with single underscores or dashes"
            ),
        });
    }
    for reserved in RESERVED_IDENTIFIER_SUBSTRINGS {
        if value.contains(reserved) {
            return Err(FileDaoError::ArgumentValue {
                argument: argument.to_string(),
                message: format!("'{value}' contains the reserved substring '{reserved}'"),
            });
        }
    }
    Ok(())
}
