//! Data repository: keeps a record and its optional data file in sync and
//! enforces schema validation against the domain-model registry.
//!
//! A mutation writes the record first and the file second, so a crash can
//! leave an orphan record but never an orphan file; `has_file` mismatches
//! are detectable on read.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use jsonschema::JSONSchema;
use serde_json::Value;

use strata_core::constants::{
    DATA_NAME, DATA_REF_MODEL, DATA_REF_SUFFIX, HAS_FILE, RECORDS_COLLECTION, SCHEMA_REF,
    TIME_OF_REMOVAL, TIME_OF_SAVE, VERSION_TIMESTAMP,
};
use strata_core::errors::DataRepoError;
use strata_core::models::{
    DataObject, FileFormat, OperationEntry, OperationKind, Record, SchemaType, VersionTimestamp,
};
use strata_core::time::{datetime_to_microseconds, MonotonicClock};
use strata_core::traits::{
    DataFileAdapter, Document, Filter, SchemaResolver, SortOrder,
};

use crate::adapters::AdapterRegistry;
use crate::dao::{DocumentDao, FileSystemDao};

/// Options for `find`.
#[derive(Default)]
pub struct FindOptions {
    pub filter: Option<Filter>,
    pub projection: Option<Vec<String>>,
    pub sort: Vec<(String, SortOrder)>,
    pub limit: Option<usize>,
    /// When true, records with `has_file` are materialized from their files.
    pub get_data: bool,
}

pub struct DataRepository {
    record_dao: DocumentDao,
    file_dao: FileSystemDao,
    schemas: Arc<dyn SchemaResolver>,
    registry: Arc<AdapterRegistry>,
    default_format: FileFormat,
    clock: Arc<MonotonicClock>,
    history: Mutex<Vec<OperationEntry>>,
}

impl DataRepository {
    pub fn new(
        record_dao: DocumentDao,
        file_dao: FileSystemDao,
        schemas: Arc<dyn SchemaResolver>,
        registry: Arc<AdapterRegistry>,
        default_format: FileFormat,
        clock: Arc<MonotonicClock>,
    ) -> Self {
        DataRepository {
            record_dao,
            file_dao,
            schemas,
            registry,
            default_format,
            clock,
            history: Mutex::new(Vec::new()),
        }
    }

    /// The record (or its materialized file) for this identity, validated.
    pub fn get(
        &self,
        schema_ref: &str,
        data_name: &str,
        version: VersionTimestamp,
        adapter: Option<Arc<dyn DataFileAdapter>>,
    ) -> Result<Option<DataObject>, DataRepoError> {
        let identity = [(SCHEMA_REF, schema_ref), (DATA_NAME, data_name)];
        let Some(record) = self.record_dao.get(version, &identity)? else {
            return Ok(None);
        };
        self.validate_record(&record)?;

        let has_file = record.get(HAS_FILE).and_then(Value::as_bool).unwrap_or(false);
        if !has_file {
            return Ok(Some(DataObject::Record(Record::new(record))));
        }

        let file = self
            .file_dao
            .get(schema_ref, data_name, version, 1, adapter)?;
        match file {
            Some(object) => Ok(Some(object)),
            None => Err(DataRepoError::NotFound {
                identity: format!(
                    "{schema_ref}/{data_name}@{version}: record has has_file but no data file"
                ),
            }),
        }
    }

    pub fn exists(
        &self,
        schema_ref: &str,
        data_name: &str,
        version: VersionTimestamp,
    ) -> Result<bool, DataRepoError> {
        let identity = [(SCHEMA_REF, schema_ref), (DATA_NAME, data_name)];
        Ok(self.record_dao.exists(version, &identity)?)
    }

    /// Live records matching the options; with `get_data`, file-backed
    /// records come back as their payload objects.
    pub fn find(&self, options: FindOptions) -> Result<Vec<DataObject>, DataRepoError> {
        let documents = self.record_dao.find_with(
            options.filter,
            options.projection,
            options.sort,
            options.limit,
        )?;
        let mut results = Vec::with_capacity(documents.len());
        for document in documents {
            let record = Record::new(document);
            if options.get_data && record.has_file() {
                let (schema_ref, data_name, version) = record_identity(&record)?;
                if let Some(object) =
                    self.file_dao
                        .get(&schema_ref, &data_name, version, 1, None)?
                {
                    results.push(object);
                    continue;
                }
            }
            results.push(DataObject::Record(record));
        }
        Ok(results)
    }

    /// Validate and persist a data object: the record always, the payload
    /// when one is attached.
    pub fn add(
        &self,
        object: DataObject,
        versioning_on: bool,
        adapter: Option<Arc<dyn DataFileAdapter>>,
    ) -> Result<(), DataRepoError> {
        let timestamp = self.clock.now();
        let mut object = object;
        let has_payload = object.has_payload();

        // Resolve the version coordinate up front; the record and the file
        // must agree on it.
        let version = match VersionTimestamp::from_value(object.attrs().get(VERSION_TIMESTAMP)) {
            Some(VersionTimestamp::Unversioned) if versioning_on => {
                match object.attrs().get(VERSION_TIMESTAMP) {
                    // An explicit sentinel stays unversioned even with
                    // versioning on.
                    Some(value) if !value.is_null() => VersionTimestamp::Unversioned,
                    _ => VersionTimestamp::at(timestamp),
                }
            }
            Some(version) => version,
            None => {
                return Err(DataRepoError::ArgumentType {
                    argument: VERSION_TIMESTAMP.to_string(),
                    expected: "an integer microsecond timestamp or the sentinel 0".to_string(),
                    actual: "a non-integer value".to_string(),
                })
            }
        };

        {
            let attrs = object.attrs_mut();
            attrs.insert(VERSION_TIMESTAMP.to_string(), version.to_value());
            if has_payload {
                // A payload-carrying object is a data record unless the
                // caller said otherwise.
                attrs.entry(HAS_FILE.to_string()).or_insert(Value::from(true));
            } else {
                attrs.entry(HAS_FILE.to_string()).or_insert(Value::from(false));
            }
        }

        self.validate_record(object.attrs())?;
        let record = Record::new(object.attrs().clone());
        let (schema_ref, data_name, _) = record_identity(&record)?;
        let has_file = record.has_file();
        if has_file && !has_payload {
            return Err(DataRepoError::ArgumentValue {
                argument: HAS_FILE.to_string(),
                message: format!(
                    "record {schema_ref}/{data_name} claims a data file but no payload was given"
                ),
            });
        }

        // Record first, then file: a crash leaves an orphan record, never an
        // orphan file.
        self.record_dao
            .add(record.into_fields(), timestamp, false)?;
        let file_format = if has_payload {
            let adapter = self.resolve_adapter(adapter)?;
            self.file_dao.add(&object, Some(adapter.clone()))?;
            Some(adapter.file_format())
        } else {
            None
        };

        let mut entry = OperationEntry::new(
            timestamp,
            RECORDS_COLLECTION,
            OperationKind::Added,
            identity_map(&schema_ref, &data_name, version),
        );
        if has_payload {
            entry = entry.with_file(file_format);
        }
        self.push_entry(entry);
        tracing::debug!(
            schema_ref = %schema_ref,
            data_name = %data_name,
            has_file = has_payload,
            "added data object"
        );
        Ok(())
    }

    /// Soft-delete the record and, when present, its data file, sharing one
    /// removal instant.
    pub fn remove(
        &self,
        schema_ref: &str,
        data_name: &str,
        version: VersionTimestamp,
        adapter: Option<Arc<dyn DataFileAdapter>>,
    ) -> Result<(), DataRepoError> {
        let identity = [(SCHEMA_REF, schema_ref), (DATA_NAME, data_name)];
        let Some(record) = self.record_dao.get(version, &identity)? else {
            return Err(DataRepoError::NotFound {
                identity: format!("{schema_ref}/{data_name}@{version}"),
            });
        };
        let has_file = Record::new(record).has_file();

        let removal = self
            .record_dao
            .mark_for_deletion(self.clock.now(), version, &identity)?;
        let file_format = if has_file {
            let adapter = self.resolve_adapter(adapter)?;
            self.file_dao.mark_for_deletion(
                schema_ref,
                data_name,
                version,
                removal,
                Some(adapter.clone()),
            )?;
            Some(adapter.file_format())
        } else {
            None
        };

        let mut entry = OperationEntry::new(
            removal,
            RECORDS_COLLECTION,
            OperationKind::Removed,
            identity_map(schema_ref, data_name, version),
        );
        if has_file {
            entry = entry.with_file(file_format);
        }
        self.push_entry(entry);
        tracing::debug!(
            schema_ref = %schema_ref,
            data_name = %data_name,
            has_file,
            "removed data object"
        );
        Ok(())
    }

    /// Clear the tombstones of the nth removal (oldest first) of this
    /// identity: the record and, when one was tombstoned with it, the file.
    pub fn restore(
        &self,
        schema_ref: &str,
        data_name: &str,
        version: VersionTimestamp,
        nth_most_recent: i64,
        adapter: Option<Arc<dyn DataFileAdapter>>,
    ) -> Result<(), DataRepoError> {
        let identity = [(SCHEMA_REF, schema_ref), (DATA_NAME, data_name)];
        let (restored, removal) = self
            .record_dao
            .restore(Some(version), nth_most_recent, &identity)?;
        if Record::new(restored).has_file() {
            let adapter = self.resolve_adapter(adapter)?;
            self.file_dao
                .restore_exact(schema_ref, data_name, version, removal, Some(adapter))?;
        }
        Ok(())
    }

    /// Invert the most recent pending mutation. The entry is popped only
    /// after the inversion succeeded.
    pub fn undo(&self) -> Result<Option<OperationEntry>, DataRepoError> {
        let Some(entry) = self.peek_entry() else {
            return Ok(None);
        };
        let (schema_ref, data_name, version) = entry_identity(&entry)?;
        let identity = [
            (SCHEMA_REF, schema_ref.as_str()),
            (DATA_NAME, data_name.as_str()),
        ];
        let adapter = match entry.file_format() {
            Some(format) => Some(self.registry.get(format)?),
            None => None,
        };
        match entry.kind() {
            OperationKind::Added => {
                let removal =
                    self.record_dao
                        .mark_for_deletion(entry.timestamp(), version, &identity)?;
                if entry.has_file() {
                    self.file_dao.mark_for_deletion(
                        &schema_ref,
                        &data_name,
                        version,
                        removal,
                        adapter,
                    )?;
                }
            }
            OperationKind::Removed => {
                self.record_dao
                    .restore_exact(version, entry.timestamp(), &identity)?;
                if entry.has_file() {
                    self.file_dao.restore_exact(
                        &schema_ref,
                        &data_name,
                        version,
                        entry.timestamp(),
                        adapter,
                    )?;
                }
            }
        }
        Ok(self.pop_entry())
    }

    /// Invert every pending mutation, newest first.
    pub fn undo_all(&self) -> Result<Vec<OperationEntry>, DataRepoError> {
        let mut undone = Vec::new();
        while let Some(entry) = self.undo()? {
            undone.push(entry);
        }
        Ok(undone)
    }

    /// Tombstoned `(record, file path)` pairs, ordered by removal time
    /// ascending. The path is `None` for file-less records.
    pub fn list_marked_for_deletion(
        &self,
        time_threshold: Option<DateTime<Utc>>,
    ) -> Result<Vec<(Document, Option<String>)>, DataRepoError> {
        let mut records = self.record_dao.list_marked_for_deletion(time_threshold)?;
        records.sort_by_key(|record| record.get(TIME_OF_REMOVAL).and_then(Value::as_i64));

        let files = self.file_dao.list_marked_for_deletion(time_threshold, None)?;
        let mut paths: BTreeMap<(String, String, i64, i64), String> = BTreeMap::new();
        for file in files {
            paths.insert(
                (
                    file.schema_ref.clone(),
                    file.data_name.clone(),
                    file.version_timestamp.as_micros(),
                    datetime_to_microseconds(&file.time_of_removal),
                ),
                file.path,
            );
        }

        Ok(records
            .into_iter()
            .map(|record| {
                let key = (
                    record
                        .get(SCHEMA_REF)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    record
                        .get(DATA_NAME)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    VersionTimestamp::from_value(record.get(VERSION_TIMESTAMP))
                        .unwrap_or_default()
                        .as_micros(),
                    record.get(TIME_OF_REMOVAL).and_then(Value::as_i64).unwrap_or(0),
                );
                let path = paths.get(&key).cloned();
                (record, path)
            })
            .collect())
    }

    /// Hard-delete tombstoned records and files; returns the counts.
    pub fn purge(
        &self,
        time_threshold: Option<DateTime<Utc>>,
    ) -> Result<(u64, u64), DataRepoError> {
        let records = self.record_dao.purge(time_threshold)?;
        let files = self.file_dao.purge(time_threshold, None)?;
        Ok((records, files))
    }

    /// Number of live files in a version series.
    pub fn n_versions(
        &self,
        schema_ref: &str,
        data_name: &str,
        adapter: Option<Arc<dyn DataFileAdapter>>,
    ) -> Result<usize, DataRepoError> {
        Ok(self.file_dao.n_versions(schema_ref, data_name, adapter)?)
    }

    pub fn operation_history(&self) -> Vec<OperationEntry> {
        lock(&self.history).clone()
    }

    pub fn clear_operation_history(&self) {
        lock(&self.history).clear();
    }

    // --- validation ---

    /// Validate a record against its data model, then each field against its
    /// property model (`*_data_ref` fields against the shared `data_ref`
    /// model).
    fn validate_record(&self, record: &Document) -> Result<(), DataRepoError> {
        let identity = format!(
            "{}/{}",
            record.get(SCHEMA_REF).and_then(Value::as_str).unwrap_or("<missing schema_ref>"),
            record.get(DATA_NAME).and_then(Value::as_str).unwrap_or("<missing data_name>"),
        );
        let Some(schema_ref) = record.get(SCHEMA_REF).and_then(Value::as_str) else {
            return Err(DataRepoError::Validation {
                identity,
                detail: "record is missing schema_ref".to_string(),
            });
        };

        let Some(model) = self.schemas.resolve(schema_ref)? else {
            return Err(DataRepoError::Validation {
                identity,
                detail: format!("no domain model named '{schema_ref}'"),
            });
        };
        if model.schema_type != SchemaType::DataModel {
            return Err(DataRepoError::Validation {
                identity,
                detail: format!(
                    "schema_ref '{schema_ref}' names a {}, not a data model",
                    model.schema_type
                ),
            });
        }

        let bare = bare_record(record);
        let instance = Value::Object(bare.clone());
        let compiled = JSONSchema::compile(&model.json_schema).map_err(|e| {
            DataRepoError::Validation {
                identity: identity.clone(),
                detail: format!("data model '{schema_ref}' body does not compile: {e}"),
            }
        })?;
        if let Err(errors) = compiled.validate(&instance) {
            return Err(DataRepoError::Validation {
                identity,
                detail: super::validation::describe_errors_with_schema(
                    errors,
                    &model.json_schema,
                ),
            });
        }

        for (field, value) in &bare {
            let property_model_name = if field.ends_with(DATA_REF_SUFFIX) {
                DATA_REF_MODEL
            } else {
                field.as_str()
            };
            let Some(property_model) = self.schemas.resolve(property_model_name)? else {
                return Err(DataRepoError::Validation {
                    identity,
                    detail: format!(
                        "field '{field}' has no property model named '{property_model_name}'"
                    ),
                });
            };
            if property_model.schema_type != SchemaType::PropertyModel {
                return Err(DataRepoError::Validation {
                    identity,
                    detail: format!(
                        "field '{field}' resolves to a {}, not a property model",
                        property_model.schema_type
                    ),
                });
            }
            let compiled = JSONSchema::compile(&property_model.json_schema).map_err(|e| {
                DataRepoError::Validation {
                    identity: identity.clone(),
                    detail: format!(
                        "property model '{property_model_name}' body does not compile: {e}"
                    ),
                }
            })?;
            let validation_result = compiled.validate(value);
            if let Err(errors) = validation_result {
                return Err(DataRepoError::Validation {
                    identity,
                    detail: format!(
                        "field '{field}': {}",
                        super::validation::describe_errors(errors)
                    ),
                });
            }
        }
        Ok(())
    }

    fn resolve_adapter(
        &self,
        adapter: Option<Arc<dyn DataFileAdapter>>,
    ) -> Result<Arc<dyn DataFileAdapter>, DataRepoError> {
        match adapter {
            Some(adapter) => Ok(adapter),
            None => Ok(self.registry.get(&self.default_format)?),
        }
    }

    fn push_entry(&self, entry: OperationEntry) {
        lock(&self.history).push(entry);
    }

    fn peek_entry(&self) -> Option<OperationEntry> {
        lock(&self.history).last().cloned()
    }

    fn pop_entry(&self) -> Option<OperationEntry> {
        lock(&self.history).pop()
    }
}

/// The record without managed fields, as validated.
fn bare_record(record: &Document) -> Document {
    let mut bare = record.clone();
    bare.remove(TIME_OF_SAVE);
    bare.remove(TIME_OF_REMOVAL);
    bare.remove(VERSION_TIMESTAMP);
    bare.remove(strata_core::constants::INTERNAL_ID);
    bare
}

fn record_identity(record: &Record) -> Result<(String, String, VersionTimestamp), DataRepoError> {
    let schema_ref = record
        .schema_ref()
        .ok_or_else(|| DataRepoError::ArgumentValue {
            argument: SCHEMA_REF.to_string(),
            message: "record is missing schema_ref".to_string(),
        })?
        .to_string();
    let data_name = record
        .data_name()
        .ok_or_else(|| DataRepoError::ArgumentValue {
            argument: DATA_NAME.to_string(),
            message: "record is missing data_name".to_string(),
        })?
        .to_string();
    let version = record.version_timestamp().unwrap_or_default();
    Ok((schema_ref, data_name, version))
}

fn entry_identity(
    entry: &OperationEntry,
) -> Result<(String, String, VersionTimestamp), DataRepoError> {
    let schema_ref = entry
        .identity_field(SCHEMA_REF)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let data_name = entry
        .identity_field(DATA_NAME)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let version = VersionTimestamp::from_value(entry.identity_field(VERSION_TIMESTAMP))
        .unwrap_or_default();
    Ok((schema_ref, data_name, version))
}

fn identity_map(
    schema_ref: &str,
    data_name: &str,
    version: VersionTimestamp,
) -> BTreeMap<String, Value> {
    let mut identity = BTreeMap::new();
    identity.insert(SCHEMA_REF.to_string(), Value::from(schema_ref));
    identity.insert(DATA_NAME.to_string(), Value::from(data_name));
    identity.insert(VERSION_TIMESTAMP.to_string(), version.to_value());
    identity
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
