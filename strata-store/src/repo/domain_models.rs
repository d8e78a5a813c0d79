//! Domain-model repository: a self-describing schema registry.
//!
//! Domain models are validated against an embedded metaschema on both add
//! and read, so a document that was stored under older rules can never be
//! consumed silently. A model naming a `metamodel_ref` is additionally
//! validated against the referenced metamodel's body schema; resolution is
//! lazy and by name.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, OnceLock};

use jsonschema::JSONSchema;
use serde_json::{json, Value};

use strata_core::constants::{
    DOMAIN_MODELS_COLLECTION, METAMODEL_REF, SCHEMA_NAME, TIME_OF_REMOVAL, TIME_OF_SAVE,
    VERSION_TIMESTAMP,
};
use strata_core::errors::DomainRepoError;
use strata_core::models::{DomainModel, OperationEntry, OperationKind, SchemaType};
use strata_core::time::MonotonicClock;
use strata_core::traits::{Document, Filter, SchemaResolver};
use strata_core::VersionTimestamp;

use crate::dao::DocumentDao;

/// The authoritative metaschema every domain model must satisfy.
fn metaschema_document() -> &'static Value {
    static METASCHEMA: OnceLock<Value> = OnceLock::new();
    METASCHEMA.get_or_init(|| {
        json!({
            "type": "object",
            "properties": {
                "schema_name": {
                    "type": "string",
                    "pattern": "^[a-z][a-z0-9_]*[a-z0-9]$"
                },
                "schema_title": {
                    "type": "string",
                    "pattern": "^[A-Za-z0-9][A-Za-z0-9 ]+[A-Za-z0-9]$"
                },
                "schema_description": {
                    "type": "string",
                    "minLength": 1
                },
                "schema_type": {
                    "enum": ["property_model", "metamodel", "data_model"]
                },
                "json_schema": {
                    "type": "object",
                    "required": ["type"]
                },
                "metamodel_ref": {
                    "type": "string",
                    "pattern": "^[a-z][a-z0-9_]*[a-z0-9]$"
                }
            },
            "required": [
                "schema_name",
                "schema_title",
                "schema_description",
                "schema_type",
                "json_schema"
            ],
            "additionalProperties": false,
            "allOf": [
                {
                    "if": {
                        "properties": {"schema_type": {"const": "data_model"}}
                    },
                    "then": {"required": ["metamodel_ref"]}
                },
                {
                    "if": {
                        "properties": {
                            "schema_type": {"enum": ["metamodel", "data_model"]}
                        }
                    },
                    "then": {
                        "properties": {
                            "json_schema": {
                                "properties": {"type": {"const": "object"}}
                            }
                        }
                    }
                }
            ]
        })
    })
}

pub struct DomainModelRepository {
    dao: DocumentDao,
    clock: Arc<MonotonicClock>,
    metaschema: JSONSchema,
    /// Compiled metamodel bodies, invalidated on every mutation of the
    /// named model.
    compiled: moka::sync::Cache<String, Arc<JSONSchema>>,
    history: Mutex<Vec<OperationEntry>>,
}

impl std::fmt::Debug for DomainModelRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainModelRepository").finish_non_exhaustive()
    }
}

impl DomainModelRepository {
    pub fn new(dao: DocumentDao, clock: Arc<MonotonicClock>) -> Self {
        let metaschema = JSONSchema::compile(metaschema_document())
            .unwrap_or_else(|e| unreachable!("embedded metaschema must compile: {e}"));
        DomainModelRepository {
            dao,
            clock,
            metaschema,
            compiled: moka::sync::Cache::new(256),
            history: Mutex::new(Vec::new()),
        }
    }

    /// The live domain model document, validated, or `None`.
    pub fn get(&self, schema_name: &str) -> Result<Option<Document>, DomainRepoError> {
        let Some(document) = self.dao.get(
            VersionTimestamp::Unversioned,
            &[(SCHEMA_NAME, schema_name)],
        )?
        else {
            return Ok(None);
        };
        self.validate_document(&document)?;
        Ok(Some(document))
    }

    /// Typed view of a live, valid domain model.
    pub fn get_model(&self, schema_name: &str) -> Result<Option<DomainModel>, DomainRepoError> {
        let Some(document) = self.get(schema_name)? else {
            return Ok(None);
        };
        match DomainModel::from_document(&document) {
            Some(model) => Ok(Some(model)),
            None => Err(DomainRepoError::Validation {
                schema_name: schema_name.to_string(),
                detail: "stored document does not deserialize as a domain model".to_string(),
            }),
        }
    }

    pub fn exists(&self, schema_name: &str) -> Result<bool, DomainRepoError> {
        Ok(self
            .dao
            .exists(VersionTimestamp::Unversioned, &[(SCHEMA_NAME, schema_name)])?)
    }

    /// Live domain models matching `filter`, each validated.
    pub fn find(&self, filter: Option<Filter>) -> Result<Vec<Document>, DomainRepoError> {
        let documents = self.dao.find(filter, None)?;
        for document in &documents {
            self.validate_document(document)?;
        }
        Ok(documents)
    }

    /// Validate and insert a new domain model.
    pub fn add(&self, model: Document) -> Result<(), DomainRepoError> {
        self.validate_document(&model)?;
        let schema_name = schema_name_of(&model)?;
        if self.exists(&schema_name)? {
            return Err(DomainRepoError::AlreadyExists { schema_name });
        }
        let timestamp = self.clock.now();
        let mut clean = model;
        clean.remove(TIME_OF_SAVE);
        clean.remove(TIME_OF_REMOVAL);
        self.dao.add(clean, timestamp, false)?;
        self.compiled.invalidate(&schema_name);
        self.push_entry(OperationEntry::new(
            timestamp,
            DOMAIN_MODELS_COLLECTION,
            OperationKind::Added,
            identity_map(&schema_name),
        ));
        tracing::debug!(schema_name = %schema_name, "added domain model");
        Ok(())
    }

    /// Typed-model convenience for `add`.
    pub fn add_model(&self, model: &DomainModel) -> Result<(), DomainRepoError> {
        self.add(model.to_document())
    }

    /// Soft-delete a domain model. No cascade: models referencing it keep
    /// their reference and fail validation on their next read.
    pub fn remove(&self, schema_name: &str) -> Result<(), DomainRepoError> {
        if !self.exists(schema_name)? {
            return Err(DomainRepoError::NotFound {
                schema_name: schema_name.to_string(),
            });
        }
        let timestamp = self.clock.now();
        let removal = self.dao.mark_for_deletion(
            timestamp,
            VersionTimestamp::Unversioned,
            &[(SCHEMA_NAME, schema_name)],
        )?;
        self.compiled.invalidate(schema_name);
        self.push_entry(OperationEntry::new(
            removal,
            DOMAIN_MODELS_COLLECTION,
            OperationKind::Removed,
            identity_map(schema_name),
        ));
        tracing::debug!(schema_name = %schema_name, "removed domain model");
        Ok(())
    }

    /// Clear the tombstone of the nth removal (oldest first) of this name.
    pub fn restore(&self, schema_name: &str, nth_most_recent: i64) -> Result<(), DomainRepoError> {
        self.dao
            .restore(None, nth_most_recent, &[(SCHEMA_NAME, schema_name)])?;
        self.compiled.invalidate(schema_name);
        Ok(())
    }

    /// Invert the most recent pending mutation. Returns the inverted entry,
    /// or `None` when the history is empty. The entry is popped only after
    /// the inversion succeeded.
    pub fn undo(&self) -> Result<Option<OperationEntry>, DomainRepoError> {
        let Some(entry) = self.peek_entry() else {
            return Ok(None);
        };
        let schema_name = entry
            .identity_field(SCHEMA_NAME)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        match entry.kind() {
            OperationKind::Added => {
                self.dao.mark_for_deletion(
                    entry.timestamp(),
                    VersionTimestamp::Unversioned,
                    &[(SCHEMA_NAME, schema_name.as_str())],
                )?;
            }
            OperationKind::Removed => {
                self.dao.restore_exact(
                    VersionTimestamp::Unversioned,
                    entry.timestamp(),
                    &[(SCHEMA_NAME, schema_name.as_str())],
                )?;
            }
        }
        self.compiled.invalidate(&schema_name);
        Ok(self.pop_entry())
    }

    /// Invert every pending mutation, newest first.
    pub fn undo_all(&self) -> Result<Vec<OperationEntry>, DomainRepoError> {
        let mut undone = Vec::new();
        while let Some(entry) = self.undo()? {
            undone.push(entry);
        }
        Ok(undone)
    }

    pub fn list_marked_for_deletion(
        &self,
        time_threshold: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<Vec<Document>, DomainRepoError> {
        Ok(self.dao.list_marked_for_deletion(time_threshold)?)
    }

    pub fn purge(
        &self,
        time_threshold: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<u64, DomainRepoError> {
        Ok(self.dao.purge(time_threshold)?)
    }

    pub fn operation_history(&self) -> Vec<OperationEntry> {
        lock(&self.history).clone()
    }

    pub fn clear_operation_history(&self) {
        lock(&self.history).clear();
    }

    // --- validation ---

    /// Two-stage validation: the metaschema, then the referenced metamodel.
    fn validate_document(&self, document: &Document) -> Result<(), DomainRepoError> {
        let bare = bare_model(document);
        let schema_name = bare
            .get(SCHEMA_NAME)
            .and_then(Value::as_str)
            .unwrap_or("<missing schema_name>")
            .to_string();
        let instance = Value::Object(bare.clone());

        if let Err(errors) = self.metaschema.validate(&instance) {
            return Err(DomainRepoError::Validation {
                schema_name,
                detail: super::validation::describe_errors_with_schema(
                    errors,
                    metaschema_document(),
                ),
            });
        }

        // Rules the metaschema pattern language does not carry.
        for field in [SCHEMA_NAME, METAMODEL_REF] {
            if let Some(value) = bare.get(field).and_then(Value::as_str) {
                if value.contains("__") {
                    return Err(DomainRepoError::Validation {
                        schema_name,
                        detail: format!("{field} '{value}' contains a double underscore"),
                    });
                }
                for reserved in strata_core::constants::RESERVED_IDENTIFIER_SUBSTRINGS {
                    if value.contains(reserved) {
                        return Err(DomainRepoError::Validation {
                            schema_name,
                            detail: format!(
                                "{field} '{value}' contains the reserved substring '{reserved}'"
                            ),
                        });
                    }
                }
            }
        }
        if let Some(description) = bare.get("schema_description").and_then(Value::as_str) {
            if description.trim() != description || description.trim().is_empty() {
                return Err(DomainRepoError::Validation {
                    schema_name,
                    detail: "schema_description must be non-empty with no surrounding whitespace"
                        .to_string(),
                });
            }
        }

        // The embedded json_schema must itself compile as a JSON Schema.
        let body = bare.get("json_schema").cloned().unwrap_or(Value::Null);
        if let Err(e) = JSONSchema::compile(&body) {
            return Err(DomainRepoError::Validation {
                schema_name,
                detail: format!("json_schema is not a valid JSON Schema: {e}"),
            });
        }

        if let Some(metamodel_ref) = bare.get(METAMODEL_REF).and_then(Value::as_str) {
            let metamodel = self.compiled_metamodel(&schema_name, metamodel_ref)?;
            let validation_result = metamodel.validate(&instance);
            if let Err(errors) = validation_result {
                return Err(DomainRepoError::Validation {
                    schema_name: schema_name.clone(),
                    detail: format!(
                        "does not satisfy metamodel '{metamodel_ref}': {}",
                        super::validation::describe_errors(errors)
                    ),
                });
            }
        }
        Ok(())
    }

    /// The compiled body schema of a live metamodel.
    fn compiled_metamodel(
        &self,
        dependent: &str,
        metamodel_ref: &str,
    ) -> Result<Arc<JSONSchema>, DomainRepoError> {
        if let Some(compiled) = self.compiled.get(metamodel_ref) {
            return Ok(compiled);
        }
        let Some(document) = self.dao.get(
            VersionTimestamp::Unversioned,
            &[(SCHEMA_NAME, metamodel_ref)],
        )?
        else {
            return Err(DomainRepoError::Validation {
                schema_name: dependent.to_string(),
                detail: format!(
                    "metamodel_ref '{metamodel_ref}' does not resolve to a live domain model"
                ),
            });
        };
        let model = DomainModel::from_document(&document).ok_or_else(|| {
            DomainRepoError::Validation {
                schema_name: metamodel_ref.to_string(),
                detail: "stored document does not deserialize as a domain model".to_string(),
            }
        })?;
        if model.schema_type != SchemaType::Metamodel {
            return Err(DomainRepoError::Validation {
                schema_name: dependent.to_string(),
                detail: format!(
                    "metamodel_ref '{metamodel_ref}' resolves to a {}, not a metamodel",
                    model.schema_type
                ),
            });
        }
        let compiled = JSONSchema::compile(&model.json_schema).map_err(|e| {
            DomainRepoError::Validation {
                schema_name: metamodel_ref.to_string(),
                detail: format!("metamodel body does not compile: {e}"),
            }
        })?;
        let compiled = Arc::new(compiled);
        self.compiled
            .insert(metamodel_ref.to_string(), compiled.clone());
        Ok(compiled)
    }

    // --- history plumbing ---

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

impl SchemaResolver for DomainModelRepository {
    fn resolve(&self, schema_name: &str) -> Result<Option<DomainModel>, DomainRepoError> {
        self.get_model(schema_name)
    }
}

/// The model document without managed fields, as validated.
fn bare_model(document: &Document) -> Document {
    let mut bare = document.clone();
    bare.remove(TIME_OF_SAVE);
    bare.remove(TIME_OF_REMOVAL);
    bare.remove(VERSION_TIMESTAMP);
    bare.remove(strata_core::constants::INTERNAL_ID);
    bare
}

fn schema_name_of(document: &Document) -> Result<String, DomainRepoError> {
    document
        .get(SCHEMA_NAME)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| DomainRepoError::ArgumentType {
            argument: SCHEMA_NAME.to_string(),
            expected: "a string".to_string(),
            actual: "missing or non-string".to_string(),
        })
}

fn identity_map(schema_name: &str) -> BTreeMap<String, Value> {
    let mut identity = BTreeMap::new();
    identity.insert(SCHEMA_NAME.to_string(), Value::from(schema_name));
    identity
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
