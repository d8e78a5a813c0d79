//! Document-store DAO: CRUD with soft-deletion and versioning over one
//! collection of a document database.
//!
//! Identity is the tuple of declared index fields; together with
//! `version_timestamp` and `time_of_removal` it forms the composite unique
//! index, so tombstones never collide with live rows.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use strata_core::constants::{TIME_OF_REMOVAL, TIME_OF_SAVE, VERSION_TIMESTAMP};
use strata_core::errors::{BackendError, DocumentDaoError};
use strata_core::time::datetime_to_microseconds;
use strata_core::traits::{Document, DocumentCollection, Filter, FindQuery, SortOrder};
use strata_core::VersionTimestamp;

/// DAO over one collection, keyed by `(index_fields..., version_timestamp)`.
pub struct DocumentDao {
    collection: Arc<dyn DocumentCollection>,
    collection_name: String,
    index_fields: Vec<String>,
}

impl DocumentDao {
    /// Bind to a collection and ensure the composite unique index exists.
    pub fn new(
        collection: Arc<dyn DocumentCollection>,
        index_fields: Vec<String>,
    ) -> Result<Self, DocumentDaoError> {
        let collection_name = collection.name().to_string();
        let mut unique: Vec<String> = index_fields.clone();
        unique.push(VERSION_TIMESTAMP.to_string());
        unique.push(TIME_OF_REMOVAL.to_string());
        collection
            .ensure_unique_index(&unique)
            .map_err(|source| backend("ensure_unique_index", source))?;
        Ok(DocumentDao {
            collection,
            collection_name,
            index_fields,
        })
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    pub fn index_fields(&self) -> &[String] {
        &self.index_fields
    }

    /// The live document with this identity and version, or `None`.
    pub fn get(
        &self,
        version: VersionTimestamp,
        identity: &[(&str, &str)],
    ) -> Result<Option<Document>, DocumentDaoError> {
        let mut filter = self.identity_filter(identity)?;
        filter.insert(VERSION_TIMESTAMP.to_string(), version.to_value());
        filter.insert(TIME_OF_REMOVAL.to_string(), Value::Null);
        self.collection
            .find_one(&filter)
            .map_err(|source| backend("get", source))
    }

    pub fn exists(
        &self,
        version: VersionTimestamp,
        identity: &[(&str, &str)],
    ) -> Result<bool, DocumentDaoError> {
        Ok(self.get(version, identity)?.is_some())
    }

    /// Live documents matching `filter`. The tombstone guard
    /// `time_of_removal == null` is injected automatically.
    pub fn find(
        &self,
        filter: Option<Filter>,
        projection: Option<Vec<String>>,
    ) -> Result<Vec<Document>, DocumentDaoError> {
        self.find_with(filter, projection, Vec::new(), None)
    }

    /// `find` with explicit sort and limit.
    pub fn find_with(
        &self,
        filter: Option<Filter>,
        projection: Option<Vec<String>>,
        sort: Vec<(String, SortOrder)>,
        limit: Option<usize>,
    ) -> Result<Vec<Document>, DocumentDaoError> {
        let mut filter = filter.unwrap_or_default();
        filter.insert(TIME_OF_REMOVAL.to_string(), Value::Null);
        let query = FindQuery {
            filter,
            projection,
            sort,
            limit,
        };
        self.collection
            .find(&query)
            .map_err(|source| backend("find", source))
    }

    /// Insert a new live document.
    ///
    /// Stamps `time_of_save` and a null `time_of_removal`. When the document
    /// carries no version, `versioning_on` selects between stamping
    /// `timestamp` and the unversioned `0` sentinel. Fails with
    /// `AlreadyExists` when the `(identity, version)` slot is live.
    pub fn add(
        &self,
        mut document: Document,
        timestamp: DateTime<Utc>,
        versioning_on: bool,
    ) -> Result<(), DocumentDaoError> {
        let identity_owned = self.identity_of(&document)?;
        let identity: Vec<(&str, &str)> = identity_owned
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        let version = match VersionTimestamp::from_value(document.get(VERSION_TIMESTAMP)) {
            Some(VersionTimestamp::Unversioned)
                if versioning_on && !has_version_field(&document) =>
            {
                VersionTimestamp::at(timestamp)
            }
            Some(version) => version,
            None => {
                return Err(DocumentDaoError::ArgumentType {
                    argument: VERSION_TIMESTAMP.to_string(),
                    expected: "an integer microsecond timestamp or the sentinel 0".to_string(),
                    actual: type_name(document.get(VERSION_TIMESTAMP)),
                })
            }
        };

        if self.exists(version, &identity)? {
            return Err(DocumentDaoError::AlreadyExists {
                collection: self.collection_name.clone(),
                identity: identity_string(&identity, Some(version)),
            });
        }

        document.insert(VERSION_TIMESTAMP.to_string(), version.to_value());
        document.insert(
            TIME_OF_SAVE.to_string(),
            Value::from(datetime_to_microseconds(&timestamp)),
        );
        document.insert(TIME_OF_REMOVAL.to_string(), Value::Null);

        tracing::debug!(
            collection = %self.collection_name,
            identity = %identity_string(&identity, Some(version)),
            "adding document"
        );
        self.collection
            .insert_one(document)
            .map_err(|source| backend("add", source))
    }

    /// Soft-delete the live document for this identity and version.
    ///
    /// The stored `time_of_removal` is bumped by 1µs until it is unique for
    /// the identity slot, so two removals can never collide. Returns the
    /// removal instant actually stored.
    pub fn mark_for_deletion(
        &self,
        timestamp: DateTime<Utc>,
        version: VersionTimestamp,
        identity: &[(&str, &str)],
    ) -> Result<DateTime<Utc>, DocumentDaoError> {
        if !self.exists(version, identity)? {
            return Err(DocumentDaoError::NotFound {
                collection: self.collection_name.clone(),
                identity: identity_string(identity, Some(version)),
            });
        }

        let mut removal_micros = datetime_to_microseconds(&timestamp);
        loop {
            let mut slot = self.identity_filter(identity)?;
            slot.insert(VERSION_TIMESTAMP.to_string(), version.to_value());
            slot.insert(TIME_OF_REMOVAL.to_string(), Value::from(removal_micros));
            let taken = self
                .collection
                .count(&slot)
                .map_err(|source| backend("mark_for_deletion", source))?;
            if taken == 0 {
                break;
            }
            removal_micros += 1;
        }

        let mut live = self.identity_filter(identity)?;
        live.insert(VERSION_TIMESTAMP.to_string(), version.to_value());
        live.insert(TIME_OF_REMOVAL.to_string(), Value::Null);

        let mut set = Document::new();
        set.insert(TIME_OF_REMOVAL.to_string(), Value::from(removal_micros));

        tracing::debug!(
            collection = %self.collection_name,
            identity = %identity_string(identity, Some(version)),
            time_of_removal = removal_micros,
            "marking document for deletion"
        );
        self.collection
            .update_one(&live, &set)
            .map_err(|source| backend("mark_for_deletion", source))?;
        Ok(strata_core::time::microseconds_to_datetime(removal_micros))
    }

    /// Tombstoned documents, most recently removed first. With a threshold,
    /// only those removed strictly before it.
    pub fn list_marked_for_deletion(
        &self,
        time_threshold: Option<DateTime<Utc>>,
    ) -> Result<Vec<Document>, DocumentDaoError> {
        let query = FindQuery {
            filter: tombstone_filter(time_threshold, ThresholdBound::Exclusive),
            projection: None,
            sort: vec![(TIME_OF_REMOVAL.to_string(), SortOrder::Descending)],
            limit: None,
        };
        self.collection
            .find(&query)
            .map_err(|source| backend("list_marked_for_deletion", source))
    }

    /// Clear the tombstone of the `nth_most_recent` removal for this
    /// identity, counted from the oldest removal upward.
    ///
    /// Fails with `AlreadyExists` when a live document occupies the
    /// candidate's version slot and `Range` when `n` is out of bounds. When
    /// `version` is given, only tombstones of that version are considered.
    /// Returns the restored document together with the removal instant that
    /// was cleared.
    pub fn restore(
        &self,
        version: Option<VersionTimestamp>,
        nth_most_recent: i64,
        identity: &[(&str, &str)],
    ) -> Result<(Document, DateTime<Utc>), DocumentDaoError> {
        let mut filter = self.identity_filter(identity)?;
        if let Some(version) = version {
            filter.insert(VERSION_TIMESTAMP.to_string(), version.to_value());
        }
        let mut not_null = Filter::new();
        not_null.insert("$ne".to_string(), Value::Null);
        filter.insert(TIME_OF_REMOVAL.to_string(), Value::Object(not_null));

        let query = FindQuery {
            filter,
            projection: None,
            sort: vec![(TIME_OF_REMOVAL.to_string(), SortOrder::Ascending)],
            limit: None,
        };
        let tombstones = self
            .collection
            .find(&query)
            .map_err(|source| backend("restore", source))?;

        if nth_most_recent < 1 || nth_most_recent as usize > tombstones.len() {
            return Err(DocumentDaoError::Range {
                requested: nth_most_recent,
                available: tombstones.len(),
                identity: identity_string(identity, version.as_ref().copied()),
            });
        }
        let candidate = &tombstones[nth_most_recent as usize - 1];

        let candidate_version = VersionTimestamp::from_value(candidate.get(VERSION_TIMESTAMP))
            .unwrap_or_default();
        if self.exists(candidate_version, identity)? {
            return Err(DocumentDaoError::AlreadyExists {
                collection: self.collection_name.clone(),
                identity: identity_string(identity, Some(candidate_version)),
            });
        }

        let removal_micros = candidate
            .get(TIME_OF_REMOVAL)
            .and_then(Value::as_i64)
            .unwrap_or_default();
        let mut slot = self.identity_filter(identity)?;
        slot.insert(VERSION_TIMESTAMP.to_string(), candidate_version.to_value());
        slot.insert(TIME_OF_REMOVAL.to_string(), Value::from(removal_micros));

        let mut set = Document::new();
        set.insert(TIME_OF_REMOVAL.to_string(), Value::Null);

        tracing::debug!(
            collection = %self.collection_name,
            identity = %identity_string(identity, Some(candidate_version)),
            "restoring document"
        );
        self.collection
            .update_one(&slot, &set)
            .map_err(|source| backend("restore", source))?;

        let mut restored = candidate.clone();
        restored.remove(strata_core::constants::INTERNAL_ID);
        restored.insert(TIME_OF_REMOVAL.to_string(), Value::Null);
        Ok((
            restored,
            strata_core::time::microseconds_to_datetime(removal_micros),
        ))
    }

    /// Clear one exact tombstone, addressed by its removal instant. Used to
    /// invert a recorded removal without disturbing older tombstones of the
    /// same identity.
    pub fn restore_exact(
        &self,
        version: VersionTimestamp,
        time_of_removal: DateTime<Utc>,
        identity: &[(&str, &str)],
    ) -> Result<(), DocumentDaoError> {
        if self.exists(version, identity)? {
            return Err(DocumentDaoError::AlreadyExists {
                collection: self.collection_name.clone(),
                identity: identity_string(identity, Some(version)),
            });
        }
        let mut slot = self.identity_filter(identity)?;
        slot.insert(VERSION_TIMESTAMP.to_string(), version.to_value());
        slot.insert(
            TIME_OF_REMOVAL.to_string(),
            Value::from(datetime_to_microseconds(&time_of_removal)),
        );
        let found = self
            .collection
            .count(&slot)
            .map_err(|source| backend("restore", source))?;
        if found == 0 {
            return Err(DocumentDaoError::NotFound {
                collection: self.collection_name.clone(),
                identity: identity_string(identity, Some(version)),
            });
        }

        let mut set = Document::new();
        set.insert(TIME_OF_REMOVAL.to_string(), Value::Null);
        self.collection
            .update_one(&slot, &set)
            .map_err(|source| backend("restore", source))?;
        Ok(())
    }

    /// Hard-delete tombstones; returns the count. With a threshold, only
    /// those removed at or before it are purged.
    pub fn purge(&self, time_threshold: Option<DateTime<Utc>>) -> Result<u64, DocumentDaoError> {
        let filter = tombstone_filter(time_threshold, ThresholdBound::Inclusive);
        let purged = self
            .collection
            .delete_many(&filter)
            .map_err(|source| backend("purge", source))?;
        tracing::debug!(collection = %self.collection_name, purged, "purged tombstones");
        Ok(purged)
    }

    // --- helpers ---

    /// Build the identity part of a filter, rejecting unknown or missing
    /// index fields.
    fn identity_filter(&self, identity: &[(&str, &str)]) -> Result<Filter, DocumentDaoError> {
        for (key, _) in identity {
            if !self.index_fields.iter().any(|f| f == key) {
                return Err(DocumentDaoError::ArgumentName {
                    argument: (*key).to_string(),
                    allowed: self.index_fields.join(", "),
                });
            }
        }
        let mut filter = Filter::new();
        for field in &self.index_fields {
            let value = identity
                .iter()
                .find(|(key, _)| key == field)
                .map(|(_, value)| *value)
                .ok_or_else(|| DocumentDaoError::ArgumentName {
                    argument: field.clone(),
                    allowed: self.index_fields.join(", "),
                })?;
            filter.insert(field.clone(), Value::from(value));
        }
        Ok(filter)
    }

    /// Extract the identity values from a document being added.
    fn identity_of(&self, document: &Document) -> Result<Vec<(String, String)>, DocumentDaoError> {
        let mut identity = Vec::with_capacity(self.index_fields.len());
        for field in &self.index_fields {
            match document.get(field) {
                Some(Value::String(value)) => identity.push((field.clone(), value.clone())),
                other => {
                    return Err(DocumentDaoError::ArgumentType {
                        argument: field.clone(),
                        expected: "a string index field".to_string(),
                        actual: type_name(other),
                    })
                }
            }
        }
        Ok(identity)
    }
}

enum ThresholdBound {
    Exclusive,
    Inclusive,
}

fn tombstone_filter(threshold: Option<DateTime<Utc>>, bound: ThresholdBound) -> Filter {
    let mut condition = Filter::new();
    condition.insert("$ne".to_string(), Value::Null);
    if let Some(threshold) = threshold {
        let op = match bound {
            ThresholdBound::Exclusive => "$lt",
            ThresholdBound::Inclusive => "$lte",
        };
        condition.insert(
            op.to_string(),
            Value::from(datetime_to_microseconds(&threshold)),
        );
    }
    let mut filter = Filter::new();
    filter.insert(TIME_OF_REMOVAL.to_string(), Value::Object(condition));
    filter
}

fn has_version_field(document: &Document) -> bool {
    matches!(document.get(VERSION_TIMESTAMP), Some(value) if !value.is_null())
}

fn identity_string(identity: &[(&str, &str)], version: Option<VersionTimestamp>) -> String {
    let mut parts: Vec<String> = identity
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect();
    if let Some(version) = version {
        parts.push(format!("{VERSION_TIMESTAMP}={version}"));
    }
    parts.join(", ")
}

fn type_name(value: Option<&Value>) -> String {
    match value {
        None => "missing".to_string(),
        Some(Value::Null) => "null".to_string(),
        Some(Value::Bool(_)) => "a boolean".to_string(),
        Some(Value::Number(_)) => "a number".to_string(),
        Some(Value::String(_)) => "a string".to_string(),
        Some(Value::Array(_)) => "an array".to_string(),
        Some(Value::Object(_)) => "an object".to_string(),
    }
}

fn backend(operation: &str, source: BackendError) -> DocumentDaoError {
    DocumentDaoError::Backend {
        operation: operation.to_string(),
        source,
    }
}
