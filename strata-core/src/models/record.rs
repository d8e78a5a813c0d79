//! A JSON-like record document with managed timestamp fields.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::constants::{
    DATA_NAME, HAS_FILE, SCHEMA_REF, TIME_OF_REMOVAL, TIME_OF_SAVE, VERSION_TIMESTAMP,
};
use crate::models::VersionTimestamp;
use crate::time::microseconds_to_datetime;

/// A record: a JSON object with a mandatory `schema_ref` and `data_name`,
/// optional `version_timestamp` and `has_file`, and implementation-managed
/// `time_of_save`/`time_of_removal` fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new(fields: Map<String, Value>) -> Self {
        Record(fields)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn fields_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.0
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn schema_ref(&self) -> Option<&str> {
        self.0.get(SCHEMA_REF).and_then(Value::as_str)
    }

    pub fn data_name(&self) -> Option<&str> {
        self.0.get(DATA_NAME).and_then(Value::as_str)
    }

    pub fn has_file(&self) -> bool {
        self.0.get(HAS_FILE).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn version_timestamp(&self) -> Option<VersionTimestamp> {
        VersionTimestamp::from_value(self.0.get(VERSION_TIMESTAMP))
    }

    pub fn time_of_save(&self) -> Option<DateTime<Utc>> {
        micros_field(&self.0, TIME_OF_SAVE)
    }

    pub fn time_of_removal(&self) -> Option<DateTime<Utc>> {
        micros_field(&self.0, TIME_OF_REMOVAL)
    }

    /// A copy with the managed timestamp fields removed, e.g. before
    /// re-adding a document retrieved from the store.
    pub fn without_managed_fields(&self) -> Record {
        let mut fields = self.0.clone();
        fields.remove(TIME_OF_SAVE);
        fields.remove(TIME_OF_REMOVAL);
        Record(fields)
    }

    /// The non-managed field names, i.e. those subject to per-property
    /// schema validation.
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.0
            .keys()
            .map(String::as_str)
            .filter(|k| *k != TIME_OF_SAVE && *k != TIME_OF_REMOVAL && *k != VERSION_TIMESTAMP)
    }
}

fn micros_field(fields: &Map<String, Value>, key: &str) -> Option<DateTime<Utc>> {
    fields
        .get(key)
        .and_then(Value::as_i64)
        .map(microseconds_to_datetime)
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Record(fields)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Object(record.0)
    }
}

impl TryFrom<Value> for Record {
    type Error = Value;

    /// Accepts only JSON objects; returns the original value otherwise.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Ok(Record(fields)),
            other => Err(other),
        }
    }
}
