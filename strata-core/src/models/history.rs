//! Operation-history entries: the value objects a rollback replays.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::models::FileFormat;

/// What a history entry records having happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Added,
    Removed,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Added => f.write_str("added"),
            OperationKind::Removed => f.write_str("removed"),
        }
    }
}

/// One reversible mutation. Carries everything needed to invert it: the
/// identity fields, whether a data file was involved and in which format.
/// Holds no reference to the documents themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationEntry {
    timestamp: DateTime<Utc>,
    collection: String,
    kind: OperationKind,
    identity: BTreeMap<String, Value>,
    has_file: bool,
    file_format: Option<FileFormat>,
}

impl OperationEntry {
    pub fn new(
        timestamp: DateTime<Utc>,
        collection: impl Into<String>,
        kind: OperationKind,
        identity: BTreeMap<String, Value>,
    ) -> Self {
        OperationEntry {
            timestamp,
            collection: collection.into(),
            kind,
            identity,
            has_file: false,
            file_format: None,
        }
    }

    pub fn with_file(mut self, file_format: Option<FileFormat>) -> Self {
        self.has_file = true;
        self.file_format = file_format;
        self
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Defensive copy of the identity fields.
    pub fn identity(&self) -> BTreeMap<String, Value> {
        self.identity.clone()
    }

    pub fn identity_field(&self, key: &str) -> Option<&Value> {
        self.identity.get(key)
    }

    pub fn has_file(&self) -> bool {
        self.has_file
    }

    pub fn file_format(&self) -> Option<&FileFormat> {
        self.file_format.as_ref()
    }
}

impl Eq for OperationEntry {}

impl PartialOrd for OperationEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OperationEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.timestamp.cmp(&other.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn entry(second: u32, kind: OperationKind) -> OperationEntry {
        let mut identity = BTreeMap::new();
        identity.insert("schema_name".to_string(), json!("animal"));
        OperationEntry::new(
            Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, second).unwrap(),
            "domain_models",
            kind,
            identity,
        )
    }

    #[test]
    fn entries_order_by_timestamp() {
        let older = entry(1, OperationKind::Added);
        let newer = entry(2, OperationKind::Removed);
        assert!(older < newer);
    }

    #[test]
    fn identity_is_copied_defensively() {
        let e = entry(1, OperationKind::Added);
        let mut copy = e.identity();
        copy.insert("schema_name".to_string(), json!("mutated"));
        assert_eq!(e.identity_field("schema_name"), Some(&json!("animal")));
    }

    #[test]
    fn with_file_marks_the_entry() {
        let e = entry(1, OperationKind::Added).with_file(Some(FileFormat::array_bundle()));
        assert!(e.has_file());
        assert_eq!(e.file_format().unwrap().as_str(), "array-bundle");
    }
}
