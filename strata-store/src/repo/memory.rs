//! In-memory object repository: the in-memory DAO plus an operation history
//! so transient handles participate in rollback.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::Value;

use strata_core::constants::MEMORY_COLLECTION;
use strata_core::errors::MemoryRepoError;
use strata_core::models::{OperationEntry, OperationKind};
use strata_core::time::MonotonicClock;

use crate::dao::{InMemoryObjectDao, ObjectHandle, RemovedEntry};

pub struct InMemoryObjectRepository {
    dao: Arc<Mutex<InMemoryObjectDao>>,
    clock: Arc<MonotonicClock>,
    history: Mutex<Vec<OperationEntry>>,
}

impl InMemoryObjectRepository {
    pub fn new(dao: Arc<Mutex<InMemoryObjectDao>>, clock: Arc<MonotonicClock>) -> Self {
        InMemoryObjectRepository {
            dao,
            clock,
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn get(&self, tag: &str) -> Option<ObjectHandle> {
        lock(&self.dao).get(tag)
    }

    pub fn exists(&self, tag: &str) -> bool {
        lock(&self.dao).exists(tag)
    }

    /// Live tags matching a predicate.
    pub fn find(&self, predicate: impl Fn(&str) -> bool) -> Vec<String> {
        lock(&self.dao).find(predicate)
    }

    pub fn add(&self, tag: &str, handle: ObjectHandle) -> Result<(), MemoryRepoError> {
        let timestamp = self.clock.now();
        lock(&self.dao).add(tag, handle)?;
        self.push_entry(OperationEntry::new(
            timestamp,
            MEMORY_COLLECTION,
            OperationKind::Added,
            identity_map(tag),
        ));
        Ok(())
    }

    pub fn remove(&self, tag: &str) -> Result<(), MemoryRepoError> {
        let timestamp = self.clock.now();
        lock(&self.dao).mark_for_deletion(tag, timestamp)?;
        self.push_entry(OperationEntry::new(
            timestamp,
            MEMORY_COLLECTION,
            OperationKind::Removed,
            identity_map(tag),
        ));
        Ok(())
    }

    pub fn restore(&self, tag: &str) -> Result<(), MemoryRepoError> {
        Ok(lock(&self.dao).restore(tag)?)
    }

    pub fn list_marked_for_deletion(
        &self,
        time_threshold: Option<DateTime<Utc>>,
    ) -> Vec<RemovedEntry> {
        lock(&self.dao).list_marked_for_deletion(time_threshold)
    }

    pub fn purge(&self, time_threshold: Option<DateTime<Utc>>) -> u64 {
        lock(&self.dao).purge(time_threshold)
    }

    /// Invert the most recent pending mutation. The entry is popped only
    /// after the inversion succeeded.
    pub fn undo(&self) -> Result<Option<OperationEntry>, MemoryRepoError> {
        let Some(entry) = self.peek_entry() else {
            return Ok(None);
        };
        let tag = entry
            .identity_field("tag")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        match entry.kind() {
            // Undoing an add leaves no trace, so the tag is free again.
            OperationKind::Added => {
                lock(&self.dao).discard(&tag)?;
            }
            OperationKind::Removed => {
                lock(&self.dao).restore(&tag)?;
            }
        }
        Ok(self.pop_entry())
    }

    /// Invert every pending mutation, newest first.
    pub fn undo_all(&self) -> Result<Vec<OperationEntry>, MemoryRepoError> {
        let mut undone = Vec::new();
        while let Some(entry) = self.undo()? {
            undone.push(entry);
        }
        Ok(undone)
    }

    pub fn operation_history(&self) -> Vec<OperationEntry> {
        lock(&self.history).clone()
    }

    pub fn clear_operation_history(&self) {
        lock(&self.history).clear();
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

fn identity_map(tag: &str) -> BTreeMap<String, Value> {
    let mut identity = BTreeMap::new();
    identity.insert("tag".to_string(), Value::from(tag));
    identity
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
