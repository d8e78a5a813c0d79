//! In-memory object DAO: process-local handles keyed by string tag, with
//! soft-deletion that moves the binding instead of cloning the object.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use strata_core::errors::MemoryDaoError;

/// A shared handle to a live process-local object. The UUID is the object's
/// identity: a handle re-registered under a second tag is rejected, while a
/// distinct handle wrapping equal data is not.
#[derive(Clone)]
pub struct ObjectHandle {
    id: Uuid,
    value: Arc<dyn Any + Send + Sync>,
}

impl ObjectHandle {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        ObjectHandle {
            id: Uuid::new_v4(),
            value: Arc::new(value),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }
}

impl std::fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectHandle({})", self.id)
    }
}

/// A removed binding, recoverable until purged.
#[derive(Clone)]
struct RemovedObject {
    handle: ObjectHandle,
    time_of_removal: DateTime<Utc>,
}

/// Entry reported by `list_marked_for_deletion`.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedEntry {
    pub tag: String,
    pub object_id: Uuid,
    pub time_of_removal: DateTime<Utc>,
}

/// Tag-keyed map of live handles plus a tag-keyed map of removed ones.
#[derive(Default)]
pub struct InMemoryObjectDao {
    objects: HashMap<String, ObjectHandle>,
    removed: HashMap<String, RemovedObject>,
}

impl InMemoryObjectDao {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tag: &str) -> Option<ObjectHandle> {
        self.objects.get(tag).cloned()
    }

    pub fn exists(&self, tag: &str) -> bool {
        self.objects.contains_key(tag)
    }

    /// Live tags matching a predicate.
    pub fn find(&self, predicate: impl Fn(&str) -> bool) -> Vec<String> {
        let mut tags: Vec<String> = self
            .objects
            .keys()
            .filter(|tag| predicate(tag))
            .cloned()
            .collect();
        tags.sort();
        tags
    }

    /// Register a handle under a tag. Rejects a taken tag, and a handle that
    /// is already registered (live or removed) under any tag.
    pub fn add(&mut self, tag: &str, handle: ObjectHandle) -> Result<(), MemoryDaoError> {
        validate_tag(tag)?;
        if self.objects.contains_key(tag) || self.removed.contains_key(tag) {
            return Err(MemoryDaoError::TagAlreadyExists {
                tag: tag.to_string(),
            });
        }
        let registered = self
            .objects
            .values()
            .map(|h| h.id)
            .chain(self.removed.values().map(|r| r.handle.id))
            .any(|id| id == handle.id);
        if registered {
            return Err(MemoryDaoError::ObjectAlreadyExists {
                object_id: handle.id.to_string(),
                tag: tag.to_string(),
            });
        }
        self.objects.insert(tag.to_string(), handle);
        Ok(())
    }

    /// Drop a live binding entirely, leaving no tombstone. Used when an add
    /// is being undone: rolling back must leave no trace of the tag.
    pub fn discard(&mut self, tag: &str) -> Result<(), MemoryDaoError> {
        validate_tag(tag)?;
        self.objects
            .remove(tag)
            .map(|_| ())
            .ok_or_else(|| MemoryDaoError::NotFound {
                tag: tag.to_string(),
            })
    }

    /// Move the binding to the removed map. The handle itself is untouched,
    /// so external clones keep working.
    pub fn mark_for_deletion(
        &mut self,
        tag: &str,
        time_of_removal: DateTime<Utc>,
    ) -> Result<(), MemoryDaoError> {
        validate_tag(tag)?;
        let handle = self
            .objects
            .remove(tag)
            .ok_or_else(|| MemoryDaoError::NotFound {
                tag: tag.to_string(),
            })?;
        self.removed.insert(
            tag.to_string(),
            RemovedObject {
                handle,
                time_of_removal,
            },
        );
        Ok(())
    }

    /// Removed bindings ordered by removal time ascending. With a threshold,
    /// only those removed strictly before it.
    pub fn list_marked_for_deletion(
        &self,
        time_threshold: Option<DateTime<Utc>>,
    ) -> Vec<RemovedEntry> {
        let mut entries: Vec<RemovedEntry> = self
            .removed
            .iter()
            .filter(|(_, removed)| match time_threshold {
                Some(threshold) => removed.time_of_removal < threshold,
                None => true,
            })
            .map(|(tag, removed)| RemovedEntry {
                tag: tag.clone(),
                object_id: removed.handle.id,
                time_of_removal: removed.time_of_removal,
            })
            .collect();
        entries.sort_by_key(|entry| entry.time_of_removal);
        entries
    }

    /// Move a removed binding back to the live map.
    pub fn restore(&mut self, tag: &str) -> Result<(), MemoryDaoError> {
        validate_tag(tag)?;
        if self.objects.contains_key(tag) {
            return Err(MemoryDaoError::TagAlreadyExists {
                tag: tag.to_string(),
            });
        }
        let removed = self
            .removed
            .remove(tag)
            .ok_or_else(|| MemoryDaoError::NotFound {
                tag: tag.to_string(),
            })?;
        self.objects.insert(tag.to_string(), removed.handle);
        Ok(())
    }

    /// Drop removed bindings; returns the count. With a threshold, only
    /// those removed at or before it.
    pub fn purge(&mut self, time_threshold: Option<DateTime<Utc>>) -> u64 {
        let before = self.removed.len();
        match time_threshold {
            None => self.removed.clear(),
            Some(threshold) => self
                .removed
                .retain(|_, removed| removed.time_of_removal > threshold),
        }
        (before - self.removed.len()) as u64
    }
}

fn validate_tag(tag: &str) -> Result<(), MemoryDaoError> {
    if tag.is_empty() {
        return Err(MemoryDaoError::ArgumentValue {
            argument: "tag".to_string(),
            message: "must be a non-empty string".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, second).unwrap()
    }

    #[test]
    fn add_get_round_trip_preserves_the_object() {
        let mut dao = InMemoryObjectDao::new();
        dao.add("weights", ObjectHandle::new(vec![1.0f64, 2.0])).unwrap();
        let handle = dao.get("weights").unwrap();
        assert_eq!(handle.downcast_ref::<Vec<f64>>(), Some(&vec![1.0, 2.0]));
    }

    #[test]
    fn duplicate_tag_and_duplicate_handle_are_rejected() {
        let mut dao = InMemoryObjectDao::new();
        let handle = ObjectHandle::new(42i64);
        dao.add("answer", handle.clone()).unwrap();

        let err = dao.add("answer", ObjectHandle::new(0i64)).unwrap_err();
        assert!(matches!(err, MemoryDaoError::TagAlreadyExists { .. }));

        let err = dao.add("other", handle).unwrap_err();
        assert!(matches!(err, MemoryDaoError::ObjectAlreadyExists { .. }));

        // An equal but distinct object is a different identity.
        dao.add("other", ObjectHandle::new(42i64)).unwrap();
    }

    #[test]
    fn mark_for_deletion_moves_the_reference_without_cloning() {
        let mut dao = InMemoryObjectDao::new();
        let handle = ObjectHandle::new(String::from("live"));
        let external = handle.clone();
        dao.add("model", handle).unwrap();

        dao.mark_for_deletion("model", t(1)).unwrap();
        assert!(!dao.exists("model"));
        assert!(dao.get("model").is_none());
        // The external clone still reaches the same object.
        assert_eq!(external.downcast_ref::<String>().map(String::as_str), Some("live"));

        let listed = dao.list_marked_for_deletion(None);
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].object_id, external.id());
    }

    #[test]
    fn mark_for_deletion_of_missing_tag_is_not_found() {
        let mut dao = InMemoryObjectDao::new();
        let err = dao.mark_for_deletion("ghost", t(0)).unwrap_err();
        assert!(matches!(err, MemoryDaoError::NotFound { .. }));
    }

    #[test]
    fn restore_is_the_inverse_of_mark_for_deletion() {
        let mut dao = InMemoryObjectDao::new();
        let handle = ObjectHandle::new(7u32);
        let id = handle.id();
        dao.add("x", handle).unwrap();
        dao.mark_for_deletion("x", t(1)).unwrap();
        dao.restore("x").unwrap();
        assert_eq!(dao.get("x").unwrap().id(), id);
    }

    #[test]
    fn restore_errors_when_live_or_never_removed() {
        let mut dao = InMemoryObjectDao::new();
        dao.add("x", ObjectHandle::new(1u8)).unwrap();
        assert!(matches!(
            dao.restore("x").unwrap_err(),
            MemoryDaoError::TagAlreadyExists { .. }
        ));
        assert!(matches!(
            dao.restore("ghost").unwrap_err(),
            MemoryDaoError::NotFound { .. }
        ));
    }

    #[test]
    fn list_is_ordered_and_respects_the_threshold() {
        let mut dao = InMemoryObjectDao::new();
        for (i, tag) in ["a", "b", "c"].iter().enumerate() {
            dao.add(tag, ObjectHandle::new(i)).unwrap();
            dao.mark_for_deletion(tag, t(i as u32 + 1)).unwrap();
        }
        let all = dao.list_marked_for_deletion(None);
        assert_eq!(
            all.iter().map(|e| e.tag.as_str()).collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
        let some = dao.list_marked_for_deletion(Some(t(3)));
        assert_eq!(some.len(), 2);
    }

    #[test]
    fn purge_counts_and_respects_the_threshold() {
        let mut dao = InMemoryObjectDao::new();
        for (i, tag) in ["a", "b", "c"].iter().enumerate() {
            dao.add(tag, ObjectHandle::new(i)).unwrap();
            dao.mark_for_deletion(tag, t(i as u32 + 1)).unwrap();
        }
        assert_eq!(dao.purge(Some(t(2))), 2);
        assert_eq!(dao.purge(None), 1);
        assert_eq!(dao.purge(None), 0);
    }

    #[test]
    fn find_filters_live_tags() {
        let mut dao = InMemoryObjectDao::new();
        dao.add("model_a", ObjectHandle::new(1)).unwrap();
        dao.add("model_b", ObjectHandle::new(2)).unwrap();
        dao.add("scratch", ObjectHandle::new(3)).unwrap();
        assert_eq!(
            dao.find(|tag| tag.starts_with("model_")),
            vec!["model_a", "model_b"]
        );
    }
}
