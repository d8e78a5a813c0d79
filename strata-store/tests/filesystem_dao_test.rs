//! Filesystem DAO behavior: adapter dispatch, version series, tombstone
//! renames, restore, purge. Runs against the in-memory filesystem and spot
//! checks the local-disk one.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;

use strata_core::errors::{ErrorKind, FileDaoError};
use strata_core::models::{DataArray, DataObject, FileFormat, VersionTimestamp};
use strata_core::traits::{DataFileAdapter, FileSystem};
use strata_store::adapters::{AdapterRegistry, ChunkedArrayAdapter};
use strata_store::backends::{LocalFileSystem, MemoryFileSystem};
use strata_store::FileSystemDao;
use test_fixtures::{checkpoint_object, CheckpointAdapter};

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 8, 10, 12, 0, 0).unwrap()
}

fn t(seconds: i64) -> DateTime<Utc> {
    t0() + Duration::seconds(seconds)
}

fn registry_with_checkpoint() -> Arc<AdapterRegistry> {
    let registry = AdapterRegistry::with_builtins();
    registry.register(Arc::new(CheckpointAdapter::new()));
    Arc::new(registry)
}

fn bundle_dao() -> FileSystemDao {
    FileSystemDao::new(
        Arc::new(MemoryFileSystem::new()),
        registry_with_checkpoint(),
        FileFormat::array_bundle(),
    )
}

fn checkpoint_dao() -> FileSystemDao {
    FileSystemDao::new(
        Arc::new(MemoryFileSystem::new()),
        registry_with_checkpoint(),
        FileFormat::new("checkpoint"),
    )
}

fn test_array(schema_ref: &str, data_name: &str) -> DataObject {
    let mut array = DataArray::new(
        Some(data_name.to_string()),
        vec!["time".into()],
        vec![4],
        vec![1.0, 2.0, 3.0, 4.0],
    )
    .unwrap();
    array.attrs.insert("schema_ref".into(), json!(schema_ref));
    array.attrs.insert("data_name".into(), json!(data_name));
    array.attrs.insert("has_file".into(), json!(true));
    DataObject::Array(array)
}

fn versioned_checkpoint(data_name: &str, version: DateTime<Utc>, payload: &[u8]) -> DataObject {
    let mut object = checkpoint_object("model", data_name, payload);
    object.attrs_mut().insert(
        "version_timestamp".into(),
        json!(version.timestamp_micros()),
    );
    object
}

/// A checkpoint DAO holding ten versions at t+1s..t+10s.
fn populated_checkpoint_dao() -> FileSystemDao {
    let dao = checkpoint_dao();
    for i in 1..=10 {
        let object = versioned_checkpoint("test", t(i), format!("payload-{i}").as_bytes());
        dao.add(&object, None).unwrap();
    }
    dao
}

// ─── add / get (unversioned) ─────────────────────────────────────────────────

#[test]
fn add_then_get_unversioned_round_trips() {
    let dao = bundle_dao();
    let path = dao.add(&test_array("test", "test"), None).unwrap();
    assert_eq!(path, "test__test.nc");

    let read = dao
        .get("test", "test", VersionTimestamp::Unversioned, 1, None)
        .unwrap()
        .unwrap();
    assert_eq!(read, test_array("test", "test"));
}

#[test]
fn add_refuses_to_overwrite() {
    let dao = bundle_dao();
    dao.add(&test_array("test", "test"), None).unwrap();
    let err = dao.add(&test_array("test", "test"), None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
}

#[test]
fn add_with_mismatched_adapter_kind_is_an_argument_type_error() {
    let dao = bundle_dao();
    let err = dao
        .add(&checkpoint_object("model", "ckpt", b"bytes"), None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ArgumentType);
}

#[test]
fn add_without_identity_attrs_is_an_argument_value_error() {
    let dao = bundle_dao();
    let array = DataArray::new(None, vec!["t".into()], vec![1], vec![0.0]).unwrap();
    let err = dao.add(&DataObject::Array(array), None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ArgumentValue);
}

#[test]
fn reserved_identifiers_are_rejected() {
    let dao = bundle_dao();
    for bad in ["has__sep", "x_time_of_removal_y", "has space"] {
        let err = dao
            .get("test", bad, VersionTimestamp::Unversioned, 1, None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentValue, "for {bad:?}");
    }
}

#[test]
fn get_missing_file_returns_none() {
    let dao = bundle_dao();
    assert!(dao
        .get("not_a_schema", "nope", VersionTimestamp::Unversioned, 1, None)
        .unwrap()
        .is_none());
}

// ─── the chunked directory format ────────────────────────────────────────────

#[test]
fn chunked_directories_follow_the_same_lifecycle() {
    let fs: Arc<dyn FileSystem> = Arc::new(MemoryFileSystem::new());
    let dao = FileSystemDao::new(fs.clone(), registry_with_checkpoint(), FileFormat::chunked_array());
    let adapter: Arc<dyn DataFileAdapter> = Arc::new(ChunkedArrayAdapter::with_chunk_len(2));

    let path = dao.add(&test_array("spike_times", "t1"), Some(adapter.clone())).unwrap();
    assert_eq!(path, "spike_times__t1");
    assert!(fs.is_dir("spike_times__t1").unwrap());

    dao.mark_for_deletion(
        "spike_times",
        "t1",
        VersionTimestamp::Unversioned,
        t(1),
        Some(adapter.clone()),
    )
    .unwrap();
    assert!(!dao
        .exists("spike_times", "t1", VersionTimestamp::Unversioned, Some(adapter.clone()))
        .unwrap());

    dao.restore("spike_times", "t1", VersionTimestamp::Unversioned, 1, Some(adapter.clone()))
        .unwrap();
    let read = dao
        .get("spike_times", "t1", VersionTimestamp::Unversioned, 1, Some(adapter))
        .unwrap()
        .unwrap();
    assert_eq!(read, test_array("spike_times", "t1"));
}

// ─── versioned series ────────────────────────────────────────────────────────

#[test]
fn versioned_get_by_timestamp_and_by_nth() {
    let dao = populated_checkpoint_dao();

    // Exact version.
    let fifth = dao
        .get("model", "test", VersionTimestamp::at(t(5)), 1, None)
        .unwrap()
        .unwrap();
    let DataObject::Blob(checkpoint) = fifth else { panic!("expected a blob") };
    assert_eq!(checkpoint.bytes, b"payload-5");

    // Newest via the default lookup.
    let newest = dao
        .get("model", "test", VersionTimestamp::Unversioned, 1, None)
        .unwrap()
        .unwrap();
    let DataObject::Blob(checkpoint) = newest else { panic!("expected a blob") };
    assert_eq!(checkpoint.bytes, b"payload-10");

    // Walk the whole series from the tail.
    for n in 1..=10 {
        let object = dao
            .get("model", "test", VersionTimestamp::Unversioned, n, None)
            .unwrap()
            .unwrap();
        let DataObject::Blob(checkpoint) = object else { panic!("expected a blob") };
        assert_eq!(checkpoint.bytes, format!("payload-{}", 11 - n).into_bytes());
    }

    // Past the series: None.
    assert!(dao
        .get("model", "test", VersionTimestamp::Unversioned, 11, None)
        .unwrap()
        .is_none());
    // A version that was never written: None.
    assert!(dao
        .get("model", "test", VersionTimestamp::at(t(99)), 1, None)
        .unwrap()
        .is_none());
}

#[test]
fn n_versions_tracks_tombstoning_and_restore() {
    let dao = populated_checkpoint_dao();
    assert_eq!(dao.n_versions("model", "test", None).unwrap(), 10);

    dao.mark_for_deletion("model", "test", VersionTimestamp::at(t(10)), t(60), None)
        .unwrap();
    assert_eq!(dao.n_versions("model", "test", None).unwrap(), 9);
    // The other versions are still reachable.
    assert!(dao
        .get("model", "test", VersionTimestamp::at(t(9)), 1, None)
        .unwrap()
        .is_some());

    dao.restore("model", "test", VersionTimestamp::at(t(10)), 1, None)
        .unwrap();
    assert_eq!(dao.n_versions("model", "test", None).unwrap(), 10);
}

#[test]
fn n_versions_of_missing_identity_is_zero() {
    let dao = populated_checkpoint_dao();
    assert_eq!(dao.n_versions("model", "nope", None).unwrap(), 0);
}

#[test]
fn adding_a_new_version_extends_the_series() {
    let dao = populated_checkpoint_dao();
    let object = versioned_checkpoint("test", t(11), b"payload-11");
    dao.add(&object, None).unwrap();
    assert_eq!(dao.n_versions("model", "test", None).unwrap(), 11);

    // Re-adding the same version is refused.
    let err = dao
        .add(&versioned_checkpoint("test", t(11), b"other"), None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
}

// ─── mark_for_deletion / restore ─────────────────────────────────────────────

#[test]
fn mark_for_deletion_of_missing_file_is_not_found() {
    let dao = bundle_dao();
    let err = dao
        .mark_for_deletion("ghost", "ghost", VersionTimestamp::Unversioned, t(0), None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn tombstone_name_collision_is_already_exists() {
    let dao = bundle_dao();
    dao.add(&test_array("test", "test"), None).unwrap();
    dao.mark_for_deletion("test", "test", VersionTimestamp::Unversioned, t(1), None)
        .unwrap();
    dao.add(&test_array("test", "test"), None).unwrap();
    let err = dao
        .mark_for_deletion("test", "test", VersionTimestamp::Unversioned, t(1), None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
}

#[test]
fn restore_cycles_walk_back_through_tombstones() {
    let dao = bundle_dao();
    dao.add(&test_array("test", "test"), None).unwrap();
    for i in 0..5 {
        dao.mark_for_deletion("test", "test", VersionTimestamp::Unversioned, t(i), None)
            .unwrap();
        assert!(!dao
            .exists("test", "test", VersionTimestamp::Unversioned, None)
            .unwrap());
        dao.restore("test", "test", VersionTimestamp::Unversioned, 1, None)
            .unwrap();
        assert!(dao
            .exists("test", "test", VersionTimestamp::Unversioned, None)
            .unwrap());
    }
}

#[test]
fn restore_of_live_or_missing_file_is_a_range_error() {
    let dao = bundle_dao();
    dao.add(&test_array("test", "test"), None).unwrap();
    // Live, never removed.
    assert_eq!(
        dao.restore("test", "test", VersionTimestamp::Unversioned, 1, None)
            .unwrap_err()
            .kind(),
        ErrorKind::Range
    );
    // Never existed.
    assert_eq!(
        dao.restore("ghost", "ghost", VersionTimestamp::Unversioned, 1, None)
            .unwrap_err()
            .kind(),
        ErrorKind::Range
    );
}

#[test]
fn restore_with_a_live_replacement_is_already_exists() {
    let dao = bundle_dao();
    dao.add(&test_array("test", "test"), None).unwrap();
    dao.mark_for_deletion("test", "test", VersionTimestamp::Unversioned, t(1), None)
        .unwrap();
    dao.add(&test_array("test", "test"), None).unwrap();
    let err = dao
        .restore("test", "test", VersionTimestamp::Unversioned, 1, None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
}

// ─── list / purge ────────────────────────────────────────────────────────────

#[test]
fn list_marked_reports_identity_and_removal_time_in_order() {
    let dao = bundle_dao();
    for (i, name) in ["a1", "a2", "a3"].into_iter().enumerate() {
        dao.add(&test_array("test", name), None).unwrap();
        dao.mark_for_deletion("test", name, VersionTimestamp::Unversioned, t(i as i64), None)
            .unwrap();
    }
    let listed = dao.list_marked_for_deletion(None, None).unwrap();
    assert_eq!(listed.len(), 3);
    assert_eq!(listed[0].data_name, "a1");
    assert_eq!(listed[2].data_name, "a3");
    assert_eq!(listed[1].time_of_removal, t(1));
    assert_eq!(listed[0].file_format, FileFormat::array_bundle());

    // Strictly-before threshold.
    assert_eq!(dao.list_marked_for_deletion(Some(t(1)), None).unwrap().len(), 1);
}

#[test]
fn purge_is_inclusive_and_counts() {
    let dao = bundle_dao();
    for (i, name) in ["a1", "a2", "a3"].into_iter().enumerate() {
        dao.add(&test_array("test", name), None).unwrap();
        dao.mark_for_deletion("test", name, VersionTimestamp::Unversioned, t(i as i64), None)
            .unwrap();
    }
    assert_eq!(dao.purge(Some(t(1)), None).unwrap(), 2);
    assert_eq!(dao.purge(None, None).unwrap(), 1);
    assert_eq!(dao.purge(None, None).unwrap(), 0);
    assert!(dao.list_marked_for_deletion(None, None).unwrap().is_empty());
}

#[test]
fn purge_covers_every_registered_format() {
    let fs: Arc<dyn FileSystem> = Arc::new(MemoryFileSystem::new());
    let registry = registry_with_checkpoint();
    let dao = FileSystemDao::new(fs, registry.clone(), FileFormat::array_bundle());
    let checkpoint_adapter = registry.get(&FileFormat::new("checkpoint")).unwrap();

    dao.add(&test_array("test", "arr"), None).unwrap();
    dao.add(&checkpoint_object("model", "ckpt", b"bytes"), Some(checkpoint_adapter.clone()))
        .unwrap();
    dao.mark_for_deletion("test", "arr", VersionTimestamp::Unversioned, t(1), None)
        .unwrap();
    dao.mark_for_deletion(
        "model",
        "ckpt",
        VersionTimestamp::Unversioned,
        t(2),
        Some(checkpoint_adapter),
    )
    .unwrap();

    assert_eq!(dao.list_marked_for_deletion(None, None).unwrap().len(), 2);
    assert_eq!(dao.purge(None, None).unwrap(), 2);
}

// ─── millisecond fallback ────────────────────────────────────────────────────

#[test]
fn millisecond_fallback_is_off_by_default_and_opt_in() {
    let fs: Arc<dyn FileSystem> = Arc::new(MemoryFileSystem::new());
    let registry = registry_with_checkpoint();
    let strict = FileSystemDao::new(fs.clone(), registry.clone(), FileFormat::new("checkpoint"));
    let relaxed = FileSystemDao::new(fs, registry, FileFormat::new("checkpoint"))
        .with_millisecond_fallback(true);

    let written = t(1) + Duration::microseconds(250);
    strict
        .add(&versioned_checkpoint("test", written, b"payload"), None)
        .unwrap();

    // Same millisecond, different microsecond.
    let near_miss = t(1) + Duration::microseconds(900);
    assert!(strict
        .get("model", "test", VersionTimestamp::at(near_miss), 1, None)
        .unwrap()
        .is_none());
    assert!(relaxed
        .get("model", "test", VersionTimestamp::at(near_miss), 1, None)
        .unwrap()
        .is_some());

    // A different millisecond misses either way.
    let far_miss = t(1) + Duration::milliseconds(2);
    assert!(relaxed
        .get("model", "test", VersionTimestamp::at(far_miss), 1, None)
        .unwrap()
        .is_none());
}

// ─── local disk parity ───────────────────────────────────────────────────────

#[test]
fn the_local_filesystem_supports_the_full_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let fs: Arc<dyn FileSystem> = Arc::new(LocalFileSystem::new(dir.path()));
    let dao = FileSystemDao::new(fs, registry_with_checkpoint(), FileFormat::array_bundle());

    dao.add(&test_array("test", "disk"), None).unwrap();
    assert!(dir.path().join("test__disk.nc").exists());

    dao.mark_for_deletion("test", "disk", VersionTimestamp::Unversioned, t(1), None)
        .unwrap();
    assert!(!dir.path().join("test__disk.nc").exists());

    dao.restore("test", "disk", VersionTimestamp::Unversioned, 1, None)
        .unwrap();
    let read = dao
        .get("test", "disk", VersionTimestamp::Unversioned, 1, None)
        .unwrap()
        .unwrap();
    assert_eq!(read, test_array("test", "disk"));

    dao.mark_for_deletion("test", "disk", VersionTimestamp::Unversioned, t(2), None)
        .unwrap();
    assert_eq!(dao.purge(None, None).unwrap(), 1);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn corrupt_payloads_surface_as_uncaught() {
    let dao = bundle_dao();
    let path = dao.add(&test_array("test", "test"), None).unwrap();
    let fs = dao.filesystem().clone();
    let mut bytes = fs.read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    fs.delete(&path).unwrap();
    fs.write_new(&path, &bytes).unwrap();

    let err = dao
        .get("test", "test", VersionTimestamp::Unversioned, 1, None)
        .unwrap_err();
    assert!(matches!(err, FileDaoError::Corrupt { .. }));
    assert_eq!(err.kind(), ErrorKind::Uncaught);
}
