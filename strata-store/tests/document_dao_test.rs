//! Document DAO behavior: soft-deletion, versioning, restore ordering,
//! argument checking, purge thresholds.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};

use strata_core::errors::{DocumentDaoError, ErrorKind};
use strata_core::traits::{Document, DocumentDatabase, DocumentStore, Filter};
use strata_core::VersionTimestamp;
use strata_store::backends::{MemoryDocumentStore, SqliteDocumentStore};
use strata_store::DocumentDao;

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 8, 10, 12, 0, 0).unwrap()
}

fn t(seconds: i64) -> DateTime<Utc> {
    t0() + Duration::seconds(seconds)
}

fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

fn model_doc(schema_name: &str, title: &str) -> Document {
    doc(json!({
        "schema_name": schema_name,
        "schema_title": title,
        "schema_type": "property_model",
    }))
}

fn models_dao() -> DocumentDao {
    let store = MemoryDocumentStore::new();
    let collection = store.database("proj").collection("domain_models");
    DocumentDao::new(collection, vec!["schema_name".to_string()]).unwrap()
}

fn populated_dao() -> DocumentDao {
    let dao = models_dao();
    for (i, name) in ["dimension_of_measure", "record_metamodel", "spike_waveforms"]
        .into_iter()
        .enumerate()
    {
        dao.add(model_doc(name, "Some Title"), t(i as i64), false).unwrap();
    }
    dao
}

// ─── get / exists / find ─────────────────────────────────────────────────────

#[test]
fn get_returns_the_live_document_with_stamped_fields() {
    let dao = populated_dao();
    let found = dao
        .get(
            VersionTimestamp::Unversioned,
            &[("schema_name", "dimension_of_measure")],
        )
        .unwrap()
        .unwrap();
    assert_eq!(found.get("schema_name"), Some(&json!("dimension_of_measure")));
    assert_eq!(found.get("time_of_save"), Some(&json!(t(0).timestamp_micros())));
    assert_eq!(found.get("time_of_removal"), Some(&Value::Null));
    assert_eq!(found.get("version_timestamp"), Some(&json!(0)));
    assert!(!found.contains_key("_id"));
}

#[test]
fn get_missing_identity_returns_none_never_errors() {
    let dao = populated_dao();
    assert!(dao
        .get(VersionTimestamp::Unversioned, &[("schema_name", "not_a_schema")])
        .unwrap()
        .is_none());
}

#[test]
fn get_with_unknown_index_field_is_an_argument_name_error() {
    let dao = populated_dao();
    let err = dao
        .get(VersionTimestamp::Unversioned, &[("nope", "x")])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ArgumentName);
}

#[test]
fn exists_reflects_liveness_only() {
    let dao = populated_dao();
    assert!(dao
        .exists(VersionTimestamp::Unversioned, &[("schema_name", "record_metamodel")])
        .unwrap());
    dao.mark_for_deletion(
        t(10),
        VersionTimestamp::Unversioned,
        &[("schema_name", "record_metamodel")],
    )
    .unwrap();
    assert!(!dao
        .exists(VersionTimestamp::Unversioned, &[("schema_name", "record_metamodel")])
        .unwrap());
}

#[test]
fn find_excludes_tombstones_and_strips_ids() {
    let dao = populated_dao();
    dao.mark_for_deletion(
        t(10),
        VersionTimestamp::Unversioned,
        &[("schema_name", "spike_waveforms")],
    )
    .unwrap();
    let found = dao.find(None, None).unwrap();
    assert_eq!(found.len(), 2);
    for document in &found {
        assert_eq!(document.get("time_of_removal"), Some(&Value::Null));
        assert!(!document.contains_key("_id"));
    }
}

#[test]
fn find_with_filter_and_projection() {
    let dao = populated_dao();
    let mut filter = Filter::new();
    filter.insert("schema_name".to_string(), json!("record_metamodel"));
    let found = dao
        .find(Some(filter), Some(vec!["schema_name".to_string()]))
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0], doc(json!({"schema_name": "record_metamodel"})));
}

#[test]
fn find_with_unmatched_filter_returns_empty() {
    let dao = populated_dao();
    let mut filter = Filter::new();
    filter.insert("schema_type".to_string(), json!("not_a_value"));
    assert!(dao.find(Some(filter), None).unwrap().is_empty());
}

// ─── add ─────────────────────────────────────────────────────────────────────

#[test]
fn add_of_live_identity_is_already_exists() {
    let dao = populated_dao();
    let err = dao
        .add(model_doc("dimension_of_measure", "Again"), t(5), false)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    assert!(matches!(err, DocumentDaoError::AlreadyExists { .. }));
}

#[test]
fn add_without_index_field_is_an_argument_type_error() {
    let dao = models_dao();
    let err = dao
        .add(doc(json!({"schema_title": "No Name"})), t(0), false)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ArgumentType);
}

#[test]
fn add_with_versioning_stamps_the_timestamp() {
    let store = MemoryDocumentStore::new();
    let dao = DocumentDao::new(
        store.database("proj").collection("records"),
        vec!["schema_ref".to_string(), "data_name".to_string()],
    )
    .unwrap();
    let record = doc(json!({"schema_ref": "numpy_test", "data_name": "numpy_test"}));
    dao.add(record, t(1), true).unwrap();

    let version = VersionTimestamp::at(t(1));
    let found = dao
        .get(
            version,
            &[("schema_ref", "numpy_test"), ("data_name", "numpy_test")],
        )
        .unwrap()
        .unwrap();
    assert_eq!(
        found.get("version_timestamp"),
        Some(&json!(t(1).timestamp_micros()))
    );
}

#[test]
fn add_without_versioning_uses_the_zero_sentinel() {
    let dao = models_dao();
    dao.add(model_doc("animal", "Animal"), t(0), false).unwrap();
    let found = dao
        .get(VersionTimestamp::Unversioned, &[("schema_name", "animal")])
        .unwrap()
        .unwrap();
    assert_eq!(found.get("version_timestamp"), Some(&json!(0)));
}

#[test]
fn versions_of_one_identity_coexist() {
    let store = MemoryDocumentStore::new();
    let dao = DocumentDao::new(
        store.database("proj").collection("records"),
        vec!["schema_ref".to_string(), "data_name".to_string()],
    )
    .unwrap();
    let identity = [("schema_ref", "numpy_test"), ("data_name", "numpy_test")];
    for i in 1..=10 {
        let record = doc(json!({"schema_ref": "numpy_test", "data_name": "numpy_test", "v": i}));
        dao.add(record, t(i), true).unwrap();
    }
    for i in 1..=10 {
        let found = dao.get(VersionTimestamp::at(t(i)), &identity).unwrap().unwrap();
        assert_eq!(found.get("v"), Some(&json!(i)));
    }
    // The same version slot rejects a duplicate.
    let record = doc(json!({
        "schema_ref": "numpy_test",
        "data_name": "numpy_test",
        "version_timestamp": t(5).timestamp_micros(),
    }));
    assert_eq!(
        dao.add(record, t(20), true).unwrap_err().kind(),
        ErrorKind::AlreadyExists
    );
}

// ─── mark_for_deletion ───────────────────────────────────────────────────────

#[test]
fn mark_for_deletion_of_missing_identity_is_not_found() {
    let dao = populated_dao();
    let err = dao
        .mark_for_deletion(
            t(1),
            VersionTimestamp::Unversioned,
            &[("schema_name", "not_a_schema")],
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn colliding_removal_timestamps_are_bumped_to_stay_unique() {
    let dao = models_dao();
    let identity = [("schema_name", "animal")];
    dao.add(model_doc("animal", "Animal"), t(0), false).unwrap();
    let first = dao
        .mark_for_deletion(t(1), VersionTimestamp::Unversioned, &identity)
        .unwrap();
    dao.add(model_doc("animal", "Animal"), t(0), false).unwrap();
    let second = dao
        .mark_for_deletion(t(1), VersionTimestamp::Unversioned, &identity)
        .unwrap();
    assert_eq!(first, t(1));
    assert_eq!(second, t(1) + Duration::microseconds(1));
}

// ─── list_marked_for_deletion ────────────────────────────────────────────────

#[test]
fn list_marked_is_descending_and_respects_the_threshold() {
    let dao = populated_dao();
    for (i, name) in ["dimension_of_measure", "record_metamodel", "spike_waveforms"]
        .into_iter()
        .enumerate()
    {
        dao.mark_for_deletion(
            t(10 + i as i64),
            VersionTimestamp::Unversioned,
            &[("schema_name", name)],
        )
        .unwrap();
    }
    let all = dao.list_marked_for_deletion(None).unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].get("schema_name"), Some(&json!("spike_waveforms")));
    assert_eq!(all[2].get("schema_name"), Some(&json!("dimension_of_measure")));

    // Strictly-before threshold.
    let some = dao
        .list_marked_for_deletion(Some(t(11)))
        .unwrap();
    assert_eq!(some.len(), 1);
    let some = dao
        .list_marked_for_deletion(Some(t(11) + Duration::milliseconds(100)))
        .unwrap();
    assert_eq!(some.len(), 2);
}

// ─── restore ─────────────────────────────────────────────────────────────────

#[test]
fn restore_clears_the_tombstone_and_returns_the_document() {
    let dao = populated_dao();
    let identity = [("schema_name", "dimension_of_measure")];
    dao.mark_for_deletion(t(10), VersionTimestamp::Unversioned, &identity)
        .unwrap();
    assert!(!dao.exists(VersionTimestamp::Unversioned, &identity).unwrap());

    let (restored, removal) = dao.restore(None, 1, &identity).unwrap();
    assert_eq!(removal, t(10));
    assert_eq!(restored.get("time_of_removal"), Some(&Value::Null));
    assert!(dao.exists(VersionTimestamp::Unversioned, &identity).unwrap());
}

#[test]
fn restore_is_repeatable_across_cycles() {
    let dao = populated_dao();
    let identity = [("schema_name", "dimension_of_measure")];
    for i in 0..3 {
        dao.mark_for_deletion(t(10 + i), VersionTimestamp::Unversioned, &identity)
            .unwrap();
        dao.restore(None, 1, &identity).unwrap();
        assert!(dao.exists(VersionTimestamp::Unversioned, &identity).unwrap());
    }
}

#[test]
fn restore_nth_counts_from_the_oldest_removal() {
    let dao = models_dao();
    let identity = [("schema_name", "animal")];
    // Three tombstones with distinguishable titles, removed at t+1, t+2, t+3.
    for i in 1..=3 {
        dao.add(model_doc("animal", &format!("Animal V{i}")), t(0), false)
            .unwrap();
        dao.mark_for_deletion(t(i), VersionTimestamp::Unversioned, &identity)
            .unwrap();
    }
    let (restored, removal) = dao.restore(None, 2, &identity).unwrap();
    assert_eq!(removal, t(2));
    assert_eq!(restored.get("schema_title"), Some(&json!("Animal V2")));
}

#[test]
fn restore_with_a_live_row_is_already_exists() {
    let dao = populated_dao();
    let identity = [("schema_name", "dimension_of_measure")];
    dao.mark_for_deletion(t(10), VersionTimestamp::Unversioned, &identity)
        .unwrap();
    dao.add(model_doc("dimension_of_measure", "Replacement"), t(11), false)
        .unwrap();
    let err = dao.restore(None, 1, &identity).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
}

#[test]
fn restore_out_of_range_is_a_range_error() {
    let dao = populated_dao();
    let identity = [("schema_name", "dimension_of_measure")];
    // Live but never removed: zero tombstones.
    assert_eq!(
        dao.restore(None, 1, &identity).unwrap_err().kind(),
        ErrorKind::Range
    );
    dao.mark_for_deletion(t(10), VersionTimestamp::Unversioned, &identity)
        .unwrap();
    for n in [-5, 0, 2] {
        assert_eq!(
            dao.restore(None, n, &identity).unwrap_err().kind(),
            ErrorKind::Range
        );
    }
}

#[test]
fn restore_exact_targets_one_tombstone() {
    let dao = models_dao();
    let identity = [("schema_name", "animal")];
    for i in 1..=2 {
        dao.add(model_doc("animal", &format!("Animal V{i}")), t(0), false)
            .unwrap();
        dao.mark_for_deletion(t(i), VersionTimestamp::Unversioned, &identity)
            .unwrap();
    }
    dao.restore_exact(VersionTimestamp::Unversioned, t(2), &identity)
        .unwrap();
    let live = dao
        .get(VersionTimestamp::Unversioned, &identity)
        .unwrap()
        .unwrap();
    assert_eq!(live.get("schema_title"), Some(&json!("Animal V2")));

    // The other tombstone is still there and the slot is now taken.
    assert_eq!(
        dao.restore_exact(VersionTimestamp::Unversioned, t(1), &identity)
            .unwrap_err()
            .kind(),
        ErrorKind::AlreadyExists
    );
}

// ─── purge ───────────────────────────────────────────────────────────────────

#[test]
fn purge_without_threshold_deletes_all_tombstones() {
    let dao = populated_dao();
    for name in ["dimension_of_measure", "record_metamodel", "spike_waveforms"] {
        dao.mark_for_deletion(
            t(10),
            VersionTimestamp::Unversioned,
            &[("schema_name", name)],
        )
        .unwrap();
    }
    assert_eq!(dao.list_marked_for_deletion(None).unwrap().len(), 3);
    assert_eq!(dao.purge(None).unwrap(), 3);
    assert!(dao.list_marked_for_deletion(None).unwrap().is_empty());
}

#[test]
fn purge_with_threshold_is_inclusive() {
    let dao = populated_dao();
    for (i, name) in ["dimension_of_measure", "record_metamodel", "spike_waveforms"]
        .into_iter()
        .enumerate()
    {
        dao.mark_for_deletion(
            t(10 + i as i64),
            VersionTimestamp::Unversioned,
            &[("schema_name", name)],
        )
        .unwrap();
    }
    assert_eq!(dao.purge(Some(t(11))).unwrap(), 2);
    assert_eq!(dao.list_marked_for_deletion(None).unwrap().len(), 1);
    assert_eq!(dao.purge(None).unwrap(), 1);
}

#[test]
fn purge_with_nothing_tombstoned_is_zero() {
    let dao = populated_dao();
    assert_eq!(dao.purge(None).unwrap(), 0);
}

// ─── SQLite backend parity ───────────────────────────────────────────────────

#[test]
fn the_sqlite_backend_supports_the_full_lifecycle() {
    let store = SqliteDocumentStore::open_in_memory().unwrap();
    let dao = DocumentDao::new(
        store.database("proj").collection("domain_models"),
        vec!["schema_name".to_string()],
    )
    .unwrap();
    let identity = [("schema_name", "animal")];

    dao.add(model_doc("animal", "Animal"), t(0), false).unwrap();
    assert!(dao.exists(VersionTimestamp::Unversioned, &identity).unwrap());
    assert_eq!(
        dao.add(model_doc("animal", "Animal"), t(1), false)
            .unwrap_err()
            .kind(),
        ErrorKind::AlreadyExists
    );

    dao.mark_for_deletion(t(2), VersionTimestamp::Unversioned, &identity)
        .unwrap();
    assert!(!dao.exists(VersionTimestamp::Unversioned, &identity).unwrap());
    dao.restore(None, 1, &identity).unwrap();
    assert!(dao.exists(VersionTimestamp::Unversioned, &identity).unwrap());

    dao.mark_for_deletion(t(3), VersionTimestamp::Unversioned, &identity)
        .unwrap();
    assert_eq!(dao.purge(None).unwrap(), 1);
    assert!(dao
        .get(VersionTimestamp::Unversioned, &identity)
        .unwrap()
        .is_none());
}
