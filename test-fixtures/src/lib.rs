//! Fixture builders for strata tests: a small but complete domain-model
//! corpus (property models, metamodels, data models), record and array
//! builders, invalid-model generators, and a raw-binary checkpoint adapter.

use serde_json::{json, Map, Value};

use strata_core::errors::FileDaoError;
use strata_core::models::{
    Checkpoint, DataArray, DataObject, DataObjectKind, DomainModel, FileFormat, Record, SchemaType,
};
use strata_core::traits::{DataFileAdapter, FileSystem};

fn property_model(name: &str, title: &str, description: &str, body: Value) -> DomainModel {
    DomainModel {
        schema_name: name.to_string(),
        schema_title: title.to_string(),
        schema_description: description.to_string(),
        schema_type: SchemaType::PropertyModel,
        json_schema: body,
        metamodel_ref: None,
    }
}

/// Every property model the record corpus needs, including the shared
/// `data_ref` model that validates `*_data_ref` fields.
pub fn property_models() -> Vec<DomainModel> {
    vec![
        property_model(
            "schema_ref",
            "Schema Reference",
            "The name of the data model governing a record.",
            json!({"type": "string"}),
        ),
        property_model(
            "data_name",
            "Data Name",
            "A record identifier, unique within its schema reference.",
            json!({"type": "string"}),
        ),
        property_model(
            "has_file",
            "Has File",
            "Whether a companion data file exists for the record.",
            json!({"type": "boolean"}),
        ),
        property_model(
            "data_ref",
            "Data Reference",
            "The data name of another record this field points at.",
            json!({"type": "string"}),
        ),
        property_model(
            "session_date",
            "Session Date",
            "The date a recording session took place.",
            json!({"type": "string"}),
        ),
        property_model(
            "start_time",
            "Start Time",
            "The wall-clock time a session started.",
            json!({"type": "string"}),
        ),
        property_model(
            "session_duration",
            "Session Duration",
            "How long a session lasted.",
            json!({"type": "string"}),
        ),
        property_model(
            "session_notes",
            "Session Notes",
            "Free-form notes about a session.",
            json!({"type": "string"}),
        ),
        property_model(
            "species",
            "Species",
            "The species of an animal.",
            json!({"type": "string"}),
        ),
        property_model(
            "strain",
            "Strain",
            "The strain of an animal.",
            json!({"type": "string"}),
        ),
        property_model(
            "sex",
            "Sex",
            "The recorded sex of an animal.",
            json!({"type": "string", "enum": ["F", "M", "U"]}),
        ),
        property_model(
            "data_dimensions",
            "Data Dimensions",
            "The named dimensions of an array payload, in storage order.",
            json!({"type": "array", "items": {"type": "string"}, "minItems": 1}),
        ),
        property_model(
            "coordinates",
            "Coordinates",
            "The dimensions that carry coordinate vectors.",
            json!({"type": "array", "items": {"type": "string"}}),
        ),
        property_model(
            "unit",
            "Unit",
            "The unit of measure of an array payload.",
            json!({"type": "string"}),
        ),
        property_model(
            "dimension_of_measure",
            "Dimension of Measure",
            "The dimensional property of the unit, e.g. charge or time.",
            json!({"type": "string"}),
        ),
    ]
}

/// The two metamodels: one governing plain-record data models, one governing
/// array-backed data models.
pub fn metamodels() -> Vec<DomainModel> {
    vec![
        DomainModel {
            schema_name: "record_metamodel".to_string(),
            schema_title: "Record Metamodel".to_string(),
            schema_description: "Governs data models describing file-less records.".to_string(),
            schema_type: SchemaType::Metamodel,
            json_schema: json!({
                "type": "object",
                "properties": {
                    "schema_type": {"const": "data_model"},
                    "json_schema": {
                        "type": "object",
                        "properties": {
                            "type": {"const": "object"},
                            "properties": {"type": "object"}
                        },
                        "required": ["type", "properties"]
                    }
                },
                "required": ["schema_name", "json_schema"]
            }),
            metamodel_ref: None,
        },
        DomainModel {
            schema_name: "array_metamodel".to_string(),
            schema_title: "Array Metamodel".to_string(),
            schema_description: "Governs data models describing array-backed records.".to_string(),
            schema_type: SchemaType::Metamodel,
            json_schema: json!({
                "type": "object",
                "properties": {
                    "schema_type": {"const": "data_model"},
                    "json_schema": {
                        "type": "object",
                        "properties": {
                            "type": {"const": "object"},
                            "properties": {
                                "type": "object",
                                "required": ["data_dimensions", "coordinates"]
                            }
                        },
                        "required": ["type", "properties"]
                    }
                },
                "required": ["schema_name", "json_schema"]
            }),
            metamodel_ref: None,
        },
    ]
}

/// The data models: two plain-record models and two array-backed ones.
pub fn data_models() -> Vec<DomainModel> {
    vec![
        DomainModel {
            schema_name: "session".to_string(),
            schema_title: "Session".to_string(),
            schema_description: "A recording session with its schedule metadata.".to_string(),
            schema_type: SchemaType::DataModel,
            json_schema: json!({
                "type": "object",
                "properties": {
                    "schema_ref": {"type": "string"},
                    "data_name": {"type": "string"},
                    "has_file": {"const": false},
                    "animal_data_ref": {"type": "string"},
                    "session_date": {"type": "string"},
                    "start_time": {"type": "string"},
                    "session_duration": {"type": "string"},
                    "session_notes": {"type": "string"}
                },
                "required": [
                    "schema_ref",
                    "data_name",
                    "session_date",
                    "start_time",
                    "session_duration"
                ]
            }),
            metamodel_ref: Some("record_metamodel".to_string()),
        },
        DomainModel {
            schema_name: "animal".to_string(),
            schema_title: "Animal".to_string(),
            schema_description: "A subject animal and its husbandry metadata.".to_string(),
            schema_type: SchemaType::DataModel,
            json_schema: json!({
                "type": "object",
                "properties": {
                    "schema_ref": {"type": "string"},
                    "data_name": {"type": "string"},
                    "has_file": {"const": false},
                    "species": {"type": "string"},
                    "strain": {"type": "string"},
                    "sex": {"type": "string"}
                },
                "required": ["schema_ref", "data_name", "species", "strain"]
            }),
            metamodel_ref: Some("record_metamodel".to_string()),
        },
        DomainModel {
            schema_name: "spike_waveforms".to_string(),
            schema_title: "Spike Waveforms".to_string(),
            schema_description: "Windowed spike waveforms per probe and channel.".to_string(),
            schema_type: SchemaType::DataModel,
            json_schema: json!({
                "type": "object",
                "properties": {
                    "schema_ref": {"type": "string"},
                    "data_name": {"type": "string"},
                    "has_file": {"const": true},
                    "data_dimensions": {
                        "type": "array",
                        "items": {"type": "string", "enum": ["time", "probe", "channel"]},
                        "minItems": 3,
                        "maxItems": 3,
                        "uniqueItems": true
                    },
                    "coordinates": {
                        "type": "array",
                        "items": {"type": "string", "enum": ["time", "probe", "channel"]},
                        "uniqueItems": true
                    },
                    "unit": {"type": "string"},
                    "dimension_of_measure": {"const": "charge"},
                    "animal_data_ref": {"type": "string"},
                    "session_data_ref": {"type": "string"}
                },
                "required": [
                    "data_dimensions",
                    "coordinates",
                    "unit",
                    "dimension_of_measure",
                    "animal_data_ref",
                    "session_data_ref"
                ]
            }),
            metamodel_ref: Some("array_metamodel".to_string()),
        },
        DomainModel {
            schema_name: "spike_times".to_string(),
            schema_title: "Spike Times".to_string(),
            schema_description: "Spike event times per detected unit.".to_string(),
            schema_type: SchemaType::DataModel,
            json_schema: json!({
                "type": "object",
                "properties": {
                    "schema_ref": {"type": "string"},
                    "data_name": {"type": "string"},
                    "has_file": {"const": true},
                    "data_dimensions": {
                        "type": "array",
                        "items": {"type": "string"},
                        "minItems": 1
                    },
                    "coordinates": {"type": "array", "items": {"type": "string"}},
                    "unit": {"type": "string"},
                    "dimension_of_measure": {"const": "time"},
                    "animal_data_ref": {"type": "string"},
                    "session_data_ref": {"type": "string"}
                },
                "required": ["data_dimensions", "coordinates", "unit", "dimension_of_measure"]
            }),
            metamodel_ref: Some("array_metamodel".to_string()),
        },
    ]
}

/// Property models, then metamodels, then data models — the insertion order
/// a fresh registry accepts.
pub fn all_models() -> Vec<DomainModel> {
    let mut all = property_models();
    all.extend(metamodels());
    all.extend(data_models());
    all
}

// ─── Records and payloads ────────────────────────────────────────────────────

pub fn session_record(data_name: &str) -> Record {
    record(json!({
        "schema_ref": "session",
        "data_name": data_name,
        "has_file": false,
        "session_date": "2023-08-10",
        "start_time": "12:00:00",
        "session_duration": "00:30:00",
        "session_notes": "A fixture session."
    }))
}

pub fn animal_record(data_name: &str) -> Record {
    record(json!({
        "schema_ref": "animal",
        "data_name": data_name,
        "has_file": false,
        "species": "Mus musculus",
        "strain": "C57BL/6",
        "sex": "F"
    }))
}

/// The `(100, 3, 5)` spike-waveform array with a fully valid record in its
/// attribute map.
pub fn spike_waveforms_array(data_name: &str) -> DataArray {
    let shape = vec![100, 3, 5];
    let len: usize = shape.iter().product();
    let values: Vec<f64> = (0..len).map(|i| (i % 97) as f64 / 10.0).collect();
    let mut array = DataArray::new(
        Some(data_name.to_string()),
        vec!["time".into(), "probe".into(), "channel".into()],
        shape,
        values,
    )
    .unwrap_or_else(|| unreachable!("fixture shape is coherent"));
    array
        .coords
        .insert("time".into(), (0..100).map(f64::from).collect());
    array.attrs = match json!({
        "schema_ref": "spike_waveforms",
        "data_name": data_name,
        "has_file": true,
        "data_dimensions": ["time", "probe", "channel"],
        "coordinates": ["time"],
        "unit": "uV",
        "dimension_of_measure": "charge",
        "animal_data_ref": "A10",
        "session_data_ref": "S1"
    }) {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    array
}

pub fn spike_waveforms_object(data_name: &str) -> DataObject {
    DataObject::Array(spike_waveforms_array(data_name))
}

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => Record::new(map),
        _ => Record::default(),
    }
}

// ─── Invalid models ──────────────────────────────────────────────────────────

/// Schema names violating the naming rules, one failure mode each.
pub fn invalid_schema_names() -> Vec<&'static str> {
    vec![
        "",
        " ",
        "5tarts_with_number",
        "double__underscore",
        "contains-dash",
        "contains space",
        "hasCapitals",
        "_leading_underscore",
        "trailing_underscore_",
        "x_time_of_removal_y",
        "x_time_of_save_y",
    ]
}

/// Structurally invalid domain-model documents, labeled by failure mode.
pub fn invalid_models() -> Vec<(&'static str, Map<String, Value>)> {
    let base = || {
        property_model(
            "valid_name",
            "Valid Name",
            "A valid base.",
            json!({"type": "string"}),
        )
        .to_document()
    };

    let mut cases: Vec<(&'static str, Map<String, Value>)> = Vec::new();

    let mut no_type = base();
    no_type.insert("json_schema".into(), json!({"minLength": 1}));
    cases.push(("json_schema_missing_type", no_type));

    let mut bad_title = base();
    bad_title.insert("schema_title".into(), json!("has-dashes"));
    cases.push(("title_with_dashes", bad_title));

    let mut empty_description = base();
    empty_description.insert("schema_description".into(), json!(""));
    cases.push(("empty_description", empty_description));

    let mut padded_description = base();
    padded_description.insert("schema_description".into(), json!("  padded  "));
    cases.push(("padded_description", padded_description));

    let mut bad_type = base();
    bad_type.insert("schema_type".into(), json!("not_a_schema_type"));
    cases.push(("unknown_schema_type", bad_type));

    let mut extra_field = base();
    extra_field.insert("surprise".into(), json!(1));
    cases.push(("additional_property", extra_field));

    let mut dangling_ref = base();
    dangling_ref.insert("schema_type".into(), json!("data_model"));
    dangling_ref.insert(
        "json_schema".into(),
        json!({"type": "object", "properties": {}}),
    );
    dangling_ref.insert("metamodel_ref".into(), json!("does_not_exist"));
    cases.push(("dangling_metamodel_ref", dangling_ref));

    let mut refless_data_model = base();
    refless_data_model.insert("schema_type".into(), json!("data_model"));
    refless_data_model.insert(
        "json_schema".into(),
        json!({"type": "object", "properties": {}}),
    );
    cases.push(("data_model_without_metamodel_ref", refless_data_model));

    let mut non_object_metamodel = base();
    non_object_metamodel.insert("schema_type".into(), json!("metamodel"));
    non_object_metamodel.insert("json_schema".into(), json!({"type": "string"}));
    cases.push(("metamodel_with_non_object_body", non_object_metamodel));

    cases
}

// ─── Checkpoint adapter ──────────────────────────────────────────────────────

/// Raw-binary adapter for mutable model checkpoints. Layout: magic, u32
/// attrs length, attrs JSON, payload bytes.
#[derive(Debug, Default)]
pub struct CheckpointAdapter;

const CKPT_MAGIC: &[u8; 8] = b"STRCKP01";

impl CheckpointAdapter {
    pub fn new() -> Self {
        CheckpointAdapter
    }
}

impl DataFileAdapter for CheckpointAdapter {
    fn file_extension(&self) -> &str {
        ".ckpt"
    }

    fn file_format(&self) -> FileFormat {
        FileFormat::new("checkpoint")
    }

    fn data_object_kind(&self) -> DataObjectKind {
        DataObjectKind::Blob
    }

    fn read_file(&self, fs: &dyn FileSystem, path: &str) -> Result<DataObject, FileDaoError> {
        let bytes = fs.read(path).map_err(|e| FileDaoError::io("read", path, e))?;
        if bytes.len() < CKPT_MAGIC.len() + 4 || &bytes[..CKPT_MAGIC.len()] != CKPT_MAGIC {
            return Err(FileDaoError::Corrupt {
                path: path.to_string(),
                detail: "bad checkpoint magic".to_string(),
            });
        }
        let attrs_len = u32::from_le_bytes(
            bytes[CKPT_MAGIC.len()..CKPT_MAGIC.len() + 4]
                .try_into()
                .unwrap_or_default(),
        ) as usize;
        let attrs_start = CKPT_MAGIC.len() + 4;
        let payload_start = attrs_start + attrs_len;
        if bytes.len() < payload_start {
            return Err(FileDaoError::Corrupt {
                path: path.to_string(),
                detail: "truncated checkpoint attrs".to_string(),
            });
        }
        let attrs: Map<String, Value> = serde_json::from_slice(&bytes[attrs_start..payload_start])
            .map_err(|e| FileDaoError::Corrupt {
                path: path.to_string(),
                detail: format!("unreadable checkpoint attrs: {e}"),
            })?;
        Ok(DataObject::Blob(Checkpoint {
            attrs,
            bytes: bytes[payload_start..].to_vec(),
        }))
    }

    fn write_file(
        &self,
        fs: &dyn FileSystem,
        path: &str,
        object: &DataObject,
    ) -> Result<(), FileDaoError> {
        let DataObject::Blob(checkpoint) = object else {
            return Err(FileDaoError::ArgumentType {
                argument: "data_object".to_string(),
                expected: "a blob".to_string(),
                actual: object.kind().to_string(),
            });
        };
        let attrs_bytes = serde_json::to_vec(&Value::Object(checkpoint.attrs.clone())).map_err(
            |e| FileDaoError::Corrupt {
                path: path.to_string(),
                detail: format!("unwritable checkpoint attrs: {e}"),
            },
        )?;
        let mut bytes =
            Vec::with_capacity(CKPT_MAGIC.len() + 4 + attrs_bytes.len() + checkpoint.bytes.len());
        bytes.extend_from_slice(CKPT_MAGIC);
        bytes.extend_from_slice(&(attrs_bytes.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&attrs_bytes);
        bytes.extend_from_slice(&checkpoint.bytes);
        fs.write_new(path, &bytes)
            .map_err(|e| FileDaoError::io("write", path, e))
    }
}

/// A checkpoint payload carrying a minimal identity in its attrs.
pub fn checkpoint_object(schema_ref: &str, data_name: &str, payload: &[u8]) -> DataObject {
    let attrs = match json!({
        "schema_ref": schema_ref,
        "data_name": data_name,
        "has_file": true
    }) {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    DataObject::Blob(Checkpoint {
        attrs,
        bytes: payload.to_vec(),
    })
}
