//! Typed view of a domain-model document.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The three classes of domain model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaType {
    PropertyModel,
    Metamodel,
    DataModel,
}

impl std::fmt::Display for SchemaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SchemaType::PropertyModel => "property_model",
            SchemaType::Metamodel => "metamodel",
            SchemaType::DataModel => "data_model",
        };
        f.write_str(s)
    }
}

/// A self-describing schema document.
///
/// Domain models are stored as plain JSON documents; this struct is the typed
/// authoring surface. Managed timestamps are added by the store on insert and
/// never appear here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainModel {
    pub schema_name: String,
    pub schema_title: String,
    pub schema_description: String,
    pub schema_type: SchemaType,
    pub json_schema: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metamodel_ref: Option<String>,
}

impl DomainModel {
    /// The document form handed to the document DAO.
    pub fn to_document(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            // A struct of plain fields always serializes to an object.
            _ => Map::new(),
        }
    }

    /// Typed view of a stored document; managed fields are ignored.
    pub fn from_document(document: &Map<String, Value>) -> Option<Self> {
        let mut trimmed = document.clone();
        trimmed.remove(crate::constants::TIME_OF_SAVE);
        trimmed.remove(crate::constants::TIME_OF_REMOVAL);
        trimmed.remove(crate::constants::VERSION_TIMESTAMP);
        serde_json::from_value(Value::Object(trimmed)).ok()
    }

    pub fn is_metamodel(&self) -> bool {
        self.schema_type == SchemaType::Metamodel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn document_round_trip_preserves_fields() {
        let model = DomainModel {
            schema_name: "session".into(),
            schema_title: "Session".into(),
            schema_description: "A recording session.".into(),
            schema_type: SchemaType::DataModel,
            json_schema: json!({"type": "object"}),
            metamodel_ref: Some("record_metamodel".into()),
        };
        let doc = model.to_document();
        assert_eq!(doc.get("schema_type"), Some(&json!("data_model")));
        assert_eq!(DomainModel::from_document(&doc), Some(model));
    }

    #[test]
    fn managed_fields_do_not_break_the_typed_view() {
        let model = DomainModel {
            schema_name: "unit".into(),
            schema_title: "Unit".into(),
            schema_description: "A unit of measure.".into(),
            schema_type: SchemaType::PropertyModel,
            json_schema: json!({"type": "string"}),
            metamodel_ref: None,
        };
        let mut doc = model.to_document();
        doc.insert("time_of_save".into(), json!(1_000));
        doc.insert("time_of_removal".into(), Value::Null);
        doc.insert("version_timestamp".into(), json!(0));
        assert_eq!(DomainModel::from_document(&doc), Some(model));
    }

    #[test]
    fn absent_metamodel_ref_is_omitted_from_the_document() {
        let model = DomainModel {
            schema_name: "unit".into(),
            schema_title: "Unit".into(),
            schema_description: "A unit of measure.".into(),
            schema_type: SchemaType::PropertyModel,
            json_schema: json!({"type": "string"}),
            metamodel_ref: None,
        };
        assert!(!model.to_document().contains_key("metamodel_ref"));
    }
}
