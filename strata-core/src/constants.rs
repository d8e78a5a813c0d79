//! Shared constants: managed field names, collection names, filename grammar.

/// Field stamped on every document when it is added.
pub const TIME_OF_SAVE: &str = "time_of_save";
/// Field set on soft-deletion; `null` on every live document.
pub const TIME_OF_REMOVAL: &str = "time_of_removal";
/// Field holding the version instant, or the integer sentinel `0`.
pub const VERSION_TIMESTAMP: &str = "version_timestamp";

/// Internal backend id key, always stripped from query results.
pub const INTERNAL_ID: &str = "_id";

/// Collection holding domain models, indexed by `schema_name`.
pub const DOMAIN_MODELS_COLLECTION: &str = "domain_models";
/// Collection holding records, indexed by `(schema_ref, data_name)`.
pub const RECORDS_COLLECTION: &str = "records";
/// History label for the in-memory object collection.
pub const MEMORY_COLLECTION: &str = "in_memory_objects";

pub const SCHEMA_NAME: &str = "schema_name";
pub const SCHEMA_REF: &str = "schema_ref";
pub const DATA_NAME: &str = "data_name";
pub const HAS_FILE: &str = "has_file";
pub const METAMODEL_REF: &str = "metamodel_ref";

/// Separator between identity components in data file names.
pub const FILE_NAME_SEPARATOR: &str = "__";
/// Marker preceding the version microseconds in data file names.
pub const FILE_VERSION_MARKER: &str = "__version_";
/// Marker preceding the removal microseconds in tombstoned file names.
pub const FILE_REMOVAL_MARKER: &str = "__time_of_removal_";

/// Substrings that may never appear inside a data identifier because they
/// collide with the file naming grammar.
pub const RESERVED_IDENTIFIER_SUBSTRINGS: &[&str] = &[TIME_OF_SAVE, TIME_OF_REMOVAL];

/// Suffix routing a record field to the shared `data_ref` property model.
pub const DATA_REF_SUFFIX: &str = "_data_ref";
/// Name of the shared property model validating `*_data_ref` fields.
pub const DATA_REF_MODEL: &str = "data_ref";

/// Width of the zero-padded microsecond component in file names. Wide enough
/// for any epoch microsecond value, so lexical sort equals chronological sort.
pub const MICROS_FIELD_WIDTH: usize = 20;
