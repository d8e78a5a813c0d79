//! The version coordinate of a record or data file.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::constants::MICROS_FIELD_WIDTH;
use crate::time::{datetime_to_microseconds, microseconds_to_datetime, truncate_to_micros};

/// Version coordinate of a record or data file.
///
/// Unversioned rows carry the integer sentinel `0` so the composite index
/// stays total; versioned rows carry a microsecond-resolution UTC instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionTimestamp {
    Unversioned,
    At(DateTime<Utc>),
}

impl VersionTimestamp {
    /// Build from a concrete instant, truncating to microsecond resolution.
    pub fn at(instant: DateTime<Utc>) -> Self {
        VersionTimestamp::At(truncate_to_micros(instant))
    }

    pub fn is_unversioned(&self) -> bool {
        matches!(self, VersionTimestamp::Unversioned)
    }

    /// Microseconds since epoch; `0` for the unversioned sentinel.
    pub fn as_micros(&self) -> i64 {
        match self {
            VersionTimestamp::Unversioned => 0,
            VersionTimestamp::At(instant) => datetime_to_microseconds(instant),
        }
    }

    /// The storage representation: integer `0` or integer microseconds.
    pub fn to_value(&self) -> Value {
        Value::from(self.as_micros())
    }

    /// Parse the storage representation. `0` is the unversioned sentinel;
    /// a missing value (`None`/`null`) also reads as unversioned.
    pub fn from_value(value: Option<&Value>) -> Option<Self> {
        match value {
            None | Some(Value::Null) => Some(VersionTimestamp::Unversioned),
            Some(Value::Number(n)) => {
                let micros = n.as_i64()?;
                if micros == 0 {
                    Some(VersionTimestamp::Unversioned)
                } else {
                    Some(VersionTimestamp::At(microseconds_to_datetime(micros)))
                }
            }
            Some(_) => None,
        }
    }

    /// Fixed-width decimal microseconds for file names; lexical sort over
    /// these equals chronological sort.
    pub fn file_name_component(&self) -> String {
        format!("{:0width$}", self.as_micros(), width = MICROS_FIELD_WIDTH)
    }
}

impl PartialOrd for VersionTimestamp {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionTimestamp {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_micros().cmp(&other.as_micros())
    }
}

impl Default for VersionTimestamp {
    fn default() -> Self {
        VersionTimestamp::Unversioned
    }
}

impl From<DateTime<Utc>> for VersionTimestamp {
    fn from(instant: DateTime<Utc>) -> Self {
        VersionTimestamp::at(instant)
    }
}

impl std::fmt::Display for VersionTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VersionTimestamp::Unversioned => f.write_str("unversioned"),
            VersionTimestamp::At(instant) => write!(f, "{}", instant.to_rfc3339()),
        }
    }
}
