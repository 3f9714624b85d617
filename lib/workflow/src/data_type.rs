//! Value types exchanged between nodes.
//!
//! Every port declares one `DataType`. The compatibility matrix here is
//! advisory: the executor logs incompatible connections but still runs
//! them, leaving the final word to validation and conversion.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The declared type of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    String,
    Number,
    Boolean,
    File,
    Json,
    Array,
    Object,
    Date,
    Email,
    Url,
    Any,
}

impl DataType {
    /// All data types, in declaration order.
    pub const ALL: [DataType; 11] = [
        Self::String,
        Self::Number,
        Self::Boolean,
        Self::File,
        Self::Json,
        Self::Array,
        Self::Object,
        Self::Date,
        Self::Email,
        Self::Url,
        Self::Any,
    ];

    /// Returns the lowercase wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::File => "file",
            Self::Json => "json",
            Self::Array => "array",
            Self::Object => "object",
            Self::Date => "date",
            Self::Email => "email",
            Self::Url => "url",
            Self::Any => "any",
        }
    }

    /// Types a value of this type may be converted into, besides `any`.
    #[must_use]
    pub const fn convertible_to(&self) -> &'static [DataType] {
        use DataType::*;
        match self {
            String => &[
                String, Number, Boolean, File, Json, Array, Object, Date, Email, Url,
            ],
            Number => &[Number, String, Boolean],
            Boolean => &[Boolean, String, Number],
            File => &[File, String],
            Json => &[Json, String, Object, Array],
            Array => &[Array, String, Json],
            Object => &[Object, Json, String],
            Date => &[Date, String],
            Email => &[Email, String],
            Url => &[Url, String],
            Any => &DataType::ALL,
        }
    }

    /// Whether a value produced as `self` may feed a port declared as `to`.
    ///
    /// `any` is compatible with everything in both directions.
    #[must_use]
    pub fn is_compatible_with(&self, to: DataType) -> bool {
        *self == Self::Any || to == Self::Any || self.convertible_to().contains(&to)
    }

    /// A human-readable warning when converting `self` into `to` loses
    /// structure or precision.
    #[must_use]
    pub fn conversion_warning(&self, to: DataType) -> Option<&'static str> {
        match (self, to) {
            (Self::Number, Self::String) => {
                Some("number will be converted to a string and lose numeric semantics")
            }
            (Self::Json, Self::String) => {
                Some("json will be serialized to a string and lose its structure")
            }
            (Self::Array, Self::String) => {
                Some("array will be serialized to a string and lose its items")
            }
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_is_compatible_both_ways() {
        for ty in DataType::ALL {
            assert!(DataType::Any.is_compatible_with(ty), "any -> {ty}");
            assert!(ty.is_compatible_with(DataType::Any), "{ty} -> any");
        }
    }

    #[test]
    fn every_type_is_compatible_with_itself() {
        for ty in DataType::ALL {
            assert!(ty.is_compatible_with(ty));
        }
    }

    #[test]
    fn matrix_rejects_structural_mismatch() {
        assert!(!DataType::Number.is_compatible_with(DataType::Array));
        assert!(!DataType::Boolean.is_compatible_with(DataType::Date));
        assert!(!DataType::File.is_compatible_with(DataType::Number));
        assert!(DataType::String.is_compatible_with(DataType::Email));
    }

    #[test]
    fn lossy_conversions_warn() {
        assert!(DataType::Number.conversion_warning(DataType::String).is_some());
        assert!(DataType::Json.conversion_warning(DataType::String).is_some());
        assert!(DataType::Array.conversion_warning(DataType::String).is_some());
        assert!(DataType::String.conversion_warning(DataType::Number).is_none());
        assert!(DataType::Object.conversion_warning(DataType::Json).is_none());
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&DataType::Email).expect("serialize");
        assert_eq!(json, "\"email\"");
        let parsed: DataType = serde_json::from_str("\"url\"").expect("deserialize");
        assert_eq!(parsed, DataType::Url);
    }
}
