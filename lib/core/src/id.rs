//! Strongly-typed identifiers for engine entities.
//!
//! Workflows, triggers and executions are identified by ULIDs so that ids
//! sort by creation time. Node ids are caller-chosen strings and live in the
//! workflow crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Error returned when parsing an ID from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of ID that failed to parse.
    pub id_type: &'static str,
    /// The reason for the parse failure.
    pub reason: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {}: {}", self.id_type, self.reason)
    }
}

impl std::error::Error for ParseIdError {}

/// Generates a ULID-backed id type with a display prefix.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Ulid);

        impl $name {
            /// Creates a new ID with a freshly generated ULID.
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }

            /// Creates an ID from a ULID.
            #[must_use]
            pub const fn from_ulid(ulid: Ulid) -> Self {
                Self(ulid)
            }

            /// Returns the underlying ULID.
            #[must_use]
            pub const fn as_ulid(&self) -> Ulid {
                self.0
            }

            /// Returns the prefix used for display formatting.
            #[must_use]
            pub const fn prefix() -> &'static str {
                $prefix
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s.strip_prefix(concat!($prefix, "_")).unwrap_or(s);
                Ulid::from_str(raw).map(Self).map_err(|e| ParseIdError {
                    id_type: stringify!($name),
                    reason: e.to_string(),
                })
            }
        }

        impl From<Ulid> for $name {
            fn from(ulid: Ulid) -> Self {
                Self(ulid)
            }
        }
    };
}

define_id!(
    /// Unique identifier for a workflow definition.
    WorkflowId,
    "wf"
);

define_id!(
    /// Unique identifier for a trigger.
    TriggerId,
    "trg"
);

define_id!(
    /// Unique identifier for one execution (run) of a workflow.
    ExecutionId,
    "exec"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_prefix() {
        assert!(WorkflowId::new().to_string().starts_with("wf_"));
        assert!(TriggerId::new().to_string().starts_with("trg_"));
        assert!(ExecutionId::new().to_string().starts_with("exec_"));
    }

    #[test]
    fn parse_with_and_without_prefix() {
        let id = ExecutionId::new();
        let parsed: ExecutionId = id.to_string().parse().expect("prefixed");
        assert_eq!(id, parsed);

        let raw: ExecutionId = id.as_ulid().to_string().parse().expect("raw");
        assert_eq!(id, raw);
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = "trg_nope".parse::<TriggerId>().unwrap_err();
        assert_eq!(err.id_type, "TriggerId");
    }

    #[test]
    fn serializes_as_bare_ulid() {
        let id = WorkflowId::new();
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, format!("\"{}\"", id.as_ulid()));
        let back: WorkflowId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(id, back);
    }
}
