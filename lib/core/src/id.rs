//! Typed identifiers.
//!
//! Every id wraps a ULID, so ids of one type sort by creation time. On the
//! wire (JSON, checkpoint keys) an id is the bare ULID; `Display` adds a short
//! type prefix (`run_01J...`) for logs and the CLI, and parsing accepts both.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// An id string that is not a ULID, with or without the expected prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// Name of the id type that was expected.
    pub kind: &'static str,
    /// The rejected input.
    pub input: String,
    /// What the ULID parser reported.
    pub reason: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {} '{}': {}", self.kind, self.input, self.reason)
    }
}

impl std::error::Error for ParseIdError {}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Ulid);

        impl $name {
            /// Generates a fresh id.
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }

            /// Milliseconds since the Unix epoch at which the id was generated.
            #[must_use]
            pub fn created_at_ms(&self) -> u64 {
                self.0.timestamp_ms()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "_{}"), self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s.strip_prefix(concat!($prefix, "_")).unwrap_or(s);
                Ulid::from_str(raw).map(Self).map_err(|e| ParseIdError {
                    kind: stringify!($name),
                    input: s.to_string(),
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
    /// Identity of the user on whose behalf a run executes.
    UserId,
    "usr"
);

define_id!(
    /// A stored workflow graph.
    WorkflowId,
    "wf"
);

define_id!(
    /// One execution of a workflow graph; also the checkpoint key.
    WorkflowRunId,
    "run"
);

define_id!(
    /// One node's execution record within a run.
    NodeExecutionId,
    "nexec"
);
