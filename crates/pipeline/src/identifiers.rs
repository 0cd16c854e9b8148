//! Newtype domain identifiers.
//!
//! Every domain concept that has an identity is represented as a distinct newtype
//! wrapping a primitive. This prevents accidentally interchanging, for example,
//! a [`RuleId`] with an [`AgeGroupId`] even though both are `u64` under the hood.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Macro for u64-wrapped newtypes (storage-assigned integers).
// Generates: struct (Copy), new(), as_u64(), Display.
// ---------------------------------------------------------------------------
macro_rules! u64_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(u64);

        impl $name {
            /// Creates a new identifier from a raw integer.
            pub fn new(value: u64) -> Self {
                Self(value)
            }

            /// Returns the underlying integer value.
            pub fn as_u64(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: storage-integer-backed
// ---------------------------------------------------------------------------

u64_id! {
    /// Identifies a content-policy rule row in the rule source.
    ///
    /// Rules are keyed by this id in the Policy Engine cache; iteration order
    /// over rules follows the id order.
    RuleId
}

u64_id! {
    /// Identifies an age bracket the generated activity is targeted at.
    ///
    /// The reference catalogue uses `1..=4` (3-4, 5-6, 7-8 and 9-10 years).
    AgeGroupId
}

u64_id! {
    /// Identifies a household prop the activity may make use of.
    PropId
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single generation run (one call to the orchestrator).
///
/// Generated fresh for every generation; recorded on tracing spans and on
/// telemetry events so all activity from a single run can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenerationRunId(Uuid);

impl GenerationRunId {
    /// Generates a new random run identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a [`GenerationRunId`] from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for GenerationRunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Identifiers: String-backed
// ---------------------------------------------------------------------------

string_id! {
    /// Identifies the authenticated user a request is made on behalf of.
    ///
    /// Supplied by the (external) session layer; only used to derive quota keys
    /// and to label telemetry events.
    UserId
}

string_id! {
    /// Identifies a model at the completion provider
    /// (e.g. `"meta-llama/llama-4-maverick:free"`).
    ModelId
}

string_id! {
    /// The key a sliding quota window is tracked under, conventionally
    /// `"<user>:<scope>"` (e.g. `"42:gen:minute"`).
    QuotaKey
}

impl QuotaKey {
    /// Builds the conventional `"<user>:<scope>"` key.
    pub fn scoped(user: &UserId, scope: &str) -> Self {
        Self(format!("{}:{}", user.as_str(), scope))
    }
}
