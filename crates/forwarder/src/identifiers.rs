//! Newtype domain identifiers.
//!
//! Every value copied from the tester device event, and every part of the
//! dispatch target, is a distinct newtype wrapping a `String`. This prevents
//! accidentally passing — for example — a [`TesterEmail`] where a
//! [`DeviceUdid`] is expected when building workflow inputs, even though both
//! are plain strings on the wire.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, from_static(), as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Creates an identifier from a compile-time constant.
            #[allow(dead_code)]
            pub(crate) fn from_static(value: &'static str) -> Self {
                debug_assert!(!value.is_empty());
                Self(value.to_string())
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
// Identifiers — tester device event fields
// ---------------------------------------------------------------------------

string_id! {
    /// Unique device identifier (UDID) of the tester's iOS device.
    ///
    /// Opaque to this system; forwarded verbatim as the `ios_device_udid`
    /// workflow input.
    DeviceUdid
}

string_id! {
    /// Human-readable model name of the tester's device (e.g. `"iPhone 14"`).
    DeviceModelName
}

string_id! {
    /// Email address of the tester who registered the device.
    ///
    /// Email syntax is not validated; the value is forwarded as received.
    TesterEmail
}

string_id! {
    /// Display name of the tester. Carried for logging only.
    TesterName
}

string_id! {
    /// Firebase app identifier the event was published for. Carried for logging only.
    AppId
}

// ---------------------------------------------------------------------------
// Identifiers — dispatch target (GitHub names)
// ---------------------------------------------------------------------------

string_id! {
    /// Owner (user or organisation) of the GitHub repository hosting the workflow.
    RepositoryOwner
}

string_id! {
    /// Name of the GitHub repository hosting the workflow.
    RepositoryName
}

string_id! {
    /// Workflow file name (e.g. `"register-new-device.yml"`) or numeric workflow id.
    WorkflowFile
}

string_id! {
    /// A Git ref (branch or tag) the workflow run is started on (e.g. `"main"`).
    GitRef
}

// ---------------------------------------------------------------------------
// Identifiers — UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single forwarding invocation (one received event).
///
/// Generated fresh for every event; recorded on the `forward` tracing span so
/// all log lines from one invocation can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvocationId(Uuid);

impl InvocationId {
    /// Generates a new random invocation identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an [`InvocationId`] from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for InvocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[path = "identifiers_tests.rs"]
mod tests;
