//! Core domain for the device registration forwarder.
//!
//! When App Distribution reports a new tester iOS device, the device's UDID,
//! model name and the tester's email are forwarded to a GitHub Actions
//! `workflow_dispatch` that registers the device with Apple. This crate holds
//! every type involved in that hand-off and the [`WorkflowDispatcher`] port the
//! infrastructure crates implement.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is sent; the `github` crate defines *how* it is sent and
//! the `listener` crate defines *how* events arrive.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`DeviceUdid`, `GitRef`, `InvocationId`, etc.) |
//! | [`types`] | Event, credential and dispatch request types |
//! | [`errors`] | `ForwarderError`, `DispatchError` and `RetryPolicy` |
//! | [`forwarder`] | `EventForwarder` and the `WorkflowDispatcher` port |

pub mod errors;
pub mod forwarder;
pub mod identifiers;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use errors::{DispatchError, ForwarderError, RetryPolicy};
pub use forwarder::{EventForwarder, WorkflowDispatcher};
pub use identifiers::{
    AppId, DeviceModelName, DeviceUdid, GitRef, InvocationId, RepositoryName, RepositoryOwner,
    TesterEmail, TesterName, WorkflowFile,
};
pub use types::{
    Credential, DeviceRegistrationEvent, DispatchBody, DispatchRequest, DispatchTarget,
    TesterDevicePayload, WorkflowInputs, CREDENTIAL_ENV_VAR,
};
