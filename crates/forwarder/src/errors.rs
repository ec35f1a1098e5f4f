//! Error and retry-policy types for the device registration forwarder.
//!
//! [`ForwarderError`] covers every way a single forwarding invocation can end
//! unsuccessfully. [`DispatchError`] is the narrower error produced by a
//! [`crate::WorkflowDispatcher`] when the outbound call fails.
//!
//! [`RetryPolicy`] is advice for the hosting platform only. Nothing in this
//! workspace retries a dispatch; the caller that delivered the event decides
//! whether to deliver it again.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// ## Rules
///
/// - `Retryable`: transport failures, HTTP 429 and 5xx responses.
/// - `NonRetryable`: missing configuration, malformed events, and every other
///   non-success HTTP status (bad credential, unknown workflow, invalid inputs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried by the caller.
    Retryable {
        /// Minimum back-off before the next attempt, taken from the downstream
        /// `Retry-After` header when present.
        after: Option<Duration>,
    },
    /// Delivering the same event again cannot succeed without a human fixing
    /// configuration or the event source.
    NonRetryable,
}

// ---------------------------------------------------------------------------
// Dispatch errors
// ---------------------------------------------------------------------------

/// Failure of the single outbound workflow-dispatch call.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum DispatchError {
    /// The downstream API answered with a non-success status code.
    #[error("Workflow dispatch rejected with HTTP {status}: {body}")]
    Status {
        /// HTTP status code returned by the downstream API.
        status: u16,
        /// Response body, kept verbatim for diagnostics.
        body: String,
        /// Parsed `Retry-After` header, if the response carried one.
        retry_after: Option<Duration>,
    },

    /// The request never produced a response (DNS, TLS, connection reset, timeout).
    #[error("Workflow dispatch request failed: {message}")]
    Transport {
        /// Description of the underlying transport error.
        message: String,
    },
}

impl DispatchError {
    /// Classifies this failure for the hosting platform's retry mechanism.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            DispatchError::Status {
                status,
                retry_after,
                ..
            } if *status == 429 || (500..600).contains(status) => RetryPolicy::Retryable {
                after: *retry_after,
            },
            DispatchError::Status { .. } => RetryPolicy::NonRetryable,
            DispatchError::Transport { .. } => RetryPolicy::Retryable { after: None },
        }
    }

    /// Returns the downstream HTTP status, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            DispatchError::Status { status, .. } => Some(*status),
            DispatchError::Transport { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Invocation-level errors
// ---------------------------------------------------------------------------

/// Errors that end a forwarding invocation.
///
/// Every failure path surfaces as one of these variants; none is swallowed.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ForwarderError {
    /// Required configuration (the GitHub credential) is missing or invalid.
    ///
    /// Produced before any network activity; fatal for the invocation.
    #[error("Configuration error: {message}")]
    ConfigurationError {
        /// Description of the configuration problem.
        message: String,
    },

    /// A required field is missing or empty in the received event payload.
    ///
    /// Produced at the boundary, before any network activity.
    #[error("Invalid event: required field '{field}' is missing or empty")]
    InvalidEvent {
        /// Wire name of the offending field (e.g. `"testerDeviceIdentifier"`).
        field: String,
    },

    /// The outbound workflow-dispatch call failed.
    #[error(transparent)]
    DispatchError(#[from] DispatchError),
}

impl ForwarderError {
    /// Builds the error raised when a required secret is absent from the environment.
    pub fn missing_secret(name: &str) -> Self {
        ForwarderError::ConfigurationError {
            message: format!("missing required secret {name}"),
        }
    }

    /// Builds the error raised when a required event field is absent.
    pub fn invalid_event(field: impl Into<String>) -> Self {
        ForwarderError::InvalidEvent {
            field: field.into(),
        }
    }

    /// Classifies this failure for the hosting platform's retry mechanism.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            ForwarderError::ConfigurationError { .. } | ForwarderError::InvalidEvent { .. } => {
                RetryPolicy::NonRetryable
            }
            ForwarderError::DispatchError(err) => err.retry_policy(),
        }
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
