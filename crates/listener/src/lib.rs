//! Tester device event source infrastructure.
//!
//! Binds an HTTP endpoint that receives Firebase App Distribution alerts as
//! CloudEvents (the delivery format of Eventarc-style event subscriptions)
//! and hands each "new tester iOS device" alert to the
//! [`forwarder::EventForwarder`].
//!
//! ## Response codes
//!
//! The hosting platform decides whether to redeliver based on the status code:
//!
//! | Outcome | Status |
//! |---------|--------|
//! | Forwarded, or skipped as a different alert type | `202 Accepted` |
//! | Not a CloudEvent, malformed, or missing a device field | `400 Bad Request` |
//! | Dispatch failed, retryable (429/5xx/transport) | `503 Service Unavailable` |
//! | Dispatch failed, not retryable | `502 Bad Gateway` |
//! | Forwarder misconfigured | `500 Internal Server Error` |
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Transport details and envelope decoding live here.
//! The [`forwarder`] crate sees only [`forwarder::DeviceRegistrationEvent`].

pub mod cloud_event;
mod server;

use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use forwarder::{ForwarderError, RetryPolicy};
use thiserror::Error;
use tracing::warn;

pub use cloud_event::{CloudEvent, Encoding};
pub use server::{router, serve};

/// Reasons an incoming request is not forwarded.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Neither a content type nor a `ce-id` header was present.
    #[error("Request is not a CloudEvent")]
    NotACloudEvent,

    /// A required CloudEvent attribute is absent.
    #[error("Missing CloudEvent attribute '{0}'")]
    MissingAttribute(&'static str),

    /// An attribute is present but unreadable.
    #[error("Invalid CloudEvent attribute '{name}': {reason}")]
    InvalidAttribute {
        /// Header or attribute name.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// The event declares a spec version other than 1.0.
    #[error("Unsupported CloudEvents spec version '{0}'")]
    UnsupportedSpecVersion(String),

    /// The envelope or its data could not be decoded.
    #[error("Malformed CloudEvent: {0}")]
    MalformedEvent(String),

    /// The event data has no `payload` object.
    #[error("CloudEvent data carries no alert payload")]
    MissingPayload,

    /// Forwarding the decoded event failed.
    #[error(transparent)]
    Forwarder(#[from] ForwarderError),
}

impl ListenerError {
    /// HTTP status reported back to the delivering platform.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ListenerError::Forwarder(ForwarderError::ConfigurationError { .. }) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ListenerError::Forwarder(ForwarderError::DispatchError(err)) => {
                match err.retry_policy() {
                    RetryPolicy::Retryable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                    RetryPolicy::NonRetryable => StatusCode::BAD_GATEWAY,
                }
            }
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ListenerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_client_error() {
            warn!(error = %self, "Rejected event delivery");
        }

        let retry_after = match &self {
            ListenerError::Forwarder(err) => match err.retry_policy() {
                RetryPolicy::Retryable { after: Some(after) } => Some(after.as_secs()),
                _ => None,
            },
            _ => None,
        };

        let mut response = (status, self.to_string()).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }
        response
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
