//! CloudEvents over HTTP, reduced to what App Distribution alerts need.
//!
//! Both content modes of the HTTP protocol binding are accepted:
//!
//! - **structured** — `Content-Type: application/cloudevents+json`; the body is
//!   the whole envelope.
//! - **binary** — attributes travel as `ce-*` headers; the body is `data`.

use axum::body::Bytes;
use axum::http::HeaderMap;
use chrono::{DateTime, FixedOffset};
use forwarder::{AppId, DeviceRegistrationEvent, TesterDevicePayload};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ListenerError;

/// Media type of a structured-mode event.
pub const CE_JSON_CONTENT_TYPE: &str = "application/cloudevents+json";
const CONTENT_TYPE_HEADER: &str = "content-type";
/// Binary-mode `id` attribute.
pub const CE_ID_HEADER: &str = "ce-id";
/// Binary-mode `type` attribute.
pub const CE_TYPE_HEADER: &str = "ce-type";
/// Binary-mode `source` attribute.
pub const CE_SOURCE_HEADER: &str = "ce-source";
/// Binary-mode `specversion` attribute.
pub const CE_SPECVERSION_HEADER: &str = "ce-specversion";
/// Binary-mode `subject` attribute.
pub const CE_SUBJECT_HEADER: &str = "ce-subject";
/// Binary-mode `time` attribute.
pub const CE_TIME_HEADER: &str = "ce-time";
/// Firebase Alerts `appid` extension.
pub const CE_APPID_HEADER: &str = "ce-appid";
/// Firebase Alerts `alerttype` extension.
pub const CE_ALERTTYPE_HEADER: &str = "ce-alerttype";

/// The only CloudEvents spec version accepted.
pub const SPEC_VERSION: &str = "1.0";

/// `alerttype` extension value of "new tester iOS device" alerts.
pub const NEW_TESTER_IOS_DEVICE_ALERT: &str = "appDistribution.newTesterIosDevice";

/// Encoding the event arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// The body held the whole envelope.
    Structured,
    /// Attributes came as `ce-*` headers.
    Binary,
}

/// A received CloudEvent with the Firebase Alerts extension attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudEvent {
    /// Event id, unique per source.
    pub id: String,
    /// Producer of the event.
    pub source: String,
    /// Event type, e.g. `google.firebase.firebasealerts.alerts.v1.published`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Always [`SPEC_VERSION`] once parsed.
    #[serde(rename = "specversion")]
    pub spec_version: String,
    /// Optional subject within the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// When the event occurred.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<FixedOffset>>,
    /// Firebase app the alert was raised for.
    #[serde(rename = "appid", default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    /// Firebase alert kind, e.g. [`NEW_TESTER_IOS_DEVICE_ALERT`].
    #[serde(rename = "alerttype", default, skip_serializing_if = "Option::is_none")]
    pub alert_type: Option<String>,
    /// Event data; alerts carry the device fields under `payload`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl CloudEvent {
    /// Returns `true` unless the event declares a different alert type.
    ///
    /// Events without an `alerttype` attribute are assumed to come from a
    /// subscription already filtered to new tester devices.
    pub fn is_new_tester_ios_device(&self) -> bool {
        self.alert_type
            .as_deref()
            .map_or(true, |alert_type| alert_type == NEW_TESTER_IOS_DEVICE_ALERT)
    }

    /// Extracts the device registration from `data.payload`.
    pub fn device_registration(&self) -> Result<DeviceRegistrationEvent, ListenerError> {
        let payload = self
            .data
            .as_ref()
            .and_then(|data| data.get("payload"))
            .ok_or(ListenerError::MissingPayload)?;
        let payload: TesterDevicePayload = serde_json::from_value(payload.clone())
            .map_err(|err| ListenerError::MalformedEvent(format!("alert payload: {err}")))?;

        let event = DeviceRegistrationEvent::try_from(payload)?;
        Ok(event.with_app_id(self.app_id.clone().and_then(AppId::new)))
    }
}

// Possible cases:
// 1. Content-type exists:
// 1.1 If application/cloudevents+json -> parse structured
// 1.2 If other -> parse binary
// 2. Content-type doesn't exist:
// 2.1 If CE id header, then it's an empty payload cloud event -> parse binary
// 2.2 If no CE header -> not a cloud event
/// Reads a CloudEvent from an HTTP request in either content mode.
pub fn read_cloud_event(
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<(Encoding, CloudEvent), ListenerError> {
    if let Some(ct) = header_str(headers, CONTENT_TYPE_HEADER)? {
        if body.is_empty() {
            return Err(ListenerError::MalformedEvent(format!(
                "no payload provided but content type is {ct}"
            )));
        }
        return if is_structured_content_type(&ct) {
            parse_structured(body).map(|ce| (Encoding::Structured, ce))
        } else {
            parse_binary(headers, Some(body)).map(|ce| (Encoding::Binary, ce))
        };
    }

    if headers.contains_key(CE_ID_HEADER) {
        return parse_binary(headers, None).map(|ce| (Encoding::Binary, ce));
    }

    Err(ListenerError::NotACloudEvent)
}

/// Media types compare case-insensitively and may carry parameters.
fn is_structured_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|media_type| media_type.trim().eq_ignore_ascii_case(CE_JSON_CONTENT_TYPE))
}

fn parse_structured(body: &Bytes) -> Result<CloudEvent, ListenerError> {
    let event: CloudEvent = serde_json::from_slice(body)
        .map_err(|err| ListenerError::MalformedEvent(err.to_string()))?;
    check_spec_version(&event.spec_version)?;
    Ok(event)
}

fn parse_binary(headers: &HeaderMap, body: Option<&Bytes>) -> Result<CloudEvent, ListenerError> {
    let spec_version = required_header(headers, CE_SPECVERSION_HEADER)?;
    check_spec_version(&spec_version)?;

    let time = header_str(headers, CE_TIME_HEADER)?
        .map(|t| {
            DateTime::parse_from_rfc3339(&t).map_err(|err| ListenerError::InvalidAttribute {
                name: CE_TIME_HEADER,
                reason: err.to_string(),
            })
        })
        .transpose()?;

    let data = body
        .map(|b| {
            serde_json::from_slice::<Value>(b)
                .map_err(|err| ListenerError::MalformedEvent(format!("data: {err}")))
        })
        .transpose()?;

    Ok(CloudEvent {
        id: required_header(headers, CE_ID_HEADER)?,
        source: required_header(headers, CE_SOURCE_HEADER)?,
        event_type: required_header(headers, CE_TYPE_HEADER)?,
        spec_version,
        subject: header_str(headers, CE_SUBJECT_HEADER)?,
        time,
        app_id: header_str(headers, CE_APPID_HEADER)?,
        alert_type: header_str(headers, CE_ALERTTYPE_HEADER)?,
        data,
    })
}

fn check_spec_version(spec_version: &str) -> Result<(), ListenerError> {
    if spec_version == SPEC_VERSION {
        Ok(())
    } else {
        Err(ListenerError::UnsupportedSpecVersion(spec_version.to_string()))
    }
}

fn required_header(headers: &HeaderMap, name: &'static str) -> Result<String, ListenerError> {
    header_str(headers, name)?.ok_or(ListenerError::MissingAttribute(name))
}

fn header_str(headers: &HeaderMap, name: &'static str) -> Result<Option<String>, ListenerError> {
    headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map(String::from)
                .map_err(|err| ListenerError::InvalidAttribute {
                    name,
                    reason: err.to_string(),
                })
        })
        .transpose()
}

#[cfg(test)]
#[path = "cloud_event_tests.rs"]
mod tests;
