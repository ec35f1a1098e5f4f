//! Value types flowing through one forwarding invocation.
//!
//! The flow is strictly linear:
//!
//! ```text
//! TesterDevicePayload ──try_from──▶ DeviceRegistrationEvent
//!                                          │
//!                          DispatchTarget ─┴─for_event──▶ DispatchRequest ──body()──▶ JSON
//! ```
//!
//! [`TesterDevicePayload`] mirrors the wire shape with every field optional so
//! that missing fields are reported by name instead of as an opaque serde
//! error. [`DeviceRegistrationEvent`] is the validated form.

use serde::{Deserialize, Serialize};

use crate::{
    AppId, DeviceModelName, DeviceUdid, ForwarderError, GitRef, RepositoryName, RepositoryOwner,
    TesterEmail, TesterName, WorkflowFile,
};

/// Environment variable holding the GitHub token used to trigger the CI workflow.
pub const CREDENTIAL_ENV_VAR: &str = "GITHUB_API_KEY_TRIGGER_CI_SERVER_REGISTER_NEW_TOKEN";

// ---------------------------------------------------------------------------
// Inbound event
// ---------------------------------------------------------------------------

/// Raw "new tester iOS device" payload as published by App Distribution.
///
/// Unknown fields (e.g. the `@type` discriminator) are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TesterDevicePayload {
    /// UDID of the registered device.
    pub tester_device_identifier: Option<String>,
    /// Model name of the registered device.
    pub tester_device_model_name: Option<String>,
    /// Email of the tester who registered the device.
    pub tester_email: Option<String>,
    /// Display name of the tester.
    pub tester_name: Option<String>,
}

/// A validated "new tester device registered" event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRegistrationEvent {
    /// Device UDID; becomes the `ios_device_udid` workflow input.
    pub device_udid: DeviceUdid,
    /// Device model name; becomes the `device_model_name` workflow input.
    pub device_model_name: DeviceModelName,
    /// Tester email; becomes the `device_tester_email` workflow input.
    pub tester_email: TesterEmail,
    /// Tester display name, when the payload carried one.
    pub tester_name: Option<TesterName>,
    /// App the event was published for, when the envelope carried one.
    pub app_id: Option<AppId>,
}

impl DeviceRegistrationEvent {
    /// Creates an event from its three required fields.
    pub fn new(
        device_udid: DeviceUdid,
        device_model_name: DeviceModelName,
        tester_email: TesterEmail,
    ) -> Self {
        Self {
            device_udid,
            device_model_name,
            tester_email,
            tester_name: None,
            app_id: None,
        }
    }

    /// Attaches the app identifier taken from the event envelope.
    pub fn with_app_id(mut self, app_id: Option<AppId>) -> Self {
        self.app_id = app_id;
        self
    }
}

impl TryFrom<TesterDevicePayload> for DeviceRegistrationEvent {
    type Error = ForwarderError;

    fn try_from(payload: TesterDevicePayload) -> Result<Self, Self::Error> {
        let device_udid = payload
            .tester_device_identifier
            .and_then(DeviceUdid::new)
            .ok_or_else(|| ForwarderError::invalid_event("testerDeviceIdentifier"))?;
        let device_model_name = payload
            .tester_device_model_name
            .and_then(DeviceModelName::new)
            .ok_or_else(|| ForwarderError::invalid_event("testerDeviceModelName"))?;
        let tester_email = payload
            .tester_email
            .and_then(TesterEmail::new)
            .ok_or_else(|| ForwarderError::invalid_event("testerEmail"))?;

        Ok(Self {
            device_udid,
            device_model_name,
            tester_email,
            tester_name: payload.tester_name.and_then(TesterName::new),
            app_id: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

/// Bearer token authenticating the workflow-dispatch call.
///
/// Loaded once at startup and injected into [`crate::EventForwarder`]. The
/// `Debug` implementation never prints the token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wraps a token, failing with a configuration error if it is empty.
    pub fn new(token: impl Into<String>) -> Result<Self, ForwarderError> {
        let token = token.into();
        if token.is_empty() {
            Err(ForwarderError::missing_secret(CREDENTIAL_ENV_VAR))
        } else {
            Ok(Self(token))
        }
    }

    /// Reads the token through `lookup`, keyed by [`CREDENTIAL_ENV_VAR`].
    ///
    /// An unset or empty value yields [`ForwarderError::ConfigurationError`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ForwarderError>
    where
        F: FnOnce(&str) -> Option<String>,
    {
        lookup(CREDENTIAL_ENV_VAR)
            .ok_or_else(|| ForwarderError::missing_secret(CREDENTIAL_ENV_VAR))
            .and_then(Self::new)
    }

    /// Reads the token from the process environment.
    pub fn from_env() -> Result<Self, ForwarderError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Returns the raw token for building the `Authorization` header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

// ---------------------------------------------------------------------------
// Outbound request
// ---------------------------------------------------------------------------

/// The repository, workflow and ref a dispatch targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchTarget {
    /// Repository owner.
    pub owner: RepositoryOwner,
    /// Repository name.
    pub repository: RepositoryName,
    /// Workflow file that declares the `workflow_dispatch` trigger.
    pub workflow: WorkflowFile,
    /// Branch holding the workflow file.
    pub git_ref: GitRef,
}

impl DispatchTarget {
    /// The code-signing repository's device registration workflow on `main`.
    pub fn register_new_device() -> Self {
        Self {
            owner: RepositoryOwner::from_static("customerio"),
            repository: RepositoryName::from_static("apple-code-signing"),
            workflow: WorkflowFile::from_static("register-new-device.yml"),
            git_ref: GitRef::from_static("main"),
        }
    }

    /// REST path of the workflow-dispatch endpoint, relative to the API root.
    pub fn dispatch_path(&self) -> String {
        format!(
            "/repos/{}/{}/actions/workflows/{}/dispatches",
            self.owner, self.repository, self.workflow
        )
    }
}

impl std::fmt::Display for DispatchTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}:{}@{}",
            self.owner, self.repository, self.workflow, self.git_ref
        )
    }
}

/// Inputs declared by the device registration workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowInputs {
    /// UDID of the device to register with Apple.
    pub ios_device_udid: DeviceUdid,
    /// Model name used as the device's display name.
    pub device_model_name: DeviceModelName,
    /// Tester to notify once the device is registered.
    pub device_tester_email: TesterEmail,
}

/// One workflow-dispatch call, built fresh for every event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    /// Where the workflow lives.
    pub target: DispatchTarget,
    /// Values passed to the workflow run.
    pub inputs: WorkflowInputs,
}

impl DispatchRequest {
    /// Maps the event's device fields onto the workflow inputs.
    pub fn for_event(target: DispatchTarget, event: &DeviceRegistrationEvent) -> Self {
        Self {
            target,
            inputs: WorkflowInputs {
                ios_device_udid: event.device_udid.clone(),
                device_model_name: event.device_model_name.clone(),
                device_tester_email: event.tester_email.clone(),
            },
        }
    }

    /// JSON body of the dispatch call: `{"ref": .., "inputs": {..}}`.
    pub fn body(&self) -> DispatchBody<'_> {
        DispatchBody {
            git_ref: &self.target.git_ref,
            inputs: &self.inputs,
        }
    }
}

/// Serialisable view of a [`DispatchRequest`] in GitHub's request-body shape.
#[derive(Debug, Serialize)]
pub struct DispatchBody<'a> {
    /// Ref the workflow run starts on.
    #[serde(rename = "ref")]
    pub git_ref: &'a GitRef,
    /// Workflow inputs.
    pub inputs: &'a WorkflowInputs,
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
