//! The event forwarder and the port it dispatches through.
//!
//! [`EventForwarder`] owns the only piece of logic in the system: turn one
//! [`DeviceRegistrationEvent`] into one [`DispatchRequest`] and hand it to a
//! [`WorkflowDispatcher`] exactly once. Transport details live behind the
//! trait in the `github` crate.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, Instrument};

use crate::{
    Credential, DeviceRegistrationEvent, DispatchError, DispatchRequest, DispatchTarget,
    ForwarderError, InvocationId,
};

/// Port for triggering a workflow run.
///
/// Implementations perform exactly one outbound call per invocation and must
/// not retry internally; failures are reported as [`DispatchError`].
#[async_trait]
pub trait WorkflowDispatcher: Send + Sync {
    /// Issues the dispatch call authenticated with `credential`.
    ///
    /// Returns `Ok(())` only when the downstream API answered with a 2xx status.
    async fn dispatch(
        &self,
        credential: &Credential,
        request: &DispatchRequest,
    ) -> Result<(), DispatchError>;
}

/// Forwards "new tester device" events to the device registration workflow.
///
/// Holds no mutable state; a single instance may serve any number of
/// concurrent invocations.
#[derive(Clone)]
pub struct EventForwarder {
    credential: Credential,
    target: DispatchTarget,
    dispatcher: Arc<dyn WorkflowDispatcher>,
}

impl EventForwarder {
    /// Creates a forwarder targeting [`DispatchTarget::register_new_device`].
    ///
    /// The credential is validated when it is loaded (see
    /// [`Credential::from_env`]), so a forwarder can never exist without one.
    pub fn new(credential: Credential, dispatcher: Arc<dyn WorkflowDispatcher>) -> Self {
        Self::with_target(credential, DispatchTarget::register_new_device(), dispatcher)
    }

    /// Creates a forwarder for an explicit target.
    pub fn with_target(
        credential: Credential,
        target: DispatchTarget,
        dispatcher: Arc<dyn WorkflowDispatcher>,
    ) -> Self {
        Self {
            credential,
            target,
            dispatcher,
        }
    }

    /// Returns the target every dispatch is sent to.
    pub fn target(&self) -> &DispatchTarget {
        &self.target
    }

    /// Forwards one event as one workflow-dispatch call.
    ///
    /// # Errors
    ///
    /// Returns [`ForwarderError::DispatchError`] if the call fails for any
    /// reason. The call is never retried here.
    pub async fn forward(&self, event: &DeviceRegistrationEvent) -> Result<(), ForwarderError> {
        let invocation_id = InvocationId::new_random();
        let span = tracing::info_span!(
            "forward",
            invocation_id = %invocation_id,
            udid = %event.device_udid,
            model = %event.device_model_name,
            app_id = event.app_id.as_ref().map(|id| id.as_str()),
        );

        async move {
            let request = DispatchRequest::for_event(self.target.clone(), event);
            info!(
                dispatch_target = %request.target,
                tester_email = %event.tester_email,
                tester_name = event.tester_name.as_ref().map(|name| name.as_str()),
                "Triggering device registration workflow"
            );

            match self.dispatcher.dispatch(&self.credential, &request).await {
                Ok(()) => {
                    info!("Device registration workflow triggered");
                    Ok(())
                }
                Err(err) => {
                    error!(
                        error = %err,
                        status = err.status(),
                        retry_policy = ?err.retry_policy(),
                        "Device registration workflow dispatch failed"
                    );
                    Err(ForwarderError::from(err))
                }
            }
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "forwarder_tests.rs"]
mod tests;
