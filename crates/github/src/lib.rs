//! GitHub infrastructure adapter for the device registration forwarder.
//!
//! Implements [`forwarder::WorkflowDispatcher`] with a direct call to the
//! GitHub REST API endpoint
//! [`POST /repos/{owner}/{repo}/actions/workflows/{workflow_id}/dispatches`](https://docs.github.com/en/rest/actions/workflows#create-a-workflow-dispatch-event).
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain domain rules.
//! Headers, authentication, URL construction and status-code interpretation
//! live here; the [`forwarder`] crate never sees `reqwest` types.
//!
//! ## Retries
//!
//! None. Exactly one request is sent per dispatch. Rate-limit information
//! (`Retry-After`) is parsed and surfaced on [`forwarder::DispatchError`] so the
//! caller can decide what to do with it.

mod dispatcher;

pub use dispatcher::{
    GithubClientError, GithubWorkflowDispatcher, GITHUB_API_URL, GITHUB_API_VERSION,
};
