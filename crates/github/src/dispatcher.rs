use std::time::Duration;

use async_trait::async_trait;
use forwarder::{Credential, DispatchError, DispatchRequest, WorkflowDispatcher};
use reqwest::header::{ACCEPT, RETRY_AFTER};
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};

/// Root of the public GitHub REST API.
pub const GITHUB_API_URL: &str = "https://api.github.com";

/// REST API version pinned through the `X-GitHub-Api-Version` header.
pub const GITHUB_API_VERSION: &str = "2022-11-28";

const API_VERSION_HEADER: &str = "X-GitHub-Api-Version";
const GITHUB_JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
const USER_AGENT: &str = concat!("device-registration-forwarder/", env!("CARGO_PKG_VERSION"));

/// Failure to construct the HTTP client at startup.
#[derive(Debug, Error)]
pub enum GithubClientError {
    /// `reqwest` rejected the client configuration (e.g. TLS backend unavailable).
    #[error("Failed to build GitHub HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Triggers workflow runs through the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GithubWorkflowDispatcher {
    client: Client,
    api_base_url: String,
}

impl GithubWorkflowDispatcher {
    /// Builds a dispatcher with its own HTTP client.
    ///
    /// `timeout` bounds the whole request; `None` leaves it to the hosting
    /// platform's invocation limit.
    pub fn new(
        api_base_url: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, GithubClientError> {
        let mut builder = Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self::with_client(builder.build()?, api_base_url))
    }

    /// Wraps an existing client. The client should set a `User-Agent`; GitHub
    /// rejects requests without one.
    pub fn with_client(client: Client, api_base_url: impl Into<String>) -> Self {
        let api_base_url = api_base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            api_base_url,
        }
    }

    /// Returns the API root requests are sent to.
    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    fn dispatch_url(&self, request: &DispatchRequest) -> String {
        format!("{}{}", self.api_base_url, request.target.dispatch_path())
    }
}

#[async_trait]
impl WorkflowDispatcher for GithubWorkflowDispatcher {
    async fn dispatch(
        &self,
        credential: &Credential,
        request: &DispatchRequest,
    ) -> Result<(), DispatchError> {
        let url = self.dispatch_url(request);
        debug!(%url, "Sending workflow dispatch");

        let response = self
            .client
            .post(&url)
            .header(ACCEPT, GITHUB_JSON_MEDIA_TYPE)
            .header(API_VERSION_HEADER, GITHUB_API_VERSION)
            .bearer_auth(credential.expose())
            .json(&request.body())
            .send()
            .await
            .map_err(|err| DispatchError::Transport {
                message: err.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            debug!(status = status.as_u16(), "Workflow dispatch accepted");
            return Ok(());
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response.text().await.unwrap_or_default();

        warn!(status = status.as_u16(), %body, "Workflow dispatch rejected");
        Err(DispatchError::Status {
            status: status.as_u16(),
            body,
            retry_after,
        })
    }
}
