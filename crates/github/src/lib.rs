#[cfg(any(test, feature = "test-util"))]
pub mod testing;

use anyhow::{Context, Result};
use framework_patcher_core::{
    DispatchError,
    config::{GitHubConfig, Secret},
    models::{Dispatch, DispatchPayload, Variant},
};
use reqwest::{Client, header};

const API_VERSION: &str = "2022-11-28";

/// Client for the workflow dispatch endpoint of one repository.
#[derive(Clone)]
pub struct GitHub {
    client: Client,
    config: GitHubConfig,
}

impl GitHub {
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout())
            .build()
            .context("Failed to create GitHub client")?;
        Ok(Self { client, config: config.clone() })
    }

    pub fn token(&self) -> Option<&Secret> { self.config.token() }

    pub fn dispatch_url(&self, variant: Variant) -> String {
        format!(
            "{}/repos/{}/{}/actions/workflows/{}/dispatches",
            self.config.api_url.trim_end_matches('/'),
            self.config.owner,
            self.config.repo,
            variant.workflow_file()
        )
    }

    /// Page listing the runs of the variant's workflow.
    pub fn workflow_url(&self, variant: Variant) -> String {
        format!(
            "{}/{}/{}/actions/workflows/{}",
            self.config.html_url.trim_end_matches('/'),
            self.config.owner,
            self.config.repo,
            variant.workflow_file()
        )
    }

    /// Create a workflow dispatch event. Exactly one request is made; failures are
    /// not retried. Returns the workflow page URL on success.
    pub async fn dispatch(&self, dispatch: &Dispatch) -> Result<String, DispatchError> {
        let token = self.token().ok_or(DispatchError::ConfigurationError)?;
        let payload = DispatchPayload { git_ref: &self.config.git_ref, inputs: &dispatch.inputs };
        let response = self
            .client
            .post(self.dispatch_url(dispatch.variant))
            .bearer_auth(token.expose())
            .header(header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .json(&payload)
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(self.workflow_url(dispatch.variant));
        }
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!("Failed to read GitHub error body: {e}");
                String::new()
            }
        };
        Err(DispatchError::from_upstream(status.as_u16(), body))
    }
}

fn transport_error(err: reqwest::Error) -> DispatchError {
    let reason = if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        "connection failed".to_string()
    } else {
        err.without_url().to_string()
    };
    DispatchError::TransportError(reason)
}
