//! Short-lived VCS token retrieval from the credential service.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential service request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("credential service returned status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[allow(dead_code)]
    success: bool,
    token: String,
}

/// Client for the core API's project-token endpoint. The provider segment
/// is parameterised; `github` is the only provider currently wired by the
/// control plane.
#[derive(Clone)]
pub struct CredentialFetcher {
    client: reqwest::Client,
    base_url: String,
    provider: String,
}

impl CredentialFetcher {
    pub fn new(base_url: &str) -> Self {
        Self::for_provider(base_url, "github")
    }

    pub fn for_provider(base_url: &str, provider: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("reqwest client"),
            base_url: base_url.trim_end_matches('/').to_string(),
            provider: provider.to_string(),
        }
    }

    /// Fetches a short-lived token for the project's VCS integration.
    /// `Ok(None)` means the project has no integration (a 404 upstream).
    pub async fn project_token(
        &self,
        project_id: &str,
    ) -> Result<Option<String>, CredentialError> {
        let url = format!(
            "{}/{}/project-token/{}",
            self.base_url, self.provider, project_id
        );
        debug!(url, "fetching VCS token");

        let response = self.client.get(&url).send().await?;
        match response.status().as_u16() {
            200 => {
                let body: TokenResponse = response.json().await?;
                Ok(Some(body.token))
            }
            404 => {
                debug!(project_id, "no VCS integration for project");
                Ok(None)
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(CredentialError::UnexpectedStatus { status, body })
            }
        }
    }
}
