//! Shared HTTP client for the manifest and artifact requests.

use reqwest::{Client, Response};
use std::time::Duration;
use tracing::debug;

use crate::config::UpdateConfig;
use crate::constants::USER_AGENT;
use crate::core::UpdateError;

/// Thin wrapper around [`reqwest::Client`] carrying the two request budgets.
///
/// The manifest request is bounded as a whole. The artifact request only bounds
/// connection setup and the wait for the response head here; per-chunk idle
/// waits are enforced by [`PackageRetriever`](super::download::PackageRetriever).
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    manifest_timeout: Duration,
    download_timeout: Duration,
}

impl HttpClient {
    /// Build a client from the configured timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Config`] if the TLS backend cannot be initialised.
    pub fn new(manifest_timeout: Duration, download_timeout: Duration) -> Result<Self, UpdateError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(manifest_timeout.max(download_timeout))
            .build()
            .map_err(|e| UpdateError::Config {
                message: format!("Failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            manifest_timeout,
            download_timeout,
        })
    }

    /// Build a client from an [`UpdateConfig`].
    pub fn from_config(config: &UpdateConfig) -> Result<Self, UpdateError> {
        Self::new(config.manifest_timeout(), config.download_timeout())
    }

    #[must_use]
    pub const fn download_timeout(&self) -> Duration {
        self.download_timeout
    }

    /// GET the manifest, failing on transport errors, timeouts and non-success statuses.
    pub async fn get_manifest(&self, url: &str) -> Result<Response, UpdateError> {
        debug!("GET {} (timeout {:?})", url, self.manifest_timeout);

        let response = self
            .client
            .get(url)
            .timeout(self.manifest_timeout)
            .send()
            .await
            .map_err(|e| UpdateError::Fetch {
                url: url.to_string(),
                reason: describe(&e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpdateError::Fetch {
                url: url.to_string(),
                reason: format!("HTTP {status}"),
            });
        }

        Ok(response)
    }

    /// GET the artifact and return the response once headers arrived.
    pub async fn get_artifact(&self, url: &str) -> Result<Response, UpdateError> {
        debug!("GET {} (idle timeout {:?})", url, self.download_timeout);

        let response = tokio::time::timeout(self.download_timeout, self.client.get(url).send())
            .await
            .map_err(|_| UpdateError::Download {
                url: url.to_string(),
                reason: format!("no response within {:?}", self.download_timeout),
            })?
            .map_err(|e| UpdateError::Download {
                url: url.to_string(),
                reason: describe(&e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpdateError::Download {
                url: url.to_string(),
                reason: format!("HTTP {status}"),
            });
        }

        Ok(response)
    }
}

/// Render a transport error together with its underlying cause.
pub(crate) fn describe(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        return "request timed out".to_string();
    }
    match std::error::Error::source(error) {
        Some(source) => format!("{error}: {source}"),
        None => error.to_string(),
    }
}
