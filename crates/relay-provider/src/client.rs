//! Provider HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use tracing::{debug, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::types::{ProviderJobStatus, StatusResponse, SubmitJob, SubmitPayload, SubmitResponse};

/// Header carrying the provider API key.
const API_KEY_HEADER: &str = "X-API-Key";

/// Operations the relay needs from the job processing provider.
#[async_trait]
pub trait JobProvider: Send + Sync {
    /// Submit a job; returns the provider-assigned id.
    async fn submit(&self, job: &SubmitJob) -> ProviderResult<String>;

    /// Current status of a job.
    async fn status(&self, job_id: &str) -> ProviderResult<ProviderJobStatus>;
}

/// Configuration for the provider client.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL of the provider API
    pub base_url: String,
    /// API key sent with every request
    pub api_key: String,
    /// Provider function that performs the transcode
    pub function: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl ProviderConfig {
    /// Create config from environment variables.
    pub fn from_env() -> ProviderResult<Self> {
        Ok(Self {
            base_url: std::env::var("PROVIDER_BASE_URL")
                .map_err(|_| ProviderError::config_error("PROVIDER_BASE_URL not set"))?,
            api_key: std::env::var("PROVIDER_API_KEY")
                .map_err(|_| ProviderError::config_error("PROVIDER_API_KEY not set"))?,
            function: std::env::var("PROVIDER_FUNCTION")
                .unwrap_or_else(|_| "media/transcode".to_string()),
            timeout: Duration::from_secs(
                std::env::var("PROVIDER_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
        })
    }
}

/// HTTP client for the job processing provider.
pub struct ProviderClient {
    http: Client,
    base: Url,
    config: ProviderConfig,
}

impl ProviderClient {
    /// Create a new provider client.
    pub fn new(config: ProviderConfig) -> ProviderResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::config_error("provider API key is empty"));
        }
        let base = Url::parse(config.base_url.trim()).map_err(|e| {
            ProviderError::config_error(format!("invalid provider base URL: {}", e))
        })?;
        if base.cannot_be_a_base() {
            return Err(ProviderError::config_error(format!(
                "provider base URL {} cannot carry a path",
                base
            )));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ProviderError::Network)?;

        Ok(Self { http, base, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> ProviderResult<Self> {
        Self::new(ProviderConfig::from_env()?)
    }

    /// Base URL with `segments` appended, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn map_send_error(&self, e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout(self.config.timeout.as_secs())
        } else {
            ProviderError::Network(e)
        }
    }
}

#[async_trait]
impl JobProvider for ProviderClient {
    async fn submit(&self, job: &SubmitJob) -> ProviderResult<String> {
        let url = self.endpoint(&["push"]);
        debug!("Submitting job to {}", url);

        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&SubmitPayload::new(&self.config.function, job))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.map_send_error(e))?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "Provider rejected submission");
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SubmitResponse = serde_json::from_str(&body)
            .map_err(|_| ProviderError::InvalidResponse(body.clone()))?;

        match parsed.id {
            Some(id) if !id.trim().is_empty() => Ok(id),
            _ => Err(ProviderError::InvalidResponse(body)),
        }
    }

    async fn status(&self, job_id: &str) -> ProviderResult<ProviderJobStatus> {
        let url = self.endpoint(&["jobs", job_id]);
        debug!("Querying provider status at {}", url);

        let response = self
            .http
            .get(url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.map_send_error(e))?;

        if status == StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(if body.is_empty() {
                format!("Job {} not found", job_id)
            } else {
                body
            }));
        }

        if !status.is_success() {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: StatusResponse = serde_json::from_str(&body)
            .map_err(|_| ProviderError::InvalidResponse(body.clone()))?;
        Ok(parsed.into())
    }
}
