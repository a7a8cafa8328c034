//! Job submission: hand a job to the provider and record it.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, warn};
use validator::Validate;

use relay_models::{is_valid_job_id, is_valid_output_format, JobRecord, SubmitJobRequest};
use relay_provider::{JobProvider, ProviderError, SubmitJob};
use relay_store::{JobStore, StoreError};

use super::retry::{retry_async, RetryConfig, RetryResult};
use crate::config::RelayConfig;
use crate::metrics;

/// Delay before the first retry of the post-submission store write.
const STORE_WRITE_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Submission failed after {attempts} attempts: {detail}")]
    UpstreamSubmissionFailed { attempts: u32, detail: String },

    /// The provider accepted the job but returned an id that cannot be tracked.
    #[error("Job accepted upstream with an untrackable id {job_id:?}")]
    UnusableJobId { job_id: String },

    /// The provider accepted the job but it could not be recorded.
    #[error("Job {job_id} accepted upstream but not recorded: {source}")]
    StoreUnavailable { job_id: String, source: StoreError },
}

/// Submits jobs to the provider with bounded retries.
pub struct SubmissionGateway {
    provider: Arc<dyn JobProvider>,
    store: Arc<dyn JobStore>,
    submit_retry: RetryConfig,
    store_retry: RetryConfig,
    attempt_timeout: Duration,
    callback_url: String,
    default_output_format: String,
}

impl SubmissionGateway {
    pub fn new(
        provider: Arc<dyn JobProvider>,
        store: Arc<dyn JobStore>,
        config: &RelayConfig,
    ) -> Self {
        Self {
            provider,
            store,
            submit_retry: RetryConfig::new("provider_submit")
                .with_max_attempts(config.submit_max_attempts)
                .with_base_delay(config.submit_backoff),
            store_retry: RetryConfig::new("job_record_write")
                .with_max_attempts(config.submit_max_attempts)
                .with_base_delay(STORE_WRITE_BACKOFF),
            attempt_timeout: config.submit_attempt_timeout,
            callback_url: config.callback_url(),
            default_output_format: config.default_output_format.clone(),
        }
    }

    /// Submit a job; returns the provider-assigned job id.
    pub async fn submit(&self, request: SubmitJobRequest) -> Result<String, GatewayError> {
        let job = match self.validate(request) {
            Ok(job) => job,
            Err(e) => {
                metrics::record_submission("invalid");
                return Err(e);
            }
        };

        let job_id = self.submit_upstream(&job).await?;
        self.record(&job_id, &job).await?;

        info!(
            job_id = %job_id,
            output_format = %job.output_format,
            "Job submitted"
        );
        metrics::record_submission("accepted");
        Ok(job_id)
    }

    fn validate(&self, request: SubmitJobRequest) -> Result<SubmitJob, GatewayError> {
        request
            .validate()
            .map_err(|e| GatewayError::InvalidRequest(format!("Invalid request: {}", e)))?;

        let source_url = request.url.trim();
        if source_url.is_empty() {
            return Err(GatewayError::InvalidRequest("url is required".to_string()));
        }

        let output_format = request
            .output_format
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .unwrap_or(&self.default_output_format)
            .to_ascii_lowercase();
        if !is_valid_output_format(&output_format) {
            return Err(GatewayError::InvalidRequest(format!(
                "output_format {:?} must be 1-10 alphanumeric characters",
                output_format
            )));
        }

        Ok(SubmitJob {
            source_url: source_url.to_string(),
            output_format,
            callback_url: self.callback_url.clone(),
        })
    }

    async fn submit_upstream(&self, job: &SubmitJob) -> Result<String, GatewayError> {
        let result = retry_async(&self.submit_retry, |attempt| async move {
            match tokio::time::timeout(self.attempt_timeout, self.provider.submit(job)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(attempt, "Provider submission timed out");
                    Err(ProviderError::Timeout(self.attempt_timeout.as_secs()))
                }
            }
        })
        .await;

        let job_id = match result {
            RetryResult::Success(id) => id,
            RetryResult::Failed { error, attempts } => {
                let detail = error
                    .response_body()
                    .map(str::to_string)
                    .unwrap_or_else(|| error.to_string());
                metrics::record_submission("upstream_failed");
                return Err(GatewayError::UpstreamSubmissionFailed { attempts, detail });
            }
        };

        // The job exists upstream now; retrying would only duplicate it.
        if !is_valid_job_id(&job_id) {
            orphaned(&job_id, job, 1, "provider returned an untrackable job id");
            metrics::record_submission("unusable_id");
            return Err(GatewayError::UnusableJobId { job_id });
        }

        Ok(job_id)
    }

    async fn record(&self, job_id: &str, job: &SubmitJob) -> Result<(), GatewayError> {
        let record = JobRecord::queued(job_id, &job.source_url, &job.output_format);
        let result = retry_async(&self.store_retry, |_| {
            let record = record.clone();
            async move { self.store.set(record).await }
        })
        .await;

        match result {
            RetryResult::Success(()) => Ok(()),
            RetryResult::Failed { error, attempts } => {
                orphaned(job_id, job, attempts, &error.to_string());
                metrics::record_submission("store_failed");
                Err(GatewayError::StoreUnavailable {
                    job_id: job_id.to_string(),
                    source: error,
                })
            }
        }
    }
}

/// Log a job the provider accepted but the relay cannot track.
fn orphaned(job_id: &str, job: &SubmitJob, attempts: u32, reason: &str) {
    error!(
        job_id = %job_id,
        source_url = %job.source_url,
        attempts,
        error = %reason,
        "Orphaned provider job: accepted upstream but not recorded"
    );
    metrics::record_orphaned_submission();
}
