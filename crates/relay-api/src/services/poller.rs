//! Status polling with provider fallback.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use relay_models::{
    is_valid_job_id, is_valid_output_format, JobRecord, JobStatus, JobStatusView, JobUpdate,
    OutputLocation, ProviderStatus,
};
use relay_provider::{JobProvider, ProviderError, ProviderJobStatus};
use relay_store::{JobStore, StoreError, Transition};

use super::completion::{Channel, Completion, CompletionCoordinator};
use crate::metrics;

#[derive(Debug, Error)]
pub enum PollError {
    #[error("{0}")]
    InvalidRequest(String),

    /// Transport failure, timeout or unexpected response from the provider.
    /// Nothing is persisted.
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Status lookup interrupted: {0}")]
    Interrupted(String),
}

/// Answers status queries, pulling from the provider when no terminal
/// state is known locally.
pub struct StatusPoller {
    store: Arc<dyn JobStore>,
    provider: Arc<dyn JobProvider>,
    completion: Arc<CompletionCoordinator>,
    default_output_format: String,
}

impl StatusPoller {
    pub fn new(
        store: Arc<dyn JobStore>,
        provider: Arc<dyn JobProvider>,
        completion: Arc<CompletionCoordinator>,
        default_output_format: impl Into<String>,
    ) -> Self {
        Self {
            store,
            provider,
            completion,
            default_output_format: default_output_format.into(),
        }
    }

    /// Current status of `job_id`.
    ///
    /// Terminal records are answered locally. Otherwise the provider is asked
    /// from a spawned task, so a caller that disconnects mid-request does not
    /// abandon a finalization halfway.
    pub async fn query(self: &Arc<Self>, job_id: &str) -> Result<JobStatusView, PollError> {
        let job_id = job_id.trim();
        if job_id.is_empty() {
            return Err(PollError::InvalidRequest("jobId is required".to_string()));
        }
        if !is_valid_job_id(job_id) {
            return Err(PollError::InvalidRequest(format!(
                "jobId {:?} is not a valid job id",
                job_id
            )));
        }

        let local = self.store.get(job_id).await?;
        if let Some(record) = local.as_ref().filter(|r| r.is_terminal()) {
            return Ok(JobStatusView::from(record));
        }

        let poller = Arc::clone(self);
        let job_id = job_id.to_string();
        tokio::spawn(async move { poller.pull(&job_id, local).await })
            .await
            .map_err(|e| PollError::Interrupted(e.to_string()))?
    }

    async fn pull(
        &self,
        job_id: &str,
        local: Option<JobRecord>,
    ) -> Result<JobStatusView, PollError> {
        let status = match self.provider.status(job_id).await {
            Ok(status) => status,
            Err(ProviderError::NotFound(body)) => {
                metrics::record_poll_fallback("not_found");
                return self.not_found(job_id, local.is_some(), body).await;
            }
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Provider status query failed");
                metrics::record_poll_fallback("unavailable");
                return Err(PollError::ProviderUnavailable(e.to_string()));
            }
        };

        let location = status.output.as_ref().and_then(|o| o.location());
        let seed = match local {
            Some(_) => None,
            None => Some(self.adopt(job_id, location.as_ref())),
        };

        match &status.status {
            ProviderStatus::Finished => {
                metrics::record_poll_fallback("finished");
                match location {
                    Some(location) => self.finalize(job_id, &location, seed).await,
                    None => {
                        warn!(job_id = %job_id, "Provider reported completion without output");
                        self.commit(
                            job_id,
                            JobUpdate::Failed {
                                error: "Provider reported completion without an output URL"
                                    .to_string(),
                            },
                            seed,
                        )
                        .await
                    }
                }
            }
            ProviderStatus::Error => {
                metrics::record_poll_fallback("error");
                let error = status
                    .error
                    .clone()
                    .unwrap_or_else(|| "Job failed at provider".to_string());
                self.commit(job_id, JobUpdate::Failed { error }, seed).await
            }
            ProviderStatus::Queued | ProviderStatus::Processing | ProviderStatus::Other(_) => {
                metrics::record_poll_fallback("pending");
                self.commit(job_id, progress_update(&status), seed).await
            }
        }
    }

    async fn finalize(
        &self,
        job_id: &str,
        location: &OutputLocation,
        seed: Option<JobRecord>,
    ) -> Result<JobStatusView, PollError> {
        let completion = self
            .completion
            .complete(job_id, location, seed.clone(), Channel::Poll)
            .await?;

        match completion {
            Completion::Finalized(record) | Completion::AlreadyTerminal(record) => {
                Ok(JobStatusView::from(&record))
            }
            Completion::InFlight(record) => Ok(record
                .as_ref()
                .map(JobStatusView::from)
                .unwrap_or_else(JobStatusView::processing)),
            Completion::Missing => Ok(JobStatusView::processing()),
            Completion::Failed { error, .. } => {
                self.commit(
                    job_id,
                    JobUpdate::Failed {
                        error: format!("Finalization failed: {}", error),
                    },
                    seed,
                )
                .await
            }
        }
    }

    async fn not_found(
        &self,
        job_id: &str,
        known_locally: bool,
        body: String,
    ) -> Result<JobStatusView, PollError> {
        let detail = if body.trim().is_empty() {
            format!("Job {} not found at provider", job_id)
        } else {
            format!("Job {} not found at provider: {}", job_id, body.trim())
        };
        warn!(job_id = %job_id, "Provider no longer tracks job");

        if !known_locally {
            // Never heard of it on either side; nothing worth persisting.
            return Ok(JobStatusView::not_found(detail));
        }
        self.commit(job_id, JobUpdate::NotFound { error: detail }, None)
            .await
    }

    async fn commit(
        &self,
        job_id: &str,
        update: JobUpdate,
        seed: Option<JobRecord>,
    ) -> Result<JobStatusView, PollError> {
        let target = update.target_status();
        match self.store.transition(job_id, update, seed).await? {
            Transition::Applied(record) => {
                if record.is_terminal() {
                    info!(job_id = %job_id, status = %record.status, "Job settled by poll");
                }
                Ok(JobStatusView::from(&record))
            }
            Transition::Unchanged(record) => Ok(JobStatusView::from(&record)),
            // Record vanished between read and write.
            Transition::Missing => Ok(match target {
                JobStatus::Queued | JobStatus::Processing => JobStatusView::processing(),
                _ => JobStatusView::not_found(format!("Job {} not found", job_id)),
            }),
        }
    }

    fn adopt(&self, job_id: &str, location: Option<&OutputLocation>) -> JobRecord {
        let output_format = location
            .and_then(OutputLocation::extension)
            .filter(|ext| is_valid_output_format(ext))
            .unwrap_or_else(|| self.default_output_format.clone());
        info!(job_id = %job_id, output_format = %output_format, "Adopting job unknown locally");
        JobRecord::adopted(job_id, output_format)
    }
}

fn progress_update(status: &ProviderJobStatus) -> JobUpdate {
    let mapped = match status.status {
        ProviderStatus::Queued => JobStatus::Queued,
        _ => JobStatus::Processing,
    };
    JobUpdate::Progress {
        status: mapped,
        provider_status: Some(status.raw_status.clone()),
    }
}
