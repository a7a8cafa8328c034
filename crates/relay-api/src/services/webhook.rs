//! Webhook ingestion: provider-pushed status changes.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use relay_models::{
    describe_provider_error, is_valid_job_id, JobUpdate, ProviderOutput, ProviderStatus,
    WebhookDisposition, WebhookPayload,
};
use relay_store::{JobStore, StoreResult, Transition};

use super::completion::{Channel, Completion, CompletionCoordinator};
use super::finalizer::FinalizeError;

/// Applies webhook deliveries to the job store.
///
/// Never fails towards the provider: every delivery is acknowledged, and
/// internal failures are logged and counted instead.
pub struct WebhookIngestor {
    store: Arc<dyn JobStore>,
    completion: Arc<CompletionCoordinator>,
}

impl WebhookIngestor {
    pub fn new(store: Arc<dyn JobStore>, completion: Arc<CompletionCoordinator>) -> Self {
        Self { store, completion }
    }

    /// Apply one delivery.
    pub async fn receive(&self, payload: WebhookPayload) -> WebhookDisposition {
        let job_id = payload.job_id.clone();
        match self.apply(payload).await {
            Ok(disposition) => disposition,
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Webhook could not be applied");
                WebhookDisposition::Ignored
            }
        }
    }

    async fn apply(&self, payload: WebhookPayload) -> StoreResult<WebhookDisposition> {
        let job_id = payload.job_id.as_str();
        if !is_valid_job_id(job_id) {
            warn!(job_id = %job_id, "Webhook for malformed job id");
            return Ok(WebhookDisposition::Ignored);
        }

        let Some(record) = self.store.get(job_id).await? else {
            info!(job_id = %job_id, "Webhook for unknown job");
            return Ok(WebhookDisposition::Ignored);
        };
        if record.is_terminal() {
            debug!(job_id = %job_id, status = %record.status, "Webhook for terminal job");
            return Ok(WebhookDisposition::Ignored);
        }

        match ProviderStatus::parse(&payload.status) {
            ProviderStatus::Finished => {
                let location = payload
                    .data
                    .map(ProviderOutput::from_value)
                    .and_then(|output| output.location());

                let Some(location) = location else {
                    warn!(job_id = %job_id, "Finished webhook carried no output location");
                    return self
                        .fail(
                            job_id,
                            "Provider reported completion without an output URL".to_string(),
                        )
                        .await;
                };

                match self
                    .completion
                    .complete(job_id, &location, None, Channel::Webhook)
                    .await?
                {
                    Completion::Finalized(_) => Ok(WebhookDisposition::Received),
                    Completion::AlreadyTerminal(_)
                    | Completion::InFlight(_)
                    | Completion::Missing => Ok(WebhookDisposition::Ignored),
                    Completion::Failed {
                        error: FinalizeError::InvalidOutputLocation(detail),
                        ..
                    } => {
                        self.fail(job_id, format!("Invalid output location: {}", detail))
                            .await
                    }
                    // Status stays as it was; the poll path retries finalization.
                    Completion::Failed { .. } => Ok(WebhookDisposition::Received),
                }
            }
            ProviderStatus::Error => {
                let detail = payload
                    .error
                    .as_ref()
                    .and_then(describe_provider_error)
                    .unwrap_or_else(|| "Job failed at provider".to_string());
                info!(job_id = %job_id, error = %detail, "Provider reported failure");
                self.fail(job_id, detail).await
            }
            other => {
                debug!(job_id = %job_id, status = ?other, "Intermediate webhook status");
                Ok(WebhookDisposition::Ignored)
            }
        }
    }

    async fn fail(&self, job_id: &str, error: String) -> StoreResult<WebhookDisposition> {
        let transition = self
            .store
            .transition(job_id, JobUpdate::Failed { error }, None)
            .await?;
        Ok(match transition {
            Transition::Applied(_) => WebhookDisposition::Received,
            Transition::Unchanged(_) | Transition::Missing => WebhookDisposition::Ignored,
        })
    }
}
