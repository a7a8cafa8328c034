//! Claim, finalize, commit: the path both completion channels converge on.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use relay_models::{JobRecord, JobUpdate, OutputLocation};
use relay_store::{Claim, JobStore, StoreResult, Transition};

use super::finalizer::{FinalizeError, Finalizer};
use crate::metrics;

/// Which channel observed the completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Webhook,
    Poll,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Webhook => "webhook",
            Channel::Poll => "poll",
        }
    }
}

/// Outcome of [`CompletionCoordinator::complete`].
#[derive(Debug)]
pub enum Completion {
    /// This call finalized the job; holds the committed record.
    Finalized(JobRecord),
    /// The job was already terminal when observed.
    AlreadyTerminal(JobRecord),
    /// Another writer holds the finalization lease.
    InFlight(Option<JobRecord>),
    /// No record exists and none could be seeded.
    Missing,
    /// Finalization failed; the record was left as it was.
    Failed {
        error: FinalizeError,
        record: Option<JobRecord>,
    },
}

/// Runs finalization at most once per job id across all channels.
///
/// The store lease marks a finalization in flight for the duration of the
/// network I/O; the commit itself goes through the monotonic transition, so
/// a late writer can never overwrite a terminal record.
pub struct CompletionCoordinator {
    store: Arc<dyn JobStore>,
    finalizer: Arc<Finalizer>,
    lease: Duration,
}

impl CompletionCoordinator {
    pub fn new(store: Arc<dyn JobStore>, finalizer: Arc<Finalizer>, lease: Duration) -> Self {
        Self {
            store,
            finalizer,
            lease,
        }
    }

    /// Finalize `job_id` from `location` and commit the durable URL.
    ///
    /// `seed` is written if no record exists (adoption on the poll path).
    pub async fn complete(
        &self,
        job_id: &str,
        location: &OutputLocation,
        seed: Option<JobRecord>,
        channel: Channel,
    ) -> StoreResult<Completion> {
        let (current, lease) = match self.store.try_claim(job_id, self.lease).await? {
            Claim::Terminal(record) => return Ok(Completion::AlreadyTerminal(record)),
            Claim::InFlight(record) => {
                info!(job_id = %job_id, channel = channel.as_str(), "Finalization already in flight");
                metrics::record_finalization(channel.as_str(), "in_flight", 0.0);
                return Ok(Completion::InFlight(record));
            }
            Claim::Acquired { record, lease } => (record, lease),
        };

        let output_format = match current.as_ref().or(seed.as_ref()) {
            Some(record) => record.output_format.clone(),
            None => {
                self.release(job_id, &lease).await;
                return Ok(Completion::Missing);
            }
        };

        let start = Instant::now();
        let result = self
            .finalizer
            .finalize(job_id, location.as_str(), &output_format)
            .await;
        let elapsed = start.elapsed().as_secs_f64();

        let outcome = match result {
            Ok(durable_file_url) => {
                let committed = self
                    .store
                    .transition(job_id, JobUpdate::Finished { durable_file_url }, seed)
                    .await;
                self.release(job_id, &lease).await;

                match committed? {
                    Transition::Applied(record) => {
                        info!(job_id = %job_id, channel = channel.as_str(), "Job finalized");
                        metrics::record_finalization(channel.as_str(), "finalized", elapsed);
                        Completion::Finalized(record)
                    }
                    Transition::Unchanged(record) => {
                        warn!(
                            job_id = %job_id,
                            status = %record.status,
                            "Job reached a terminal state while finalizing"
                        );
                        metrics::record_finalization(channel.as_str(), "superseded", elapsed);
                        Completion::AlreadyTerminal(record)
                    }
                    Transition::Missing => Completion::Missing,
                }
            }
            Err(e) => {
                self.release(job_id, &lease).await;
                error!(
                    job_id = %job_id,
                    channel = channel.as_str(),
                    kind = e.kind(),
                    error = %e,
                    "Finalization failed"
                );
                metrics::record_finalization(channel.as_str(), "failed", elapsed);
                Completion::Failed {
                    error: e,
                    record: current,
                }
            }
        };

        Ok(outcome)
    }

    async fn release(&self, job_id: &str, lease: &relay_store::LeaseToken) {
        if let Err(e) = self.store.release(job_id, lease).await {
            // The lease expires on its own; this only delays a retry.
            warn!(job_id = %job_id, error = %e, "Failed to release finalization lease");
        }
    }
}
