//! The store contract shared by every completion channel.

use std::time::Duration;

use async_trait::async_trait;
use relay_models::{JobRecord, JobUpdate};

use crate::error::StoreResult;

/// Opaque token identifying one finalization lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseToken(pub(crate) String);

impl LeaseToken {
    pub(crate) fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Outcome of [`JobStore::transition`].
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// The update was applied; holds the record as written.
    Applied(JobRecord),
    /// The update would regress or touch a terminal record; holds the current record.
    Unchanged(JobRecord),
    /// No record exists and no seed was supplied.
    Missing,
}

/// Outcome of [`JobStore::try_claim`].
#[derive(Debug, Clone, PartialEq)]
pub enum Claim {
    /// This caller now owns finalization for the id. The record may be
    /// absent if local state was lost.
    Acquired {
        record: Option<JobRecord>,
        lease: LeaseToken,
    },
    /// The record is already terminal; nothing to do.
    Terminal(JobRecord),
    /// Another writer currently holds the lease.
    InFlight(Option<JobRecord>),
}

/// Keyed access to job records.
///
/// Every method is a short critical section; implementations never hold a
/// lock across caller I/O. Finalization spans network calls, so it is guarded
/// by an expiring lease rather than a lock.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Fetch a record.
    async fn get(&self, id: &str) -> StoreResult<Option<JobRecord>>;

    /// Full replace of a record.
    async fn set(&self, record: JobRecord) -> StoreResult<()>;

    /// Atomically read, apply `update`, and write back.
    ///
    /// When no record exists, `seed` (if given) is used as the starting point.
    /// Terminal records and status regressions are never written.
    async fn transition(
        &self,
        id: &str,
        update: JobUpdate,
        seed: Option<JobRecord>,
    ) -> StoreResult<Transition>;

    /// Try to take the finalization lease for `id`.
    async fn try_claim(&self, id: &str, lease: Duration) -> StoreResult<Claim>;

    /// Drop a lease previously returned by [`JobStore::try_claim`].
    /// A lease that expired and was re-acquired by someone else is left alone.
    async fn release(&self, id: &str, lease: &LeaseToken) -> StoreResult<()>;

    /// Connectivity check for readiness probes.
    async fn ping(&self) -> StoreResult<()>;
}
