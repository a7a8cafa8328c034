//! Process-local job store.
//!
//! Holds the required invariants only when a single instance serves all
//! submission, webhook and poll traffic. Entries expire after the retention
//! period and the map is capped so it cannot grow without bound.

use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use relay_models::{JobRecord, JobUpdate};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::StoreResult;
use crate::store::{Claim, JobStore, LeaseToken, Transition};

struct Entry {
    record: JobRecord,
    expires_at: Instant,
}

struct Lease {
    token: LeaseToken,
    expires_at: Instant,
}

#[derive(Default)]
struct Inner {
    records: HashMap<String, Entry>,
    /// `(expires_at, id)` for every entry in `records`, soonest first.
    expiry: BTreeSet<(Instant, String)>,
    leases: HashMap<String, Lease>,
}

impl Inner {
    fn put(&mut self, record: JobRecord, expires_at: Instant) {
        let id = record.id.clone();
        self.expiry.insert((expires_at, id.clone()));
        if let Some(old) = self.records.insert(id.clone(), Entry { record, expires_at }) {
            if old.expires_at != expires_at {
                self.expiry.remove(&(old.expires_at, id));
            }
        }
    }

    fn remove(&mut self, id: &str) {
        if let Some(entry) = self.records.remove(id) {
            self.expiry.remove(&(entry.expires_at, id.to_string()));
        }
    }

    /// Pop the entry expiring soonest.
    fn pop_oldest(&mut self) -> Option<(Instant, String)> {
        let (expires_at, id) = self.expiry.pop_first()?;
        self.records.remove(&id);
        Some((expires_at, id))
    }

    fn live_record(&mut self, id: &str, now: Instant) -> Option<&JobRecord> {
        if self
            .records
            .get(id)
            .is_some_and(|entry| entry.expires_at <= now)
        {
            self.remove(id);
        }
        self.records.get(id).map(|entry| &entry.record)
    }

    fn live_lease(&mut self, id: &str, now: Instant) -> bool {
        if self
            .leases
            .get(id)
            .is_some_and(|lease| lease.expires_at <= now)
        {
            self.leases.remove(id);
        }
        self.leases.contains_key(id)
    }
}

/// In-memory [`JobStore`] with TTL eviction.
pub struct MemoryJobStore {
    inner: Mutex<Inner>,
    retention: Duration,
    max_entries: usize,
}

impl MemoryJobStore {
    /// Create a store keeping records for `retention`, holding at most `max_entries`.
    pub fn new(retention: Duration, max_entries: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            retention,
            max_entries: max_entries.max(1),
        }
    }

    /// Number of live records.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let inner = self.inner.lock().await;
        inner
            .records
            .values()
            .filter(|entry| entry.expires_at > now)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn insert(&self, inner: &mut Inner, record: JobRecord, now: Instant) {
        inner.put(record, now + self.retention);

        if inner.records.len() > self.max_entries {
            self.evict(inner, now);
        }
    }

    /// Drop expired entries, then the oldest ones while still over capacity.
    fn evict(&self, inner: &mut Inner, now: Instant) {
        inner.leases.retain(|_, lease| lease.expires_at > now);

        let mut over_capacity = 0;
        while let Some((expires_at, _)) = inner.expiry.first() {
            let expired = *expires_at <= now;
            if !expired && inner.records.len() <= self.max_entries {
                break;
            }
            if !expired {
                over_capacity += 1;
            }
            inner.pop_oldest();
        }

        if over_capacity > 0 {
            warn!("Job store exceeded capacity, evicted {} records", over_capacity);
        }
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn get(&self, id: &str) -> StoreResult<Option<JobRecord>> {
        let now = Instant::now();
        let mut inner = self.inner.lock().await;
        Ok(inner.live_record(id, now).cloned())
    }

    async fn set(&self, record: JobRecord) -> StoreResult<()> {
        let now = Instant::now();
        let mut inner = self.inner.lock().await;
        debug!(job_id = %record.id, status = %record.status, "Storing job record");
        self.insert(&mut inner, record, now);
        Ok(())
    }

    async fn transition(
        &self,
        id: &str,
        update: JobUpdate,
        seed: Option<JobRecord>,
    ) -> StoreResult<Transition> {
        let now = Instant::now();
        let mut inner = self.inner.lock().await;

        let Some(mut record) = inner.live_record(id, now).cloned().or(seed) else {
            return Ok(Transition::Missing);
        };

        if !record.apply(&update) {
            return Ok(Transition::Unchanged(record));
        }

        debug!(job_id = %id, status = %record.status, "Job record transitioned");
        self.insert(&mut inner, record.clone(), now);
        Ok(Transition::Applied(record))
    }

    async fn try_claim(&self, id: &str, lease: Duration) -> StoreResult<Claim> {
        let now = Instant::now();
        let mut inner = self.inner.lock().await;

        let record = inner.live_record(id, now).cloned();
        if let Some(record) = record.as_ref().filter(|r| r.is_terminal()) {
            return Ok(Claim::Terminal(record.clone()));
        }

        if inner.live_lease(id, now) {
            return Ok(Claim::InFlight(record));
        }

        let token = LeaseToken::generate();
        inner.leases.insert(
            id.to_string(),
            Lease {
                token: token.clone(),
                expires_at: now + lease,
            },
        );
        Ok(Claim::Acquired {
            record,
            lease: token,
        })
    }

    async fn release(&self, id: &str, lease: &LeaseToken) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        if inner
            .leases
            .get(id)
            .is_some_and(|held| held.token == *lease)
        {
            inner.leases.remove(id);
        }
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
