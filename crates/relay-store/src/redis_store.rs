//! Redis-backed job store for multi-instance deployments.
//!
//! Records are JSON strings under `{prefix}:job:{id}` with a retention TTL.
//! Transitions are optimistic: read, apply, then compare-and-swap through a
//! Lua script, retrying when another instance wrote in between. Finalization
//! leases are `SET NX PX` keys under `{prefix}:lease:{id}`.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use relay_models::{JobRecord, JobUpdate};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::store::{Claim, JobStore, LeaseToken, Transition};

/// Attempts before a contended transition gives up.
const MAX_CAS_ATTEMPTS: u32 = 8;

/// Swap KEYS[1] to ARGV[2] only if it still holds ARGV[1] ('' = absent).
const COMPARE_AND_SET: &str = r#"
local current = redis.call('GET', KEYS[1])
if (current or '') ~= ARGV[1] then
    return 0
end
redis.call('SET', KEYS[1], ARGV[2], 'EX', ARGV[3])
return 1
"#;

/// Delete KEYS[1] only if it holds ARGV[1].
const COMPARE_AND_DELETE: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
"#;

/// Shared [`JobStore`] on Redis.
pub struct RedisJobStore {
    client: redis::Client,
    prefix: String,
    retention: Duration,
    compare_and_set: redis::Script,
    compare_and_delete: redis::Script,
}

impl RedisJobStore {
    /// Create a new store. Does not connect until first use.
    pub fn new(redis_url: &str, prefix: &str, retention: Duration) -> StoreResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            prefix: prefix.to_string(),
            retention,
            compare_and_set: redis::Script::new(COMPARE_AND_SET),
            compare_and_delete: redis::Script::new(COMPARE_AND_DELETE),
        })
    }

    fn job_key(&self, id: &str) -> String {
        format!("{}:job:{}", self.prefix, id)
    }

    fn lease_key(&self, id: &str) -> String {
        format!("{}:lease:{}", self.prefix, id)
    }

    fn retention_secs(&self) -> u64 {
        self.retention.as_secs().max(1)
    }

    async fn connection(&self) -> StoreResult<MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    async fn load_raw(
        conn: &mut MultiplexedConnection,
        key: &str,
    ) -> StoreResult<(Option<String>, Option<JobRecord>)> {
        let raw: Option<String> = conn.get(key).await?;
        let record = match raw.as_deref() {
            Some(json) => Some(serde_json::from_str::<JobRecord>(json)?),
            None => None,
        };
        Ok((raw, record))
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn get(&self, id: &str) -> StoreResult<Option<JobRecord>> {
        let mut conn = self.connection().await?;
        let (_, record) = Self::load_raw(&mut conn, &self.job_key(id)).await?;
        Ok(record)
    }

    async fn set(&self, record: JobRecord) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        let json = serde_json::to_string(&record)?;
        let _: () = conn
            .set_ex(self.job_key(&record.id), json, self.retention_secs())
            .await?;
        debug!(job_id = %record.id, status = %record.status, "Stored job record in Redis");
        Ok(())
    }

    async fn transition(
        &self,
        id: &str,
        update: JobUpdate,
        seed: Option<JobRecord>,
    ) -> StoreResult<Transition> {
        let key = self.job_key(id);
        let mut conn = self.connection().await?;

        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let (raw, current) = Self::load_raw(&mut conn, &key).await?;
            let Some(mut record) = current.or_else(|| seed.clone()) else {
                return Ok(Transition::Missing);
            };

            if !record.apply(&update) {
                return Ok(Transition::Unchanged(record));
            }

            let next = serde_json::to_string(&record)?;
            let swapped: i64 = self
                .compare_and_set
                .key(&key)
                .arg(raw.as_deref().unwrap_or(""))
                .arg(&next)
                .arg(self.retention_secs())
                .invoke_async(&mut conn)
                .await?;

            if swapped == 1 {
                return Ok(Transition::Applied(record));
            }

            debug!(job_id = %id, attempt, "Concurrent write detected, retrying transition");
        }

        warn!(job_id = %id, "Transition abandoned after repeated write conflicts");
        Err(StoreError::Conflict(id.to_string()))
    }

    async fn try_claim(&self, id: &str, lease: Duration) -> StoreResult<Claim> {
        let job_key = self.job_key(id);
        let lease_key = self.lease_key(id);
        let mut conn = self.connection().await?;

        let (_, record) = Self::load_raw(&mut conn, &job_key).await?;
        if let Some(record) = record.as_ref().filter(|r| r.is_terminal()) {
            return Ok(Claim::Terminal(record.clone()));
        }

        let token = LeaseToken::generate();
        let acquired: Option<String> = redis::cmd("SET")
            .arg(&lease_key)
            .arg(token.as_str())
            .arg("NX")
            .arg("PX")
            .arg(lease.as_millis().max(1) as u64)
            .query_async(&mut conn)
            .await?;

        if acquired.is_none() {
            return Ok(Claim::InFlight(record));
        }

        // Another writer may have committed and released between the read and the SET.
        let (_, record) = Self::load_raw(&mut conn, &job_key).await?;
        if let Some(record) = record.as_ref().filter(|r| r.is_terminal()) {
            self.release(id, &token).await?;
            return Ok(Claim::Terminal(record.clone()));
        }

        Ok(Claim::Acquired {
            record,
            lease: token,
        })
    }

    async fn release(&self, id: &str, lease: &LeaseToken) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        let _: i64 = self
            .compare_and_delete
            .key(self.lease_key(id))
            .arg(lease.as_str())
            .invoke_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
