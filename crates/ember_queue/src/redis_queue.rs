//! Redis-backed dispatch queue.
//!
//! Layout (all keys under `push:jobs:`):
//!
//! * `data`       hash: job id -> serialized [`QueuedJob`]
//! * `pending`    list of job ids awaiting a worker
//! * `processing` list of job ids currently claimed
//! * `delayed`    zset of job ids scored by due time (epoch millis)
//! * `dead`       list of job ids that exhausted their attempts
//! * `leases`     hash: job id -> claim time (epoch millis)
//!
//! Lists and the zset hold only ids, never the serialized job: ids are
//! stable byte strings, so `LREM` can remove an exact entry without
//! depending on re-serialization producing identical bytes. Claiming is a
//! single `BLMOVE` from `pending` to `processing`, which is atomic, so two
//! workers never hold the same job.

use crate::error::QueueError;
use async_trait::async_trait;
use chrono::Utc;
use deadpool_redis::{Config, Pool, Runtime};
use ember_common::{JobQueue, PushJob, QueuedJob, StoreError};
use ember_config::RedisConfig;
use redis::{AsyncCommands, Direction};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const DATA_KEY: &str = "push:jobs:data";
const PENDING_KEY: &str = "push:jobs:pending";
const PROCESSING_KEY: &str = "push:jobs:processing";
const DELAYED_KEY: &str = "push:jobs:delayed";
const DEAD_KEY: &str = "push:jobs:dead";
const LEASES_KEY: &str = "push:jobs:leases";

/// Durable job queue on Redis.
pub struct RedisJobQueue {
    pool: Pool,
}

impl RedisJobQueue {
    pub fn new(config: &RedisConfig) -> Result<Self, QueueError> {
        let pool = Config::from_url(&config.url).create_pool(Some(Runtime::Tokio1))?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: Pool) -> Self {
        Self { pool }
    }

    /// Move every delayed job whose due time has passed back to `pending`.
    ///
    /// `ZREM` returns how many members the caller actually removed, so when
    /// several workers promote concurrently only the one that won the
    /// removal pushes the id.
    async fn promote_due(&self, conn: &mut deadpool_redis::Connection) -> Result<(), QueueError> {
        let now_ms = Utc::now().timestamp_millis();
        let due: Vec<String> = conn.zrangebyscore(DELAYED_KEY, "-inf", now_ms).await?;

        for id in due {
            let removed: i64 = conn.zrem(DELAYED_KEY, &id).await?;
            if removed > 0 {
                let _: () = conn.lpush(PENDING_KEY, &id).await?;
                debug!(job_id = %id, "promoted delayed job");
            }
        }

        Ok(())
    }

    async fn claim_inner(&self, wait: Duration) -> Result<Option<QueuedJob>, QueueError> {
        let mut conn = self.pool.get().await?;
        self.promote_due(&mut conn).await?;

        // BLMOVE with timeout 0 blocks forever; a zero wait means poll.
        let id: Option<String> = if wait.is_zero() {
            conn.lmove(PENDING_KEY, PROCESSING_KEY, Direction::Right, Direction::Left)
                .await?
        } else {
            conn.blmove(
                PENDING_KEY,
                PROCESSING_KEY,
                Direction::Right,
                Direction::Left,
                wait.as_secs_f64(),
            )
            .await?
        };

        let Some(id) = id else {
            return Ok(None);
        };

        let _: () = conn
            .hset(LEASES_KEY, &id, Utc::now().timestamp_millis())
            .await?;

        let raw: Option<String> = conn.hget(DATA_KEY, &id).await?;
        let Some(raw) = raw else {
            // Orphaned id with no job body; drop it rather than spin on it.
            warn!(job_id = %id, "claimed job has no stored body, discarding");
            let _: i64 = conn.lrem(PROCESSING_KEY, 0, &id).await?;
            let _: () = conn.hdel(LEASES_KEY, &id).await?;
            return Ok(None);
        };

        let job: QueuedJob = serde_json::from_str(&raw)?;
        Ok(Some(job))
    }

    /// Remove a job id from active processing and release its lease.
    async fn release(
        &self,
        conn: &mut deadpool_redis::Connection,
        id: &str,
    ) -> Result<(), QueueError> {
        let _: i64 = conn.lrem(PROCESSING_KEY, 0, id).await?;
        let _: () = conn.hdel(LEASES_KEY, id).await?;
        Ok(())
    }

    async fn enqueue_inner(&self, job: PushJob) -> Result<(), QueueError> {
        let queued = QueuedJob::new(job);
        let id = queued.id.to_string();
        let raw = serde_json::to_string(&queued)?;

        let mut conn = self.pool.get().await?;
        let _: () = conn.hset(DATA_KEY, &id, raw).await?;
        let _: () = conn.lpush(PENDING_KEY, &id).await?;

        debug!(job_id = %id, user_id = %queued.job.user_id, "enqueued push job");
        Ok(())
    }

    async fn complete_inner(&self, job: &QueuedJob) -> Result<(), QueueError> {
        let id = job.id.to_string();
        let mut conn = self.pool.get().await?;
        self.release(&mut conn, &id).await?;
        let _: () = conn.hdel(DATA_KEY, &id).await?;
        Ok(())
    }

    async fn retry_inner(&self, job: &QueuedJob, delay: Duration) -> Result<(), QueueError> {
        let next = job.next_attempt();
        let id = next.id.to_string();
        let raw = serde_json::to_string(&next)?;
        let due_ms = Utc::now().timestamp_millis() + delay.as_millis() as i64;

        let mut conn = self.pool.get().await?;
        let _: () = conn.hset(DATA_KEY, &id, raw).await?;
        let _: () = conn.zadd(DELAYED_KEY, &id, due_ms).await?;
        self.release(&mut conn, &id).await?;
        Ok(())
    }

    async fn dead_letter_inner(&self, job: &QueuedJob) -> Result<(), QueueError> {
        let id = job.id.to_string();
        let raw = serde_json::to_string(job)?;

        // The full job is logged so the payload survives even if the dead
        // set is later trimmed.
        error!(
            job_id = %id,
            user_id = %job.job.user_id,
            attempt = job.attempt,
            job = %raw,
            "job exhausted its attempts, moving to dead letter"
        );

        let mut conn = self.pool.get().await?;
        let _: () = conn.hset(DATA_KEY, &id, raw).await?;
        let _: () = conn.lpush(DEAD_KEY, &id).await?;
        self.release(&mut conn, &id).await?;
        Ok(())
    }

    async fn reclaim_inner(&self, lease: Duration) -> Result<u64, QueueError> {
        let cutoff_ms = Utc::now().timestamp_millis() - lease.as_millis() as i64;

        let mut conn = self.pool.get().await?;
        let leases: HashMap<String, i64> = conn.hgetall(LEASES_KEY).await?;

        let mut reclaimed = 0u64;
        for (id, claimed_at_ms) in leases {
            if claimed_at_ms > cutoff_ms {
                continue;
            }

            // Only requeue if the id was still in processing; the holder may
            // have finished between the HGETALL and now.
            let removed: i64 = conn.lrem(PROCESSING_KEY, 0, &id).await?;
            let _: () = conn.hdel(LEASES_KEY, &id).await?;
            if removed > 0 {
                let _: () = conn.lpush(PENDING_KEY, &id).await?;
                info!(job_id = %id, "reclaimed job from expired lease");
                reclaimed += 1;
            }
        }

        Ok(reclaimed)
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn enqueue(&self, job: PushJob) -> Result<(), StoreError> {
        self.enqueue_inner(job).await.map_err(StoreError::from)
    }

    async fn claim(&self, wait: Duration) -> Result<Option<QueuedJob>, StoreError> {
        self.claim_inner(wait).await.map_err(StoreError::from)
    }

    async fn complete(&self, job: &QueuedJob) -> Result<(), StoreError> {
        self.complete_inner(job).await.map_err(StoreError::from)
    }

    async fn retry(&self, job: &QueuedJob, delay: Duration) -> Result<(), StoreError> {
        self.retry_inner(job, delay).await.map_err(StoreError::from)
    }

    async fn dead_letter(&self, job: &QueuedJob) -> Result<(), StoreError> {
        self.dead_letter_inner(job).await.map_err(StoreError::from)
    }

    async fn reclaim_expired(&self, lease: Duration) -> Result<u64, StoreError> {
        self.reclaim_inner(lease).await.map_err(StoreError::from)
    }
}
