//! The delivery worker loop.
//!
//! Each worker claims one job at a time, hands it to the deliverer, and
//! acks, retries, or dead-letters based on the outcome. Several workers
//! may run against the same queue; claim atomicity is the queue's
//! responsibility.

use crate::backoff::backoff_delay;
use ember_common::{JobQueue, PushDeliverer, QueuedJob, StoreError};
use ember_config::WorkerConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// How long one claim call blocks before the loop re-checks leases.
const CLAIM_WAIT: Duration = Duration::from_secs(5);

/// Retry and lease policy for the worker.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts a job gets before dead-lettering, first included.
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    /// Age after which a claimed job's lease counts as abandoned.
    pub lease: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_backoff: Duration::from_secs(config.base_backoff_secs),
            max_backoff: Duration::from_secs(config.max_backoff_secs),
            lease: Duration::from_secs(config.lease_secs),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&WorkerConfig::default())
    }
}

/// One queue-draining worker.
#[derive(Clone)]
pub struct PushWorker {
    queue: Arc<dyn JobQueue>,
    deliverer: Arc<dyn PushDeliverer>,
    policy: RetryPolicy,
}

impl PushWorker {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        deliverer: Arc<dyn PushDeliverer>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            queue,
            deliverer,
            policy,
        }
    }

    /// Drain the queue until the process shuts down.
    ///
    /// Queue errors are logged and the loop backs off briefly; the worker
    /// never exits on its own.
    pub async fn run(self) {
        info!("push worker started");
        loop {
            if let Err(e) = self.tick().await {
                warn!("worker tick failed: {}", e);
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }

    /// One iteration: reclaim abandoned jobs, then claim and process at
    /// most one job.
    pub async fn tick(&self) -> Result<(), StoreError> {
        let reclaimed = self.queue.reclaim_expired(self.policy.lease).await?;
        if reclaimed > 0 {
            info!(reclaimed, "requeued jobs from expired leases");
        }

        if let Some(job) = self.queue.claim(CLAIM_WAIT).await? {
            self.process(job).await?;
        }

        Ok(())
    }

    async fn process(&self, job: QueuedJob) -> Result<(), StoreError> {
        debug!(
            job_id = %job.id,
            user_id = %job.job.user_id,
            attempt = job.attempt,
            "processing push job"
        );

        match self
            .deliverer
            .deliver(&job.job.user_id, &job.job.payload)
            .await
        {
            Ok(report) => {
                info!(
                    job_id = %job.id,
                    user_id = %job.job.user_id,
                    sent = report.sent,
                    "push job delivered"
                );
                self.queue.complete(&job).await
            }
            Err(e) => self.handle_failure(job, e.to_string()).await,
        }
    }

    /// Every delivery failure is retryable; the only question is whether
    /// the job has attempts left.
    async fn handle_failure(&self, job: QueuedJob, reason: String) -> Result<(), StoreError> {
        if job.attempt >= self.policy.max_attempts {
            error!(
                job_id = %job.id,
                user_id = %job.job.user_id,
                attempt = job.attempt,
                reason = %reason,
                "push job failed terminally"
            );
            return self.queue.dead_letter(&job).await;
        }

        let delay = backoff_delay(job.attempt, self.policy.base_backoff, self.policy.max_backoff);
        warn!(
            job_id = %job.id,
            user_id = %job.job.user_id,
            attempt = job.attempt,
            delay_ms = delay.as_millis() as u64,
            reason = %reason,
            "push job failed, scheduling retry"
        );
        self.queue.retry(&job, delay).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryJobQueue;
    use async_trait::async_trait;
    use ember_common::{DeliveryError, DeliveryReport, PushJob, PushPayload};
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// Deliverer that plays back a fixed script of outcomes.
    struct ScriptedDeliverer {
        script: Mutex<VecDeque<Result<DeliveryReport, DeliveryError>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedDeliverer {
        fn new(script: Vec<Result<DeliveryReport, DeliveryError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PushDeliverer for ScriptedDeliverer {
        async fn deliver(
            &self,
            user_id: &str,
            _payload: &PushPayload,
        ) -> Result<DeliveryReport, DeliveryError> {
            self.calls.lock().unwrap().push(user_id.to_string());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(DeliveryReport { sent: 1 }))
        }
    }

    fn transient(reason: &str) -> Result<DeliveryReport, DeliveryError> {
        Err(DeliveryError::Incomplete {
            sent: 0,
            reason: reason.to_string(),
        })
    }

    fn job(user: &str) -> PushJob {
        let mut data = HashMap::new();
        data.insert("type".to_string(), "like".to_string());
        PushJob {
            user_id: user.to_string(),
            payload: PushPayload {
                title: "New like".into(),
                body: "Ada liked you".into(),
                data,
            },
        }
    }

    fn worker(
        queue: &Arc<InMemoryJobQueue>,
        deliverer: &Arc<ScriptedDeliverer>,
    ) -> PushWorker {
        PushWorker::new(
            queue.clone() as Arc<dyn JobQueue>,
            deliverer.clone() as Arc<dyn PushDeliverer>,
            RetryPolicy::default(),
        )
    }

    async fn drain(worker: &PushWorker, queue: &InMemoryJobQueue) {
        while queue.pending_len() > 0 {
            worker.tick().await.unwrap();
        }
    }

    #[tokio::test]
    async fn success_completes_the_job() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let deliverer = Arc::new(ScriptedDeliverer::new(vec![Ok(DeliveryReport { sent: 2 })]));
        let worker = worker(&queue, &deliverer);

        queue.enqueue(job("u1")).await.unwrap();
        drain(&worker, &queue).await;

        assert_eq!(deliverer.calls(), vec!["u1"]);
        assert_eq!(queue.completed_jobs().len(), 1);
        assert!(queue.dead_jobs().is_empty());
        assert!(queue.retry_delays().is_empty());
    }

    #[tokio::test]
    async fn transient_failures_back_off_with_strictly_increasing_delays() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let deliverer = Arc::new(ScriptedDeliverer::new(vec![
            transient("fcm 503"),
            transient("fcm 503"),
            transient("fcm 503"),
            Ok(DeliveryReport { sent: 1 }),
        ]));
        let worker = worker(&queue, &deliverer);

        queue.enqueue(job("u1")).await.unwrap();
        drain(&worker, &queue).await;

        let delays = queue.retry_delays();
        assert_eq!(delays.len(), 3);
        assert!(delays[0] < delays[1] && delays[1] < delays[2], "{delays:?}");
        assert_eq!(queue.completed_jobs().len(), 1);
        assert!(queue.dead_jobs().is_empty());
    }

    #[tokio::test]
    async fn exhausted_job_is_dead_lettered_with_payload_intact() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let deliverer = Arc::new(ScriptedDeliverer::new(
            (0..10).map(|_| transient("apns 503")).collect(),
        ));
        let worker = worker(&queue, &deliverer);

        queue.enqueue(job("u1")).await.unwrap();
        drain(&worker, &queue).await;

        let dead = queue.dead_jobs();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].attempt, RetryPolicy::default().max_attempts);
        assert_eq!(dead[0].job.payload.title, "New like");
        assert_eq!(dead[0].job.payload.data["type"], "like");
        assert_eq!(
            queue.retry_delays().len() as u32,
            RetryPolicy::default().max_attempts - 1
        );
        assert!(queue.completed_jobs().is_empty());
    }

    #[tokio::test]
    async fn store_failures_mid_delivery_are_retried_like_any_other() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let deliverer = Arc::new(ScriptedDeliverer::new(vec![
            Err(DeliveryError::Store(StoreError::Unavailable(
                "registry down".into(),
            ))),
            Ok(DeliveryReport { sent: 1 }),
        ]));
        let worker = worker(&queue, &deliverer);

        queue.enqueue(job("u1")).await.unwrap();
        drain(&worker, &queue).await;

        assert_eq!(queue.retry_delays().len(), 1);
        assert_eq!(queue.completed_jobs().len(), 1);
    }

    #[tokio::test]
    async fn every_tick_checks_for_expired_leases() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let deliverer = Arc::new(ScriptedDeliverer::new(vec![]));
        let worker = worker(&queue, &deliverer);

        worker.tick().await.unwrap();
        worker.tick().await.unwrap();
        assert_eq!(queue.reclaim_calls(), 2);
    }
}
