//! In-memory job queue for tests.
//!
//! Implements the same contract as the Redis queue with two deliberate
//! simplifications: `claim` never blocks, and retried jobs become
//! claimable immediately while the requested delay is recorded for
//! assertion. Tests can therefore drive a worker through its whole retry
//! schedule without sleeping.

use async_trait::async_trait;
use ember_common::{JobQueue, PushJob, QueuedJob, StoreError};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
struct QueueState {
    pending: VecDeque<QueuedJob>,
    dead: Vec<QueuedJob>,
    retry_delays: Vec<Duration>,
    completed: Vec<QueuedJob>,
    reclaim_calls: u32,
}

/// Non-durable queue backed by a mutex-guarded state.
#[derive(Default)]
pub struct InMemoryJobQueue {
    state: Mutex<QueueState>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_len(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).pending.len()
    }

    pub fn dead_jobs(&self) -> Vec<QueuedJob> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .dead
            .clone()
    }

    pub fn completed_jobs(&self) -> Vec<QueuedJob> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .completed
            .clone()
    }

    /// Delays requested through `retry`, in call order.
    pub fn retry_delays(&self) -> Vec<Duration> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retry_delays
            .clone()
    }

    pub fn reclaim_calls(&self) -> u32 {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .reclaim_calls
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, job: PushJob) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.pending.push_back(QueuedJob::new(job));
        Ok(())
    }

    async fn claim(&self, _wait: Duration) -> Result<Option<QueuedJob>, StoreError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.pending.pop_front())
    }

    async fn complete(&self, job: &QueuedJob) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.completed.push(job.clone());
        Ok(())
    }

    async fn retry(&self, job: &QueuedJob, delay: Duration) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.retry_delays.push(delay);
        state.pending.push_back(job.next_attempt());
        Ok(())
    }

    async fn dead_letter(&self, job: &QueuedJob) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.dead.push(job.clone());
        Ok(())
    }

    async fn reclaim_expired(&self, _lease: Duration) -> Result<u64, StoreError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.reclaim_calls += 1;
        Ok(0)
    }
}
