//! Service abstractions for the delivery pipeline.
//!
//! These traits are the seams between the orchestrator and everything it
//! talks to: the token registry, the provider adapters, and the dispatch
//! queue. They allow the composition root to inject concrete
//! implementations and let tests substitute fakes.

use crate::error::StoreError;
use crate::models::{DeviceTokenRecord, PushJob, PushPayload, QueuedJob, TokenType};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Normalized result of a single provider send.
///
/// Each adapter maps its provider's error vocabulary onto this enum so the
/// orchestrator never sees provider-specific error shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The provider accepted the message for delivery. Push transports are
    /// best-effort, so this does not guarantee device receipt.
    Delivered,
    /// The provider asserts the token can never succeed again. Terminal;
    /// the caller must disable the token.
    TokenInvalid,
    /// Provider-side or network failure that may succeed on retry. Must not
    /// disable the token.
    Transient(String),
}

/// A push transport adapter (APNs, FCM).
#[async_trait]
pub trait PushProvider: Send + Sync {
    /// Send one notification to one device token and classify the result.
    ///
    /// Unknown errors are classified `Transient` rather than `TokenInvalid`
    /// so an unrelated outage can never mass-unregister devices.
    async fn send(&self, device_token: &str, payload: &PushPayload) -> SendOutcome;

    /// The token type this adapter serves.
    fn token_type(&self) -> TokenType;
}

/// The device-token registry.
#[async_trait]
pub trait TokenRegistry: Send + Sync {
    /// Idempotent write keyed on `(user_id, device_token)`. Always re-enables
    /// the token and refreshes `updated_at`: a device re-asserting its token
    /// implies current validity.
    async fn upsert(&self, record: DeviceTokenRecord) -> Result<(), StoreError>;

    /// Disable a token by value alone, independent of which user holds it.
    /// No-op (not an error) when the token is unknown, since provider error
    /// callbacks may reference tokens already pruned.
    async fn disable(&self, device_token: &str) -> Result<(), StoreError>;

    /// All `enabled = true` records for a user. An empty list is a valid,
    /// non-error result.
    async fn active_tokens_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<DeviceTokenRecord>, StoreError>;
}

/// A durable, at-least-once dispatch queue.
///
/// Implementations must make `claim` atomic: two workers never hold the
/// same job concurrently. Claimed jobs carry a lease; a crashed worker's
/// job is reclaimed once the lease expires rather than lost.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Durably record a new job. Returning `Ok` means "durably queued",
    /// not "delivered".
    async fn enqueue(&self, job: PushJob) -> Result<(), StoreError>;

    /// Atomically claim the next due job, waiting up to `wait` for one to
    /// become available. Promotes due retries before claiming.
    async fn claim(&self, wait: Duration) -> Result<Option<QueuedJob>, StoreError>;

    /// Discard a job after terminal success.
    async fn complete(&self, job: &QueuedJob) -> Result<(), StoreError>;

    /// Re-enqueue a copy of the job with an incremented attempt counter,
    /// due after `delay`.
    async fn retry(&self, job: &QueuedJob, delay: Duration) -> Result<(), StoreError>;

    /// Remove the job from active processing and record it for operator
    /// inspection.
    async fn dead_letter(&self, job: &QueuedJob) -> Result<(), StoreError>;

    /// Return jobs whose claim lease is older than `lease` to the pending
    /// queue. Returns the number of jobs reclaimed.
    async fn reclaim_expired(&self, lease: Duration) -> Result<u64, StoreError>;
}

/// Aggregate result of one per-user delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Number of device tokens the provider accepted the message for.
    pub sent: usize,
}

/// Failure of a delivery attempt. Every variant is retryable: validation
/// failures never reach the queue, and terminal token failures are handled
/// inside the attempt by disabling the token.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// At least one token saw a transient failure; the whole job should be
    /// retried. Duplicate pushes to the tokens that already succeeded are
    /// an accepted consequence of at-least-once delivery.
    #[error("delivery incomplete after {sent} sends: {reason}")]
    Incomplete { sent: usize, reason: String },

    /// The registry or another store was unavailable mid-attempt.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The delivery orchestrator as seen by the queue worker.
#[async_trait]
pub trait PushDeliverer: Send + Sync {
    /// Fan a payload out to every active device token of one user.
    async fn deliver(
        &self,
        user_id: &str,
        payload: &PushPayload,
    ) -> Result<DeliveryReport, DeliveryError>;
}
