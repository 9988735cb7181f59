//! Durable dispatch queue and delivery worker.
//!
//! The queue decouples event ingress from provider delivery: ingress
//! acknowledges as soon as a job is durably recorded, and the worker
//! drains jobs with at-least-once semantics. Redis backs the production
//! queue; [`memory::InMemoryJobQueue`] backs tests.

pub mod backoff;
pub mod error;
pub mod memory;
pub mod redis_queue;
pub mod worker;

pub use error::QueueError;
pub use memory::InMemoryJobQueue;
pub use redis_queue::RedisJobQueue;
pub use worker::{PushWorker, RetryPolicy};
