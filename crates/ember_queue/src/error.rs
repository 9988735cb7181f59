//! Queue error types.

use ember_common::StoreError;
use thiserror::Error;

/// Errors from the Redis-backed queue.
#[derive(Error, Debug)]
pub enum QueueError {
    /// Could not create the Redis pool from configuration.
    #[error("queue configuration error: {0}")]
    Config(#[from] deadpool_redis::CreatePoolError),

    /// Could not check a connection out of the pool.
    #[error("redis pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    /// A Redis command failed.
    #[error("redis command error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A job could not be serialized or deserialized.
    #[error("job codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl From<QueueError> for StoreError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Config(e) => StoreError::Unavailable(e.to_string()),
            QueueError::Pool(e) => StoreError::Unavailable(e.to_string()),
            QueueError::Redis(e) => StoreError::Query(e.to_string()),
            QueueError::Codec(e) => StoreError::Codec(e.to_string()),
        }
    }
}
