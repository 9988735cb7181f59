//! Common error taxonomy shared across the Ember crates.

use thiserror::Error;

/// Storage-layer failure surfaced by the token registry and the dispatch
/// queue.
///
/// The stores perform no retries themselves; retry policy belongs to the
/// queue worker. At the HTTP ingress a `StoreError` surfaces as a 500, in
/// the worker it is treated as transient for the in-flight job.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A query or command against the store failed.
    #[error("store query failed: {0}")]
    Query(String),

    /// A stored value could not be encoded or decoded.
    #[error("store codec error: {0}")]
    Codec(String),
}

/// The base error type for cross-crate error reporting.
#[derive(Debug, Error)]
pub enum EmberError {
    /// Client-caused: malformed event or registration payload. Never
    /// retried; never reaches the queue.
    #[error("validation error: {0}")]
    Validation(String),

    /// Missing or invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A durable store (registry or queue) was unavailable.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A push provider rejected or failed a request in a non-terminal way.
    #[error("provider error: {provider}: {message}")]
    Provider { provider: String, message: String },

    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Conversion from errors to HTTP status codes, used by the ingress layer.
pub trait HttpStatusCode {
    fn status_code(&self) -> u16;
}

impl HttpStatusCode for EmberError {
    fn status_code(&self) -> u16 {
        match self {
            EmberError::Validation(_) => 400,
            EmberError::Config(_) => 500,
            EmberError::Store(_) => 500,
            EmberError::Provider { .. } => 502,
            EmberError::Internal(_) => 500,
        }
    }
}
