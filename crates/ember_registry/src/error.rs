//! Error types for the registry store.

use ember_common::StoreError;
use thiserror::Error;

/// Errors that can occur when working with the registry database.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Error from SQLx
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Error with the database configuration
    #[error("database configuration error: {0}")]
    Config(String),

    /// Error with database pool creation
    #[error("database pool error: {0}")]
    Pool(String),

    /// Error with a database query
    #[error("database query error: {0}")]
    Query(String),

    /// A stored column could not be decoded into the domain model
    #[error("database decode error: {0}")]
    Decode(String),
}

impl From<RegistryError> for StoreError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Sqlx(e) => StoreError::Query(e.to_string()),
            RegistryError::Config(msg) | RegistryError::Pool(msg) => {
                StoreError::Unavailable(msg)
            }
            RegistryError::Query(msg) => StoreError::Query(msg),
            RegistryError::Decode(msg) => StoreError::Codec(msg),
        }
    }
}
