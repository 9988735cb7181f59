//! Device-token registry for the Ember push backend.
//!
//! Stores one record per `(user_id, device_token)` pair and exposes the
//! three operations the delivery pipeline needs: idempotent upsert,
//! disable-by-token, and "active tokens for user" lookup. Disabled records
//! are retained for audit history; they are only excluded from delivery
//! lookups.
//!
//! The SQL implementation runs on a database-agnostic SQLx `Any` pool; an
//! in-memory implementation backs tests. The crate also ships the HTTP
//! handlers for device registration and revocation, which write to the
//! registry synchronously (registration is a low-volume idempotent write
//! with no benefit from async dispatch).

pub mod client;
pub mod error;
pub mod handlers;
pub mod memory;
pub mod registry;
pub mod routes;

pub use client::DbClient;
pub use error::RegistryError;
pub use memory::InMemoryTokenRegistry;
pub use registry::SqlTokenRegistry;
pub use routes::routes;
