//! Shared building blocks for the Ember push backend.
//!
//! This crate holds the types that cross crate boundaries: the data model
//! (device token records, push payloads, queued jobs), the service traits
//! that decouple the delivery orchestrator from concrete providers and
//! stores, the common error taxonomy, and the tracing setup used by every
//! binary.

pub mod error;
pub mod logging;
pub mod models;
pub mod services;

pub use error::{EmberError, HttpStatusCode, StoreError};
pub use models::{DeviceTokenRecord, PushJob, PushPayload, QueuedJob, TokenType};
pub use services::{
    DeliveryError, DeliveryReport, JobQueue, PushDeliverer, PushProvider, SendOutcome,
    TokenRegistry,
};
