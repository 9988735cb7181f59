//! Delivery orchestration and event ingress.
//!
//! [`service::DeliveryService`] fans one payload out to every active
//! device token of a user, routing each token to its provider adapter and
//! disabling tokens the provider declares dead. The handlers in this
//! crate accept domain events (like, match, message), map them to
//! notification payloads, and enqueue them for the worker.

pub mod events;
pub mod handlers;
pub mod routes;
pub mod service;

pub use routes::routes;
pub use service::DeliveryService;
