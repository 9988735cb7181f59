//! Apple Push Notification service provider adapter.
//!
//! Sends alerts through the APNs HTTP/2 API, authenticating with
//! provider tokens (ES256 JWTs minted from a .p8 signing key). APNs
//! rejection reasons are normalized into the shared
//! [`ember_common::SendOutcome`] enum.

pub mod auth;
pub mod classify;
pub mod client;

pub use client::{ApnsClient, ApnsError};
