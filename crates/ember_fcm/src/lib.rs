//! Firebase Cloud Messaging provider adapter.
//!
//! Sends push notifications through the FCM HTTP v1 API and normalizes the
//! API's error vocabulary into the shared [`ember_common::SendOutcome`]
//! enum. Authentication uses a Google service-account key via OAuth2; the
//! key file also supplies the FCM project id.

pub mod auth;
pub mod classify;
pub mod client;

pub use client::{FcmClient, FcmError};
