//! Core data model for the push delivery pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// The push transport a device token belongs to.
///
/// Immutable once set for a given token value; it selects the provider
/// adapter used to deliver to that token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Firebase Cloud Messaging (Android and others).
    Fcm,
    /// Apple Push Notification service (iOS).
    Apns,
}

impl TokenType {
    /// Parse the wire form (`"fcm"` / `"apns"`) used by registration requests.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "fcm" => Some(TokenType::Fcm),
            "apns" => Some(TokenType::Apns),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Fcm => "fcm",
            TokenType::Apns => "apns",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One device registration, keyed on `(user_id, device_token)`.
///
/// Disabled records are retained rather than deleted so that re-registration
/// races and provider error callbacks referencing stale tokens stay benign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceTokenRecord {
    /// Owner of the device; opaque and stable across sessions.
    pub user_id: String,
    /// Provider-issued push token string.
    pub device_token: String,
    /// Transport selector; see [`TokenType`].
    pub token_type: TokenType,
    /// Descriptive platform name (e.g. `ios`, `android`); not used in dispatch.
    pub platform: String,
    pub device_id: Option<String>,
    pub device_name: Option<String>,
    pub app_version: Option<String>,
    /// `true` means eligible for delivery.
    pub enabled: bool,
    /// Last-write timestamp, refreshed on every upsert or disable.
    pub updated_at: DateTime<Utc>,
}

/// Normalized notification content, independent of any provider wire format.
///
/// `data` carries routing metadata only (event type, deep link, identifiers);
/// the adapters pass it through verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub data: HashMap<String, String>,
}

/// The unit of work placed on the dispatch queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushJob {
    pub user_id: String,
    pub payload: PushPayload,
}

/// Queue envelope around a [`PushJob`].
///
/// Jobs are immutable once enqueued; a retry re-enqueues a copy with the
/// attempt counter incremented, it never mutates the stored job in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedJob {
    /// Stable identity of the job across retries.
    pub id: Uuid,
    /// 1-based attempt counter; the first delivery attempt carries 1.
    pub attempt: u32,
    pub enqueued_at: DateTime<Utc>,
    pub job: PushJob,
}

impl QueuedJob {
    pub fn new(job: PushJob) -> Self {
        Self {
            id: Uuid::new_v4(),
            attempt: 1,
            enqueued_at: Utc::now(),
            job,
        }
    }

    /// Copy of this envelope for the next delivery attempt.
    pub fn next_attempt(&self) -> Self {
        Self {
            id: self.id,
            attempt: self.attempt + 1,
            enqueued_at: self.enqueued_at,
            job: self.job.clone(),
        }
    }
}

/// Minimal success body returned by the HTTP ingress endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct Ack {
    pub ok: bool,
}

impl Ack {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}

/// Error body returned by the HTTP ingress endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub ok: bool,
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: error.into(),
        }
    }
}
