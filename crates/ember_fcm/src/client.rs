//! Firebase Cloud Messaging client.
//!
//! Wraps the FCM HTTP v1 `messages:send` endpoint. One `send` call targets
//! one registration token; the response is normalized into the shared
//! [`SendOutcome`] so callers never see FCM's own error shapes.

use crate::auth::FcmAuth;
use crate::classify::classify_failure;
use async_trait::async_trait;
use ember_common::{PushPayload, PushProvider, SendOutcome, TokenType};
use ember_config::FirebaseConfig;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const DEFAULT_ENDPOINT: &str = "https://fcm.googleapis.com";

/// Errors that can occur when constructing or driving the FCM client.
#[derive(Error, Debug)]
pub enum FcmError {
    /// Missing or unusable configuration (key file, project id)
    #[error("fcm configuration error: {0}")]
    Config(String),

    /// Error during authentication with Google
    #[error("fcm authentication error: {0}")]
    Auth(String),

    /// Error during the HTTP request to the FCM API
    #[error("fcm request error: {0}")]
    Request(#[from] reqwest::Error),
}

/// Top-level request body for the FCM HTTP v1 API.
#[derive(Debug, Serialize)]
struct FcmSend {
    message: FcmMessage,
}

#[derive(Debug, Serialize)]
struct FcmMessage {
    token: String,
    notification: FcmNotification,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    data: HashMap<String, String>,
    android: AndroidConfig,
}

#[derive(Debug, Serialize)]
struct FcmNotification {
    title: String,
    body: String,
}

/// Android delivery options: high priority through the default channel.
#[derive(Debug, Serialize)]
struct AndroidConfig {
    priority: &'static str,
    notification: AndroidNotification,
}

#[derive(Debug, Serialize)]
struct AndroidNotification {
    channel_id: &'static str,
}

/// Success body: `name` is "projects/{project_id}/messages/{message_id}".
#[derive(Debug, Deserialize)]
struct FcmResponse {
    name: String,
}

enum AuthSource {
    ServiceAccount(FcmAuth),
    #[cfg(test)]
    Static { token: String, project_id: String },
}

impl AuthSource {
    async fn bearer_token(&self) -> Result<String, FcmError> {
        match self {
            AuthSource::ServiceAccount(auth) => auth.bearer_token().await,
            #[cfg(test)]
            AuthSource::Static { token, .. } => Ok(token.clone()),
        }
    }

    fn project_id(&self) -> &str {
        match self {
            AuthSource::ServiceAccount(auth) => auth.project_id(),
            #[cfg(test)]
            AuthSource::Static { project_id, .. } => project_id,
        }
    }
}

/// Client for the Firebase Cloud Messaging HTTP v1 API.
pub struct FcmClient {
    http: Client,
    auth: AuthSource,
    endpoint: String,
}

impl FcmClient {
    /// Build the client from configuration.
    ///
    /// Reads and validates the service-account key immediately, so a
    /// missing key file or a key without a project id is a startup error
    /// rather than a failure on the first delivery.
    pub async fn new(config: &FirebaseConfig, timeout: Duration) -> Result<Self, FcmError> {
        let auth = FcmAuth::from_key_file(&config.key_path).await?;
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            auth: AuthSource::ServiceAccount(auth),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        })
    }

    #[cfg(test)]
    fn for_tests(endpoint: String, project_id: &str) -> Self {
        Self {
            http: Client::builder()
                .timeout(Duration::from_secs(2))
                .build()
                .unwrap(),
            auth: AuthSource::Static {
                token: "test-token".to_string(),
                project_id: project_id.to_string(),
            },
            endpoint,
        }
    }

    async fn send_message(&self, device_token: &str, payload: &PushPayload) -> SendOutcome {
        let token = match self.auth.bearer_token().await {
            Ok(token) => token,
            Err(e) => {
                // Auth trouble says nothing about the device token.
                warn!("fcm token fetch failed: {}", e);
                return SendOutcome::Transient(e.to_string());
            }
        };

        let url = format!(
            "{}/v1/projects/{}/messages:send",
            self.endpoint,
            self.auth.project_id()
        );

        let body = FcmSend {
            message: FcmMessage {
                token: device_token.to_string(),
                notification: FcmNotification {
                    title: payload.title.clone(),
                    body: payload.body.clone(),
                },
                data: payload.data.clone(),
                android: AndroidConfig {
                    priority: "HIGH",
                    notification: AndroidNotification {
                        channel_id: "default",
                    },
                },
            },
        };

        let response = match self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let reason = if e.is_timeout() {
                    "fcm request timed out".to_string()
                } else {
                    format!("fcm request failed: {}", e)
                };
                return SendOutcome::Transient(reason);
            }
        };

        let status = response.status();
        if status.is_success() {
            match response.json::<FcmResponse>().await {
                Ok(accepted) => debug!("fcm accepted message {}", accepted.name),
                Err(e) => debug!("fcm success body not parseable: {}", e),
            }
            return SendOutcome::Delivered;
        }

        let error_code = match response.json::<serde_json::Value>().await {
            Ok(body) => extract_error_code(&body),
            Err(_) => None,
        };

        classify_failure(status.as_u16(), error_code.as_deref())
    }
}

/// Pull the most specific error code out of an FCM error body.
///
/// The v1 API nests the FCM-specific code in
/// `error.details[].errorCode`; `error.status` carries the generic
/// google.rpc code.
fn extract_error_code(body: &serde_json::Value) -> Option<String> {
    let error = body.get("error")?;

    if let Some(details) = error.get("details").and_then(|d| d.as_array()) {
        for detail in details {
            if let Some(code) = detail.get("errorCode").and_then(|c| c.as_str()) {
                return Some(code.to_string());
            }
        }
    }

    error
        .get("status")
        .and_then(|s| s.as_str())
        .map(str::to_string)
}

#[async_trait]
impl PushProvider for FcmClient {
    async fn send(&self, device_token: &str, payload: &PushPayload) -> SendOutcome {
        self.send_message(device_token, payload).await
    }

    fn token_type(&self) -> TokenType {
        TokenType::Fcm
    }
}
