//! APNs HTTP API client.
//!
//! One `send` call posts one alert to one device token. The payload's
//! data map rides along as custom top-level keys next to `aps`, matching
//! what the mobile client reads out of `userInfo`.

use crate::auth::ApnsSigner;
use crate::classify::classify_failure;
use async_trait::async_trait;
use ember_common::{PushPayload, PushProvider, SendOutcome, TokenType};
use ember_config::ApnsConfig;
use reqwest::{header, Client};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const PRODUCTION_ENDPOINT: &str = "https://api.push.apple.com";
const SANDBOX_ENDPOINT: &str = "https://api.sandbox.push.apple.com";

/// Errors that can occur when constructing or driving the APNs client.
#[derive(Error, Debug)]
pub enum ApnsError {
    /// Missing or unusable configuration (key file, key format)
    #[error("apns configuration error: {0}")]
    Config(String),

    /// Error while minting a provider token
    #[error("apns signing error: {0}")]
    Signing(String),

    /// Error during the HTTP request to the APNs API
    #[error("apns request error: {0}")]
    Request(#[from] reqwest::Error),
}

/// Error body APNs returns on rejection.
#[derive(Debug, Deserialize)]
struct ApnsErrorBody {
    reason: String,
}

enum AuthSource {
    Signer(ApnsSigner),
    #[cfg(test)]
    Static(String),
}

impl AuthSource {
    async fn bearer_token(&self) -> Result<String, ApnsError> {
        match self {
            AuthSource::Signer(signer) => signer.bearer_token().await,
            #[cfg(test)]
            AuthSource::Static(token) => Ok(token.clone()),
        }
    }
}

/// Client for the APNs HTTP API.
pub struct ApnsClient {
    http: Client,
    auth: AuthSource,
    topic: String,
    endpoint: String,
}

impl ApnsClient {
    /// Build the client from configuration.
    ///
    /// Parses the .p8 signing key immediately so key problems surface at
    /// startup. `production` selects the production or sandbox host; the
    /// bundle id becomes the `apns-topic` header on every send.
    pub async fn new(config: &ApnsConfig, timeout: Duration) -> Result<Self, ApnsError> {
        let auth =
            ApnsSigner::from_key_file(&config.key_path, &config.key_id, &config.team_id).await?;
        let http = Client::builder().timeout(timeout).build()?;

        let endpoint = if config.production {
            PRODUCTION_ENDPOINT
        } else {
            SANDBOX_ENDPOINT
        };

        Ok(Self {
            http,
            auth: AuthSource::Signer(auth),
            topic: config.bundle_id.clone(),
            endpoint: endpoint.to_string(),
        })
    }

    #[cfg(test)]
    fn for_tests(endpoint: String, topic: &str) -> Self {
        Self {
            http: Client::builder()
                .timeout(Duration::from_secs(2))
                .build()
                .unwrap(),
            auth: AuthSource::Static("test-token".to_string()),
            topic: topic.to_string(),
            endpoint,
        }
    }

    async fn send_alert(&self, device_token: &str, payload: &PushPayload) -> SendOutcome {
        let token = match self.auth.bearer_token().await {
            Ok(token) => token,
            Err(e) => return SendOutcome::Transient(e.to_string()),
        };

        let url = format!("{}/3/device/{}", self.endpoint, device_token);
        let body = build_body(payload);

        let response = match self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header("apns-topic", &self.topic)
            .header("apns-push-type", "alert")
            .header("apns-priority", "10")
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let reason = if e.is_timeout() {
                    "apns request timed out".to_string()
                } else {
                    format!("apns request failed: {}", e)
                };
                return SendOutcome::Transient(reason);
            }
        };

        let status = response.status();
        if status.is_success() {
            debug!("apns accepted alert");
            return SendOutcome::Delivered;
        }

        let reason = response
            .json::<ApnsErrorBody>()
            .await
            .ok()
            .map(|body| body.reason);

        classify_failure(status.as_u16(), reason.as_deref())
    }
}

/// Custom data keys sit next to `aps` at the top level; `aps` always wins
/// on a name collision.
fn build_body(payload: &PushPayload) -> Value {
    let mut body = serde_json::Map::new();
    for (key, value) in &payload.data {
        body.insert(key.clone(), Value::String(value.clone()));
    }

    body.insert(
        "aps".to_string(),
        json!({
            "alert": {
                "title": payload.title,
                "body": payload.body,
            },
            "sound": "default",
        }),
    );

    Value::Object(body)
}

#[async_trait]
impl PushProvider for ApnsClient {
    async fn send(&self, device_token: &str, payload: &PushPayload) -> SendOutcome {
        self.send_alert(device_token, payload).await
    }

    fn token_type(&self) -> TokenType {
        TokenType::Apns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn payload() -> PushPayload {
        let mut data = HashMap::new();
        data.insert("type".to_string(), "like".to_string());
        data.insert("deepLink".to_string(), "ember://matches".to_string());
        PushPayload {
            title: "New like".to_string(),
            body: "Ada liked you".to_string(),
            data,
        }
    }

    #[test]
    fn body_puts_data_next_to_aps() {
        let body = build_body(&payload());
        assert_eq!(body["aps"]["alert"]["title"], "New like");
        assert_eq!(body["aps"]["sound"], "default");
        assert_eq!(body["type"], "like");
        assert_eq!(body["deepLink"], "ember://matches");
    }

    #[test]
    fn aps_key_cannot_be_shadowed_by_data() {
        let mut payload = payload();
        payload
            .data
            .insert("aps".to_string(), "overridden".to_string());
        let body = build_body(&payload);
        assert_eq!(body["aps"]["sound"], "default");
    }

    #[tokio::test]
    async fn accepted_alert_is_delivered() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/3/device/tok-ios"))
            .and(header("authorization", "Bearer test-token"))
            .and(header("apns-topic", "com.ember.app"))
            .and(header("apns-push-type", "alert"))
            .and(body_partial_json(serde_json::json!({
                "aps": {"alert": {"title": "New like", "body": "Ada liked you"}},
                "type": "like"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApnsClient::for_tests(server.uri(), "com.ember.app");
        let outcome = client.send("tok-ios", &payload()).await;

        assert_eq!(outcome, SendOutcome::Delivered);
    }

    #[tokio::test]
    async fn gone_token_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(410).set_body_json(serde_json::json!({
                "reason": "Unregistered",
                "timestamp": 1724900000000u64
            })))
            .mount(&server)
            .await;

        let client = ApnsClient::for_tests(server.uri(), "com.ember.app");
        let outcome = client.send("tok-stale", &payload()).await;

        assert_eq!(outcome, SendOutcome::TokenInvalid);
    }

    #[tokio::test]
    async fn bad_device_token_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({"reason": "BadDeviceToken"})),
            )
            .mount(&server)
            .await;

        let client = ApnsClient::for_tests(server.uri(), "com.ember.app");
        let outcome = client.send("not-a-token", &payload()).await;

        assert_eq!(outcome, SendOutcome::TokenInvalid);
    }

    #[tokio::test]
    async fn server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(503)
                    .set_body_json(serde_json::json!({"reason": "ServiceUnavailable"})),
            )
            .mount(&server)
            .await;

        let client = ApnsClient::for_tests(server.uri(), "com.ember.app");
        let outcome = client.send("tok-ios", &payload()).await;

        assert!(matches!(outcome, SendOutcome::Transient(_)));
    }
}
