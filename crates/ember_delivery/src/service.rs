//! The delivery orchestrator.

use async_trait::async_trait;
use ember_common::{
    DeliveryError, DeliveryReport, PushDeliverer, PushPayload, PushProvider, SendOutcome,
    TokenRegistry, TokenType,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Fans one payload out to every active device token of a user.
///
/// Token outcomes are independent: a dead token is disabled and the loop
/// continues, a transient failure is collected, and only after every token
/// has been tried does the attempt fail if anything was transient. The
/// worker then retries the whole job; tokens that already received the
/// push may receive it again, which at-least-once delivery accepts.
pub struct DeliveryService {
    registry: Arc<dyn TokenRegistry>,
    providers: HashMap<TokenType, Arc<dyn PushProvider>>,
}

impl DeliveryService {
    pub fn new(registry: Arc<dyn TokenRegistry>) -> Self {
        Self {
            registry,
            providers: HashMap::new(),
        }
    }

    /// Register a provider adapter under the token type it serves.
    pub fn with_provider(mut self, provider: Arc<dyn PushProvider>) -> Self {
        self.providers.insert(provider.token_type(), provider);
        self
    }
}

#[async_trait]
impl PushDeliverer for DeliveryService {
    async fn deliver(
        &self,
        user_id: &str,
        payload: &PushPayload,
    ) -> Result<DeliveryReport, DeliveryError> {
        let tokens = self.registry.active_tokens_for_user(user_id).await?;
        if tokens.is_empty() {
            // Valid terminal state: the user has no registered devices.
            debug!(user_id, "no active device tokens, nothing to send");
            return Ok(DeliveryReport { sent: 0 });
        }

        let mut sent = 0usize;
        let mut transient_reasons: Vec<String> = Vec::new();

        for record in &tokens {
            let Some(provider) = self.providers.get(&record.token_type) else {
                // Misconfiguration, not a token problem; retryable.
                transient_reasons.push(format!(
                    "no provider configured for {}",
                    record.token_type
                ));
                continue;
            };

            match provider.send(&record.device_token, payload).await {
                SendOutcome::Delivered => sent += 1,
                SendOutcome::TokenInvalid => {
                    info!(
                        user_id,
                        provider = %record.token_type,
                        "provider declared token invalid, disabling"
                    );
                    if let Err(e) = self.registry.disable(&record.device_token).await {
                        // Treat a failed disable as transient so the retry
                        // gets another chance to prune the token.
                        warn!(user_id, "failed to disable dead token: {}", e);
                        transient_reasons.push(format!("disable failed: {e}"));
                    }
                }
                SendOutcome::Transient(reason) => {
                    warn!(
                        user_id,
                        provider = %record.token_type,
                        reason = %reason,
                        "transient send failure"
                    );
                    transient_reasons.push(reason);
                }
            }
        }

        if transient_reasons.is_empty() {
            Ok(DeliveryReport { sent })
        } else {
            Err(DeliveryError::Incomplete {
                sent,
                reason: transient_reasons.join("; "),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ember_common::DeviceTokenRecord;
    use ember_registry::InMemoryTokenRegistry;
    use std::sync::Mutex;

    /// Provider that answers from a per-token script and records its calls.
    struct ScriptedProvider {
        token_type: TokenType,
        outcomes: HashMap<String, SendOutcome>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn new(token_type: TokenType, outcomes: Vec<(&str, SendOutcome)>) -> Self {
            Self {
                token_type,
                outcomes: outcomes
                    .into_iter()
                    .map(|(token, outcome)| (token.to_string(), outcome))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PushProvider for ScriptedProvider {
        async fn send(&self, device_token: &str, _payload: &PushPayload) -> SendOutcome {
            self.calls.lock().unwrap().push(device_token.to_string());
            self.outcomes
                .get(device_token)
                .cloned()
                .unwrap_or(SendOutcome::Delivered)
        }

        fn token_type(&self) -> TokenType {
            self.token_type
        }
    }

    fn record(user: &str, token: &str, token_type: TokenType) -> DeviceTokenRecord {
        DeviceTokenRecord {
            user_id: user.to_string(),
            device_token: token.to_string(),
            token_type,
            platform: match token_type {
                TokenType::Fcm => "android".into(),
                TokenType::Apns => "ios".into(),
            },
            device_id: None,
            device_name: None,
            app_version: None,
            enabled: true,
            updated_at: Utc::now(),
        }
    }

    fn payload() -> PushPayload {
        PushPayload {
            title: "t".into(),
            body: "b".into(),
            data: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn no_tokens_is_success_without_provider_calls() {
        let registry = Arc::new(InMemoryTokenRegistry::new());
        let provider = Arc::new(ScriptedProvider::new(TokenType::Fcm, vec![]));
        let service = DeliveryService::new(registry).with_provider(provider.clone());

        let report = service.deliver("u-nobody", &payload()).await.unwrap();

        assert_eq!(report.sent, 0);
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn fans_out_across_providers_by_token_type() {
        let registry = Arc::new(InMemoryTokenRegistry::new());
        registry.upsert(record("u1", "tok-ios", TokenType::Apns)).await.unwrap();
        registry.upsert(record("u1", "tok-android", TokenType::Fcm)).await.unwrap();

        let apns = Arc::new(ScriptedProvider::new(TokenType::Apns, vec![]));
        let fcm = Arc::new(ScriptedProvider::new(TokenType::Fcm, vec![]));
        let service = DeliveryService::new(registry)
            .with_provider(apns.clone())
            .with_provider(fcm.clone());

        let report = service.deliver("u1", &payload()).await.unwrap();

        assert_eq!(report.sent, 2);
        assert_eq!(apns.calls(), vec!["tok-ios"]);
        assert_eq!(fcm.calls(), vec!["tok-android"]);
    }

    #[tokio::test]
    async fn invalid_token_is_disabled_and_the_rest_still_send() {
        let registry = Arc::new(InMemoryTokenRegistry::new());
        registry.upsert(record("u1", "tok-ios", TokenType::Apns)).await.unwrap();
        registry.upsert(record("u1", "tok-android", TokenType::Fcm)).await.unwrap();

        let apns = Arc::new(ScriptedProvider::new(
            TokenType::Apns,
            vec![("tok-ios", SendOutcome::TokenInvalid)],
        ));
        let fcm = Arc::new(ScriptedProvider::new(TokenType::Fcm, vec![]));
        let service = DeliveryService::new(registry.clone())
            .with_provider(apns.clone())
            .with_provider(fcm.clone());

        let report = service.deliver("u1", &payload()).await.unwrap();

        assert_eq!(report.sent, 1);
        assert!(!registry.record_for_token("tok-ios").unwrap().enabled);
        assert!(registry.record_for_token("tok-android").unwrap().enabled);
    }

    #[tokio::test]
    async fn transient_failure_fails_the_attempt_after_trying_every_token() {
        let registry = Arc::new(InMemoryTokenRegistry::new());
        registry.upsert(record("u1", "tok-flaky", TokenType::Apns)).await.unwrap();
        registry.upsert(record("u1", "tok-fine", TokenType::Apns)).await.unwrap();

        let apns = Arc::new(ScriptedProvider::new(
            TokenType::Apns,
            vec![("tok-flaky", SendOutcome::Transient("503".into()))],
        ));
        let service = DeliveryService::new(registry.clone()).with_provider(apns.clone());

        let err = service.deliver("u1", &payload()).await.unwrap_err();

        // The healthy token was still attempted before the attempt failed.
        assert_eq!(apns.calls().len(), 2);
        match err {
            DeliveryError::Incomplete { sent, reason } => {
                assert_eq!(sent, 1);
                assert!(reason.contains("503"));
            }
            other => panic!("expected Incomplete, got {other:?}"),
        }
        // Transient failures never disable a token.
        assert!(registry.record_for_token("tok-flaky").unwrap().enabled);
    }

    #[tokio::test]
    async fn missing_provider_is_a_transient_failure() {
        let registry = Arc::new(InMemoryTokenRegistry::new());
        registry.upsert(record("u1", "tok-ios", TokenType::Apns)).await.unwrap();

        let service = DeliveryService::new(registry.clone());

        let err = service.deliver("u1", &payload()).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Incomplete { sent: 0, .. }));
        assert!(registry.record_for_token("tok-ios").unwrap().enabled);
    }
}
