//! OAuth2 authentication for Firebase Cloud Messaging.
//!
//! FCM HTTP v1 requests carry a bearer token minted from a service-account
//! key with the `firebase.messaging` scope. The key file is read once at
//! construction time so a bad path or malformed key fails at startup, not
//! on the first send.

use crate::client::FcmError;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use yup_oauth2::{read_service_account_key, ServiceAccountAuthenticator, ServiceAccountKey};

const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";

// Google access tokens live for an hour; refresh comfortably before expiry.
const TOKEN_TTL: Duration = Duration::from_secs(50 * 60);

/// Mints and caches FCM access tokens from a service-account key.
pub struct FcmAuth {
    key: ServiceAccountKey,
    cached: Mutex<Option<(String, Instant)>>,
}

impl FcmAuth {
    /// Read and validate the service-account key file.
    pub async fn from_key_file(key_path: &str) -> Result<Self, FcmError> {
        let key = read_service_account_key(Path::new(key_path))
            .await
            .map_err(|e| {
                FcmError::Config(format!(
                    "failed to read service account key {key_path}: {e}"
                ))
            })?;

        if key.project_id.is_none() {
            return Err(FcmError::Config(format!(
                "service account key {key_path} carries no project_id"
            )));
        }

        Ok(Self {
            key,
            cached: Mutex::new(None),
        })
    }

    /// The FCM project id from the key file.
    pub fn project_id(&self) -> &str {
        self.key.project_id.as_deref().unwrap_or_default()
    }

    /// A bearer token for the messaging scope, cached until near expiry.
    pub async fn bearer_token(&self) -> Result<String, FcmError> {
        let mut cached = self.cached.lock().await;
        if let Some((token, minted_at)) = cached.as_ref() {
            if minted_at.elapsed() < TOKEN_TTL {
                return Ok(token.clone());
            }
        }

        let authenticator = ServiceAccountAuthenticator::builder(self.key.clone())
            .build()
            .await
            .map_err(|e| FcmError::Auth(e.to_string()))?;

        let access_token = authenticator
            .token(&[FCM_SCOPE])
            .await
            .map_err(|e| FcmError::Auth(e.to_string()))?;

        let token = access_token
            .token()
            .ok_or_else(|| FcmError::Auth("no access token returned".to_string()))?
            .to_string();

        *cached = Some((token.clone(), Instant::now()));
        Ok(token)
    }
}
