// --- File: crates/ember_config/src/models.rs ---

use serde::{Deserialize, Serialize};

// --- General Server Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

// --- Token Registry store ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String, // DSN for the device-token registry, loaded via DATABASE_URL
}

// --- Dispatch queue backend ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RedisConfig {
    pub url: String, // loaded via REDIS_URL
}

// --- Firebase Cloud Messaging ---
// The service-account key file also carries the FCM project id.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FirebaseConfig {
    pub key_path: String, // loaded via FIREBASE_SERVICE_ACCOUNT_JSON
}

// --- Apple Push Notification service ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApnsConfig {
    pub key_path: String,  // .p8 signing key, loaded via APNS_KEY_PATH
    pub key_id: String,    // loaded via APNS_KEY_ID
    pub team_id: String,   // loaded via APNS_TEAM_ID
    pub bundle_id: String, // loaded via APNS_BUNDLE_ID
    /// Selects the production APNs endpoint; `false` targets the sandbox.
    /// Loaded via APNS_PRODUCTION, defaults to true.
    pub production: bool,
}

// --- Queue worker tuning ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WorkerConfig {
    /// Delivery attempts before a job is dead-lettered.
    pub max_attempts: u32,
    /// Base of the exponential retry backoff, in seconds.
    pub base_backoff_secs: u64,
    /// Backoff cap, in seconds.
    pub max_backoff_secs: u64,
    /// Claim lease; an in-flight job whose lease is older than this is
    /// reclaimed for another worker.
    pub lease_secs: u64,
    /// Per-request timeout for provider send calls, in seconds.
    pub provider_timeout_secs: u64,
    /// Number of concurrent worker loops to run.
    pub concurrency: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff_secs: 1,
            max_backoff_secs: 60,
            lease_secs: 30,
            provider_timeout_secs: 10,
            concurrency: 1,
        }
    }
}

// --- Unified App Configuration ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub firebase: FirebaseConfig,
    pub apns: ApnsConfig,
    pub worker: WorkerConfig,
}
