//! Configuration loading for the Ember push backend.
//!
//! All configuration comes from the environment (optionally seeded from a
//! `.env` file in development). [`load_config`] validates the full surface
//! up front and returns an error naming the first missing variable, so the
//! process fails fast at startup instead of on first use.

pub mod models;

use config::{Config, ConfigError, Environment};
use once_cell::sync::Lazy;
use serde::Deserialize;

pub use models::{
    ApnsConfig, AppConfig, DatabaseConfig, FirebaseConfig, RedisConfig, ServerConfig, WorkerConfig,
};

static DOTENV: Lazy<()> = Lazy::new(|| {
    // Missing .env is fine; production sets real environment variables.
    let _ = dotenv::dotenv();
});

/// Load `.env` once per process. Safe to call from multiple crates.
pub fn ensure_dotenv_loaded() {
    Lazy::force(&DOTENV);
}

/// Raw view of the environment, one field per recognized variable.
///
/// Everything is optional here; `assemble` decides what is required and
/// produces the fail-fast error naming the missing variable.
#[derive(Debug, Default, Deserialize)]
struct RawEnv {
    host: Option<String>,
    port: Option<u16>,
    database_url: Option<String>,
    redis_url: Option<String>,
    firebase_service_account_json: Option<String>,
    apns_key_path: Option<String>,
    apns_key_id: Option<String>,
    apns_team_id: Option<String>,
    apns_bundle_id: Option<String>,
    apns_production: Option<bool>,
    queue_max_attempts: Option<u32>,
    queue_base_backoff_secs: Option<u64>,
    queue_max_backoff_secs: Option<u64>,
    queue_lease_secs: Option<u64>,
    provider_timeout_secs: Option<u64>,
    worker_concurrency: Option<usize>,
}

fn required<T>(value: Option<T>, var: &str) -> Result<T, ConfigError> {
    value.ok_or_else(|| ConfigError::NotFound(var.to_string()))
}

fn assemble(raw: RawEnv) -> Result<AppConfig, ConfigError> {
    let defaults = WorkerConfig::default();

    Ok(AppConfig {
        server: ServerConfig {
            host: raw.host.unwrap_or_else(|| "0.0.0.0".to_string()),
            port: required(raw.port, "PORT")?,
        },
        database: DatabaseConfig {
            url: required(raw.database_url, "DATABASE_URL")?,
        },
        redis: RedisConfig {
            url: required(raw.redis_url, "REDIS_URL")?,
        },
        firebase: FirebaseConfig {
            key_path: required(
                raw.firebase_service_account_json,
                "FIREBASE_SERVICE_ACCOUNT_JSON",
            )?,
        },
        apns: ApnsConfig {
            key_path: required(raw.apns_key_path, "APNS_KEY_PATH")?,
            key_id: required(raw.apns_key_id, "APNS_KEY_ID")?,
            team_id: required(raw.apns_team_id, "APNS_TEAM_ID")?,
            bundle_id: required(raw.apns_bundle_id, "APNS_BUNDLE_ID")?,
            production: raw.apns_production.unwrap_or(true),
        },
        worker: WorkerConfig {
            max_attempts: raw.queue_max_attempts.unwrap_or(defaults.max_attempts),
            base_backoff_secs: raw
                .queue_base_backoff_secs
                .unwrap_or(defaults.base_backoff_secs),
            max_backoff_secs: raw
                .queue_max_backoff_secs
                .unwrap_or(defaults.max_backoff_secs),
            lease_secs: raw.queue_lease_secs.unwrap_or(defaults.lease_secs),
            provider_timeout_secs: raw
                .provider_timeout_secs
                .unwrap_or(defaults.provider_timeout_secs),
            concurrency: raw.worker_concurrency.unwrap_or(defaults.concurrency),
        },
    })
}

/// Load and validate the application configuration from the environment.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    ensure_dotenv_loaded();

    let raw: RawEnv = Config::builder()
        .add_source(Environment::default().try_parsing(true))
        .build()?
        .try_deserialize()?;

    assemble(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_raw() -> RawEnv {
        RawEnv {
            host: None,
            port: Some(8080),
            database_url: Some("sqlite::memory:".into()),
            redis_url: Some("redis://127.0.0.1:6379".into()),
            firebase_service_account_json: Some("/etc/ember/firebase.json".into()),
            apns_key_path: Some("/etc/ember/apns.p8".into()),
            apns_key_id: Some("KEY123".into()),
            apns_team_id: Some("TEAM456".into()),
            apns_bundle_id: Some("com.ember.app".into()),
            apns_production: None,
            queue_max_attempts: None,
            queue_base_backoff_secs: None,
            queue_max_backoff_secs: None,
            queue_lease_secs: None,
            provider_timeout_secs: None,
            worker_concurrency: None,
        }
    }

    #[test]
    fn assembles_full_config_with_defaults() {
        let config = assemble(full_raw()).unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert!(config.apns.production, "APNS_PRODUCTION defaults to true");
        assert_eq!(config.worker.max_attempts, 5);
        assert_eq!(config.worker.base_backoff_secs, 1);
        assert_eq!(config.worker.max_backoff_secs, 60);
        assert_eq!(config.worker.lease_secs, 30);
        assert_eq!(config.worker.provider_timeout_secs, 10);
    }

    #[test]
    fn missing_required_variable_fails_fast_with_its_name() {
        let mut raw = full_raw();
        raw.redis_url = None;

        let err = assemble(raw).unwrap_err();
        assert!(err.to_string().contains("REDIS_URL"), "got: {err}");
    }

    #[test]
    fn missing_port_is_reported() {
        let mut raw = full_raw();
        raw.port = None;

        let err = assemble(raw).unwrap_err();
        assert!(err.to_string().contains("PORT"), "got: {err}");
    }

    #[test]
    fn apns_production_can_select_sandbox() {
        let mut raw = full_raw();
        raw.apns_production = Some(false);

        let config = assemble(raw).unwrap();
        assert!(!config.apns.production);
    }
}
