//! Database client for the token registry.
//!
//! Database agnostic through the SQLx `Any` driver; the registry DSN comes
//! from `DATABASE_URL`.

use crate::error::RegistryError;
use ember_config::DatabaseConfig;
use sqlx::pool::PoolOptions;
use sqlx::Pool;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error, info};

/// Connection-pool wrapper shared by the registry repositories.
#[derive(Debug, Clone)]
pub struct DbClient {
    pool: Pool<sqlx::Any>,
}

impl DbClient {
    /// Connect using the registry's database configuration.
    pub async fn from_config(db_config: &DatabaseConfig) -> Result<Self, RegistryError> {
        Self::from_url(&db_config.url).await
    }

    /// Connect to the given database URL.
    pub async fn from_url(db_url: &str) -> Result<Self, RegistryError> {
        if db_url.is_empty() {
            return Err(RegistryError::Config("database URL is empty".to_string()));
        }

        let pool = Self::create_pool(db_url).await?;
        Ok(Self { pool })
    }

    async fn create_pool(db_url: &str) -> Result<Pool<sqlx::Any>, RegistryError> {
        debug!("creating database pool for {}", db_url);

        // Registers the compiled-in drivers with the Any driver.
        sqlx::any::install_default_drivers();

        // An in-memory sqlite database exists per connection, so the pool
        // must hold exactly one long-lived connection for it.
        let pool_options = if db_url.contains(":memory:") {
            PoolOptions::new()
                .min_connections(1)
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            PoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Duration::from_secs(3))
                .idle_timeout(Duration::from_secs(600))
        };

        // SQLite will not create a missing database file on its own when
        // connecting through the Any driver, so create it up front.
        if db_url.starts_with("sqlite:") {
            let db_path = db_url
                .strip_prefix("sqlite://")
                .or_else(|| db_url.strip_prefix("sqlite:"))
                .unwrap_or(db_url);

            if !db_path.contains(":memory:") && !db_path.is_empty() {
                if let Some(dir) = std::path::Path::new(db_path).parent() {
                    if !dir.exists() {
                        std::fs::create_dir_all(dir).map_err(|e| {
                            error!("failed to create directory for sqlite database: {}", e);
                            RegistryError::Pool(format!("failed to create directory: {}", e))
                        })?;
                    }
                }

                if !std::path::Path::new(db_path).exists() {
                    debug!("creating empty sqlite database file: {}", db_path);
                    std::fs::File::create(db_path).map_err(|e| {
                        error!("failed to create sqlite database file: {}", e);
                        RegistryError::Pool(format!("failed to create database file: {}", e))
                    })?;
                }
            }
        }

        let pool = pool_options
            .connect_with(sqlx::any::AnyConnectOptions::from_str(db_url)?)
            .await
            .map_err(|e| {
                error!("failed to create database pool: {}", e);
                RegistryError::Pool(e.to_string())
            })?;

        info!("database pool created");
        Ok(pool)
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &Pool<sqlx::Any> {
        &self.pool
    }

    /// Execute a statement that returns no rows.
    pub async fn execute(&self, query: &str) -> Result<u64, RegistryError> {
        sqlx::query(query)
            .execute(&self.pool)
            .await
            .map(|r| r.rows_affected())
            .map_err(|e| RegistryError::Query(e.to_string()))
    }

    /// Cheap health probe used by operational logging.
    pub async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}
