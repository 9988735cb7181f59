//! SQL implementation of the token registry.

use crate::client::DbClient;
use crate::error::RegistryError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ember_common::{DeviceTokenRecord, StoreError, TokenRegistry, TokenType};
use sqlx::any::AnyRow;
use sqlx::Row;
use tracing::{debug, info, warn};

/// SQL-backed token registry.
#[derive(Debug, Clone)]
pub struct SqlTokenRegistry {
    db: DbClient,
}

impl SqlTokenRegistry {
    pub fn new(db: DbClient) -> Self {
        Self { db }
    }

    /// Create the `device_tokens` table if it does not already exist.
    pub async fn init_schema(&self) -> Result<(), RegistryError> {
        debug!("initializing device token schema");

        let query = r#"
            CREATE TABLE IF NOT EXISTS device_tokens (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                device_token TEXT NOT NULL,
                token_type TEXT NOT NULL,
                platform TEXT NOT NULL,
                device_id TEXT,
                device_name TEXT,
                app_version TEXT,
                enabled INTEGER NOT NULL DEFAULT 1,
                updated_at TEXT NOT NULL,
                UNIQUE(user_id, device_token)
            )
        "#;

        self.db.execute(query).await?;

        info!("device token schema initialized");
        Ok(())
    }

    fn record_from_row(row: &AnyRow) -> Result<DeviceTokenRecord, RegistryError> {
        let token_type_raw: String = row
            .try_get("token_type")
            .map_err(|e| RegistryError::Decode(e.to_string()))?;
        let token_type = TokenType::parse(&token_type_raw).ok_or_else(|| {
            RegistryError::Decode(format!("unknown token_type: {}", token_type_raw))
        })?;

        let updated_at_raw: String = row
            .try_get("updated_at")
            .map_err(|e| RegistryError::Decode(e.to_string()))?;
        let updated_at = DateTime::parse_from_rfc3339(&updated_at_raw)
            .map_err(|e| RegistryError::Decode(format!("bad updated_at: {}", e)))?
            .with_timezone(&Utc);

        let enabled: i64 = row
            .try_get("enabled")
            .map_err(|e| RegistryError::Decode(e.to_string()))?;

        Ok(DeviceTokenRecord {
            user_id: row
                .try_get("user_id")
                .map_err(|e| RegistryError::Decode(e.to_string()))?,
            device_token: row
                .try_get("device_token")
                .map_err(|e| RegistryError::Decode(e.to_string()))?,
            token_type,
            platform: row
                .try_get("platform")
                .map_err(|e| RegistryError::Decode(e.to_string()))?,
            device_id: row.try_get("device_id").ok(),
            device_name: row.try_get("device_name").ok(),
            app_version: row.try_get("app_version").ok(),
            enabled: enabled != 0,
            updated_at,
        })
    }

    async fn upsert_inner(&self, record: DeviceTokenRecord) -> Result<(), RegistryError> {
        debug!(
            "upserting device token for user {} ({})",
            record.user_id, record.token_type
        );

        // One statement so that concurrent upserts of the same key resolve
        // last-write-wins on updated_at. A re-registration always re-enables
        // the token.
        let query = r#"
            INSERT INTO device_tokens
                (user_id, device_token, token_type, platform, device_id, device_name, app_version, enabled, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 1, $8)
            ON CONFLICT(user_id, device_token) DO UPDATE SET
                token_type = excluded.token_type,
                platform = excluded.platform,
                device_id = excluded.device_id,
                device_name = excluded.device_name,
                app_version = excluded.app_version,
                enabled = 1,
                updated_at = excluded.updated_at
        "#;

        sqlx::query(query)
            .bind(&record.user_id)
            .bind(&record.device_token)
            .bind(record.token_type.as_str())
            .bind(&record.platform)
            .bind(&record.device_id)
            .bind(&record.device_name)
            .bind(&record.app_version)
            .bind(Utc::now().to_rfc3339())
            .execute(self.db.pool())
            .await
            .map_err(|e| RegistryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn disable_inner(&self, device_token: &str) -> Result<(), RegistryError> {
        // Keyed by token alone: the provider reporting the token invalid does
        // not know which user it belongs to.
        let query = r#"
            UPDATE device_tokens
            SET enabled = 0, updated_at = $1
            WHERE device_token = $2
        "#;

        let result = sqlx::query(query)
            .bind(Utc::now().to_rfc3339())
            .bind(device_token)
            .execute(self.db.pool())
            .await
            .map_err(|e| RegistryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            // Not an error: the token may already have been pruned.
            debug!("disable for unknown device token was a no-op");
        } else {
            info!("device token disabled");
        }

        Ok(())
    }

    async fn active_tokens_inner(
        &self,
        user_id: &str,
    ) -> Result<Vec<DeviceTokenRecord>, RegistryError> {
        let query = r#"
            SELECT user_id, device_token, token_type, platform,
                   device_id, device_name, app_version, enabled, updated_at
            FROM device_tokens
            WHERE user_id = $1 AND enabled = 1
        "#;

        let rows = sqlx::query(query)
            .bind(user_id)
            .fetch_all(self.db.pool())
            .await
            .map_err(|e| RegistryError::Query(e.to_string()))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            match Self::record_from_row(row) {
                Ok(record) => records.push(record),
                Err(e) => {
                    // A single corrupt row must not block delivery to the
                    // user's other devices.
                    warn!("skipping undecodable device token row: {}", e);
                }
            }
        }

        Ok(records)
    }
}

#[async_trait]
impl TokenRegistry for SqlTokenRegistry {
    async fn upsert(&self, record: DeviceTokenRecord) -> Result<(), StoreError> {
        self.upsert_inner(record).await.map_err(StoreError::from)
    }

    async fn disable(&self, device_token: &str) -> Result<(), StoreError> {
        self.disable_inner(device_token)
            .await
            .map_err(StoreError::from)
    }

    async fn active_tokens_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<DeviceTokenRecord>, StoreError> {
        self.active_tokens_inner(user_id)
            .await
            .map_err(StoreError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(user_id: &str, token: &str, token_type: TokenType) -> DeviceTokenRecord {
        DeviceTokenRecord {
            user_id: user_id.to_string(),
            device_token: token.to_string(),
            token_type,
            platform: "ios".to_string(),
            device_id: None,
            device_name: None,
            app_version: None,
            enabled: true,
            updated_at: Utc::now(),
        }
    }

    async fn registry() -> SqlTokenRegistry {
        let db = DbClient::from_url("sqlite::memory:").await.unwrap();
        let registry = SqlTokenRegistry::new(db);
        registry.init_schema().await.unwrap();
        registry
    }

    #[tokio::test]
    async fn upsert_is_idempotent_on_user_and_token() {
        let registry = registry().await;

        for _ in 0..3 {
            registry
                .upsert(record("u1", "tok-a", TokenType::Apns))
                .await
                .unwrap();
        }

        let tokens = registry.active_tokens_for_user("u1").await.unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].device_token, "tok-a");
        assert!(tokens[0].enabled);
    }

    #[tokio::test]
    async fn disable_excludes_token_from_lookups_but_retains_the_row() {
        let registry = registry().await;
        registry
            .upsert(record("u1", "tok-a", TokenType::Fcm))
            .await
            .unwrap();

        registry.disable("tok-a").await.unwrap();

        let active = registry.active_tokens_for_user("u1").await.unwrap();
        assert!(active.is_empty());

        // The record still exists: re-upserting flips it back on instead of
        // inserting a second row.
        registry
            .upsert(record("u1", "tok-a", TokenType::Fcm))
            .await
            .unwrap();
        let active = registry.active_tokens_for_user("u1").await.unwrap();
        assert_eq!(active.len(), 1);
    }

    #[tokio::test]
    async fn disable_unknown_token_is_a_no_op() {
        let registry = registry().await;

        registry.disable("never-seen").await.unwrap();

        let active = registry.active_tokens_for_user("anyone").await.unwrap();
        assert!(active.is_empty());
    }

    #[tokio::test]
    async fn reregistration_re_enables_a_disabled_token() {
        let registry = registry().await;
        registry
            .upsert(record("u1", "tok-a", TokenType::Apns))
            .await
            .unwrap();
        registry.disable("tok-a").await.unwrap();

        registry
            .upsert(record("u1", "tok-a", TokenType::Apns))
            .await
            .unwrap();

        let active = registry.active_tokens_for_user("u1").await.unwrap();
        assert_eq!(active.len(), 1);
        assert!(active[0].enabled);
    }

    #[tokio::test]
    async fn a_user_may_hold_several_tokens() {
        let registry = registry().await;
        registry
            .upsert(record("u1", "tok-ios", TokenType::Apns))
            .await
            .unwrap();
        registry
            .upsert(record("u1", "tok-android", TokenType::Fcm))
            .await
            .unwrap();
        registry
            .upsert(record("u2", "tok-other", TokenType::Fcm))
            .await
            .unwrap();

        let mut tokens: Vec<String> = registry
            .active_tokens_for_user("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.device_token)
            .collect();
        tokens.sort();
        assert_eq!(tokens, vec!["tok-android", "tok-ios"]);
    }
}
