//! In-memory token registry.
//!
//! Backs tests across the workspace; same contract as the SQL registry,
//! including last-write-wins resolution on `updated_at`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ember_common::{DeviceTokenRecord, StoreError, TokenRegistry};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct InMemoryTokenRegistry {
    // Keyed on (user_id, device_token), mirroring the SQL unique index.
    records: Mutex<HashMap<(String, String), DeviceTokenRecord>>,
}

impl InMemoryTokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an upsert stamped with an explicit timestamp. Later stamps win
    /// over earlier ones regardless of arrival order.
    pub fn upsert_at(&self, mut record: DeviceTokenRecord, at: DateTime<Utc>) {
        record.enabled = true;
        record.updated_at = at;
        let key = (record.user_id.clone(), record.device_token.clone());
        let mut records = self.records.lock().expect("registry lock poisoned");
        match records.get(&key) {
            Some(existing) if existing.updated_at > at => {}
            _ => {
                records.insert(key, record);
            }
        }
    }

    /// Apply a disable stamped with an explicit timestamp.
    pub fn disable_at(&self, device_token: &str, at: DateTime<Utc>) {
        let mut records = self.records.lock().expect("registry lock poisoned");
        for record in records.values_mut() {
            if record.device_token == device_token && record.updated_at <= at {
                record.enabled = false;
                record.updated_at = at;
            }
        }
    }

    /// Every stored record, including disabled ones. Test inspection only.
    pub fn all_records(&self) -> Vec<DeviceTokenRecord> {
        self.records
            .lock()
            .expect("registry lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Look up one record by token, enabled or not.
    pub fn record_for_token(&self, device_token: &str) -> Option<DeviceTokenRecord> {
        self.records
            .lock()
            .expect("registry lock poisoned")
            .values()
            .find(|r| r.device_token == device_token)
            .cloned()
    }
}

#[async_trait]
impl TokenRegistry for InMemoryTokenRegistry {
    async fn upsert(&self, record: DeviceTokenRecord) -> Result<(), StoreError> {
        self.upsert_at(record, Utc::now());
        Ok(())
    }

    async fn disable(&self, device_token: &str) -> Result<(), StoreError> {
        self.disable_at(device_token, Utc::now());
        Ok(())
    }

    async fn active_tokens_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<DeviceTokenRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .expect("registry lock poisoned")
            .values()
            .filter(|r| r.user_id == user_id && r.enabled)
            .cloned()
            .collect())
    }
}
