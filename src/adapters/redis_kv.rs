//! Redis-backed `KvStore`, grounded on the teacher's
//! `cache::redis_client::RedisClient`: a `ConnectionManager` behind a
//! lock, reconnected lazily, with a `with_retry` wrapper around every
//! operation (spec §6 "Persisted state layout").

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::RwLock;
use tracing::warn;

use crate::error::StorageError;
use crate::external::KvStore;

pub use crate::external::kv::{asset_key, utxo_id};

const CURSOR_KEY: &str = "chainsync_cursor";
const FINGERPRINT_KEY: &str = "config_fingerprint";

#[derive(Debug, Clone)]
pub struct RedisKvStoreConfig {
    pub url: String,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for RedisKvStoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            max_retries: 3,
            retry_delay_ms: 100,
        }
    }
}

pub struct RedisKvStore {
    config: RedisKvStoreConfig,
    client: redis::Client,
    connection: RwLock<Option<ConnectionManager>>,
}

impl RedisKvStore {
    pub async fn new(config: RedisKvStoreConfig) -> Result<Self, StorageError> {
        let client = redis::Client::open(config.url.as_str()).map_err(|e| StorageError::Unavailable(e.to_string()))?;
        let store = Self {
            config,
            client,
            connection: RwLock::new(None),
        };
        store.ensure_connected().await?;
        Ok(store)
    }

    async fn ensure_connected(&self) -> Result<(), StorageError> {
        let mut conn = self.connection.write().await;
        if conn.is_none() {
            let manager = ConnectionManager::new(self.client.clone())
                .await
                .map_err(|e| StorageError::Unavailable(e.to_string()))?;
            *conn = Some(manager);
        }
        Ok(())
    }

    async fn connection(&self) -> Result<ConnectionManager, StorageError> {
        self.ensure_connected().await?;
        self.connection
            .read()
            .await
            .clone()
            .ok_or_else(|| StorageError::Unavailable("redis connection not available".to_string()))
    }

    /// Retries `operation` up to `max_retries` times, dropping the
    /// cached connection between attempts so a stale connection doesn't
    /// keep failing the same way.
    async fn with_retry<F, Fut, T>(&self, mut operation: F) -> Result<T, StorageError>
    where
        F: FnMut(ConnectionManager) -> Fut,
        Fut: std::future::Future<Output = redis::RedisResult<T>>,
    {
        let mut last_error = None;
        for attempt in 0..self.config.max_retries {
            match self.connection().await {
                Ok(conn) => match operation(conn).await {
                    Ok(result) => return Ok(result),
                    Err(err) => {
                        warn!(attempt = attempt + 1, error = %err, "redis operation failed");
                        last_error = Some(err.to_string());
                        *self.connection.write().await = None;
                    }
                },
                Err(err) => {
                    warn!(attempt = attempt + 1, error = %err, "redis connection unavailable");
                    last_error = Some(err.to_string());
                }
            }
            if attempt + 1 < self.config.max_retries {
                tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms * (attempt as u64 + 1))).await;
            }
        }
        Err(StorageError::OperationFailed(last_error.unwrap_or_else(|| "max retries exceeded".to_string())))
    }
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn get_cursor(&self) -> Result<Option<(u64, String)>, StorageError> {
        let raw: Option<String> = self.with_retry(|mut conn| async move { conn.get(CURSOR_KEY).await }).await?;
        Ok(raw.and_then(|s| {
            let (slot, hash) = s.split_once(',')?;
            Some((slot.parse().ok()?, hash.to_string()))
        }))
    }

    async fn update_cursor(&self, slot: u64, hash: &str) -> Result<(), StorageError> {
        let value = format!("{slot},{hash}");
        self.with_retry(|mut conn| {
            let value = value.clone();
            async move { conn.set(CURSOR_KEY, value).await }
        })
        .await
    }

    async fn get_fingerprint(&self) -> Result<Option<String>, StorageError> {
        self.with_retry(|mut conn| async move { conn.get(FINGERPRINT_KEY).await }).await
    }

    async fn set_fingerprint(&self, fingerprint: &str) -> Result<(), StorageError> {
        let fingerprint = fingerprint.to_string();
        self.with_retry(|mut conn| {
            let fingerprint = fingerprint.clone();
            async move { conn.set(FINGERPRINT_KEY, fingerprint).await }
        })
        .await
    }

    async fn add_utxo(&self, address: &str, tx_hash: &str, index: u32, bytes: &[u8]) -> Result<(), StorageError> {
        let id = utxo_id(tx_hash, index);
        let utxo_key = format!("utxo_{id}");
        let address_of_key = format!("{id}_address");
        let address_set_key = format!("address_{address}");
        let bytes = bytes.to_vec();
        let id2 = id.clone();
        let address = address.to_string();
        self.with_retry(move |mut conn| {
            let utxo_key = utxo_key.clone();
            let address_of_key = address_of_key.clone();
            let address_set_key = address_set_key.clone();
            let bytes = bytes.clone();
            let address = address.clone();
            let id2 = id2.clone();
            async move {
                conn.set::<_, _, ()>(&utxo_key, bytes).await?;
                conn.set::<_, _, ()>(&address_of_key, address).await?;
                conn.sadd::<_, _, ()>(&address_set_key, id2).await?;
                Ok(())
            }
        })
        .await
    }

    async fn remove_utxo(&self, tx_hash: &str, index: u32) -> Result<(), StorageError> {
        let id = utxo_id(tx_hash, index);
        let utxo_key = format!("utxo_{id}");
        let address_of_key = format!("{id}_address");
        self.with_retry(move |mut conn| {
            let utxo_key = utxo_key.clone();
            let address_of_key = address_of_key.clone();
            let id = id.clone();
            async move {
                let address: Option<String> = conn.get(&address_of_key).await?;
                conn.del::<_, ()>(&utxo_key).await?;
                conn.del::<_, ()>(&address_of_key).await?;
                if let Some(address) = address {
                    conn.srem::<_, _, ()>(format!("address_{address}"), id).await?;
                }
                Ok(())
            }
        })
        .await
    }

    async fn get_utxos(&self, address: &str) -> Result<Vec<Vec<u8>>, StorageError> {
        let address_set_key = format!("address_{address}");
        let ids: Vec<String> = self
            .with_retry(move |mut conn| {
                let address_set_key = address_set_key.clone();
                async move { conn.smembers(&address_set_key).await }
            })
            .await?;

        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let utxo_key = format!("utxo_{id}");
            let bytes: Option<Vec<u8>> = self
                .with_retry(move |mut conn| {
                    let utxo_key = utxo_key.clone();
                    async move { conn.get(&utxo_key).await }
                })
                .await?;
            if let Some(bytes) = bytes {
                out.push(bytes);
            }
        }
        Ok(out)
    }

    async fn get_utxo_by_id(&self, id: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let utxo_key = format!("utxo_{id}");
        self.with_retry(move |mut conn| {
            let utxo_key = utxo_key.clone();
            async move { conn.get(&utxo_key).await }
        })
        .await
    }

    async fn get_utxo_address(&self, id: &str) -> Result<Option<String>, StorageError> {
        let address_of_key = format!("{id}_address");
        self.with_retry(move |mut conn| {
            let address_of_key = address_of_key.clone();
            async move { conn.get(&address_of_key).await }
        })
        .await
    }

    async fn set_asset_utxo(&self, prefix: &str, policy: &[u8], name: &[u8], tx_hash: &str, index: u32) -> Result<(), StorageError> {
        let key = asset_key(prefix, policy, name);
        let value = utxo_id(tx_hash, index);
        self.with_retry(move |mut conn| {
            let key = key.clone();
            let value = value.clone();
            async move { conn.set(&key, value).await }
        })
        .await
    }

    async fn get_asset_utxo_id(&self, prefix: &str, policy: &[u8], name: &[u8]) -> Result<Option<String>, StorageError> {
        let key = asset_key(prefix, policy, name);
        self.with_retry(move |mut conn| {
            let key = key.clone();
            async move { conn.get(&key).await }
        })
        .await
    }
}
