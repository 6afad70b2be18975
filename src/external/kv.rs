//! Persistent key-value storage interface (spec §6 "KV store
//! interface", "Persisted state layout").
//!
//! Key layout (grouped per logical role, not per backing file):
//! `chainsync_cursor → "slot,hash"`; `config_fingerprint →
//! "network=…,profiles=…"`; `utxo_<tx.index> → CBOR [[tx_bytes, index],
//! raw_output]`; `<tx.index>_address → address`; `address_<addr> →
//! comma-joined "tx.index"` list; `<prefix>_asset_<hex(policy)>_<hex(name)>
//! → "tx.index"`.

use async_trait::async_trait;

use crate::error::StorageError;

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get_cursor(&self) -> Result<Option<(u64, String)>, StorageError>;
    async fn update_cursor(&self, slot: u64, hash: &str) -> Result<(), StorageError>;

    async fn get_fingerprint(&self) -> Result<Option<String>, StorageError>;
    async fn set_fingerprint(&self, fingerprint: &str) -> Result<(), StorageError>;

    async fn add_utxo(&self, address: &str, tx_hash: &str, index: u32, bytes: &[u8]) -> Result<(), StorageError>;
    async fn remove_utxo(&self, tx_hash: &str, index: u32) -> Result<(), StorageError>;
    async fn get_utxos(&self, address: &str) -> Result<Vec<Vec<u8>>, StorageError>;
    async fn get_utxo_by_id(&self, id: &str) -> Result<Option<Vec<u8>>, StorageError>;
    async fn get_utxo_address(&self, id: &str) -> Result<Option<String>, StorageError>;

    async fn set_asset_utxo(&self, prefix: &str, policy: &[u8], name: &[u8], tx_hash: &str, index: u32) -> Result<(), StorageError>;
    async fn get_asset_utxo_id(&self, prefix: &str, policy: &[u8], name: &[u8]) -> Result<Option<String>, StorageError>;
}

/// `"{tx_hash}.{index}"`, the id format used throughout the KV key
/// layout.
pub fn utxo_id(tx_hash: &str, index: u32) -> String {
    format!("{tx_hash}.{index}")
}

/// `"<prefix>_asset_<hex(policy)>_<hex(name)>"`.
pub fn asset_key(prefix: &str, policy: &[u8], name: &[u8]) -> String {
    format!("{prefix}_asset_{}_{}", hex::encode(policy), hex::encode(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utxo_id_matches_persisted_layout() {
        assert_eq!(utxo_id("abc123", 2), "abc123.2");
    }

    #[test]
    fn asset_key_hex_encodes_policy_and_name() {
        assert_eq!(asset_key("splash", &[0xAB], b"TKN"), "splash_asset_ab_544b4e");
    }
}
