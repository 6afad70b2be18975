//! In-memory `KvStore`, used by tests and by local runs that don't need
//! state to survive a restart.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::StorageError;
use crate::external::kv::{asset_key, utxo_id};
use crate::external::KvStore;

#[derive(Default)]
struct State {
    cursor: Option<(u64, String)>,
    fingerprint: Option<String>,
    utxo_bytes: HashMap<String, Vec<u8>>,
    utxo_address: HashMap<String, String>,
    address_utxos: HashMap<String, HashSet<String>>,
    asset_utxo: HashMap<String, String>,
}

pub struct InMemoryKvStore {
    state: RwLock<State>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
        }
    }
}

impl Default for InMemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn get_cursor(&self) -> Result<Option<(u64, String)>, StorageError> {
        Ok(self.state.read().cursor.clone())
    }

    async fn update_cursor(&self, slot: u64, hash: &str) -> Result<(), StorageError> {
        self.state.write().cursor = Some((slot, hash.to_string()));
        Ok(())
    }

    async fn get_fingerprint(&self) -> Result<Option<String>, StorageError> {
        Ok(self.state.read().fingerprint.clone())
    }

    async fn set_fingerprint(&self, fingerprint: &str) -> Result<(), StorageError> {
        self.state.write().fingerprint = Some(fingerprint.to_string());
        Ok(())
    }

    async fn add_utxo(&self, address: &str, tx_hash: &str, index: u32, bytes: &[u8]) -> Result<(), StorageError> {
        let id = utxo_id(tx_hash, index);
        let mut state = self.state.write();
        state.utxo_bytes.insert(id.clone(), bytes.to_vec());
        state.utxo_address.insert(id.clone(), address.to_string());
        state.address_utxos.entry(address.to_string()).or_default().insert(id);
        Ok(())
    }

    async fn remove_utxo(&self, tx_hash: &str, index: u32) -> Result<(), StorageError> {
        let id = utxo_id(tx_hash, index);
        let mut state = self.state.write();
        state.utxo_bytes.remove(&id);
        if let Some(address) = state.utxo_address.remove(&id) {
            if let Some(set) = state.address_utxos.get_mut(&address) {
                set.remove(&id);
            }
        }
        Ok(())
    }

    async fn get_utxos(&self, address: &str) -> Result<Vec<Vec<u8>>, StorageError> {
        let state = self.state.read();
        let Some(ids) = state.address_utxos.get(address) else {
            return Ok(Vec::new());
        };
        Ok(ids.iter().filter_map(|id| state.utxo_bytes.get(id).cloned()).collect())
    }

    async fn get_utxo_by_id(&self, id: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.state.read().utxo_bytes.get(id).cloned())
    }

    async fn get_utxo_address(&self, id: &str) -> Result<Option<String>, StorageError> {
        Ok(self.state.read().utxo_address.get(id).cloned())
    }

    async fn set_asset_utxo(&self, prefix: &str, policy: &[u8], name: &[u8], tx_hash: &str, index: u32) -> Result<(), StorageError> {
        let key = asset_key(prefix, policy, name);
        self.state.write().asset_utxo.insert(key, utxo_id(tx_hash, index));
        Ok(())
    }

    async fn get_asset_utxo_id(&self, prefix: &str, policy: &[u8], name: &[u8]) -> Result<Option<String>, StorageError> {
        let key = asset_key(prefix, policy, name);
        Ok(self.state.read().asset_utxo.get(&key).cloned())
    }
}
