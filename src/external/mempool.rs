//! Mempool interface (spec §6 "Mempool interface").

use async_trait::async_trait;

/// `on_new_transaction(era_tag, raw_bytes)`: the core re-parses this to
/// obtain outputs, hash, and inputs, same as a confirmed transaction but
/// with no slot yet assigned.
#[derive(Debug, Clone)]
pub struct MempoolTransaction {
    pub era_tag: u16,
    pub raw_bytes: Vec<u8>,
}

/// The upstream mempool-observation transport.
#[async_trait]
pub trait MempoolSource: Send + Sync {
    async fn next_transaction(&mut self) -> Option<MempoolTransaction>;
}
