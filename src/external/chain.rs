//! Upstream chain-sync interface (spec §6 "Upstream chain-sync
//! interface").

use async_trait::async_trait;

/// One produced transaction output, as handed to `ChainFollower` by the
/// chain-sync collaborator. `datum_cbor` is the raw inline datum bytes,
/// if any.
#[derive(Debug, Clone)]
pub struct ProducedOutput {
    pub address: String,
    pub tx_hash: String,
    pub index: u32,
    pub raw_bytes: Vec<u8>,
    pub datum_cbor: Option<Vec<u8>>,
}

/// A consumed input, identified by the UTxO it spent.
#[derive(Debug, Clone)]
pub struct ConsumedInput {
    pub tx_hash: String,
    pub index: u32,
}

/// `on_transaction(tx_hash, slot, block, consumed[], produced[])`.
#[derive(Debug, Clone)]
pub struct TransactionEvent {
    pub tx_hash: String,
    pub slot: u64,
    pub block_hash: String,
    pub consumed: Vec<ConsumedInput>,
    pub produced: Vec<ProducedOutput>,
}

/// `on_rollback(slot, block_hash)`.
#[derive(Debug, Clone)]
pub struct RollbackEvent {
    pub slot: u64,
    pub block_hash: String,
}

/// `on_status(cursor_slot, cursor_hash, tip_slot, tip_hash, tip_reached)`.
#[derive(Debug, Clone)]
pub struct StatusEvent {
    pub cursor_slot: u64,
    pub cursor_hash: String,
    pub tip_slot: u64,
    pub tip_hash: String,
    pub tip_reached: bool,
}

/// Chain-sync events, tagged so every new kind forces an exhaustive
/// match at every call site (spec §9 "Dynamic dispatch on event payload
/// → tagged variant").
#[derive(Debug, Clone)]
pub enum ChainEvent {
    Transaction(TransactionEvent),
    Rollback(RollbackEvent),
    Status(StatusEvent),
}

/// The upstream block-sync transport. The core never constructs a
/// concrete implementation; it is handed one at startup and only ever
/// calls `next_event`.
#[async_trait]
pub trait ChainSyncSource: Send + Sync {
    /// Blocks until the next chain-sync event is available, or returns
    /// `None` once the upstream connection has closed for good.
    async fn next_event(&mut self) -> Option<ChainEvent>;
}
