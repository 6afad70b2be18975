//! Consumes block events and rollbacks from the upstream chain-sync
//! collaborator and keeps the router consistent with the canonical
//! chain (spec §4.3).

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::core::order::OrderState;
use crate::core::router::SmartOrderRouter;
use crate::error::StorageError;
use crate::external::{
    ChainEvent, ChainSyncSource, ConsumedInput, KvStore, ProducedOutput, RollbackEvent, StatusEvent, TransactionEvent,
};

use super::datum::decode_order_datum;

pub struct ChainFollower<K> {
    router: Arc<SmartOrderRouter>,
    kv: Arc<K>,
    watched_addresses: HashSet<String>,
    protocol_tag: String,
}

impl<K: KvStore> ChainFollower<K> {
    pub fn new(router: Arc<SmartOrderRouter>, kv: Arc<K>, watched_addresses: HashSet<String>, protocol_tag: impl Into<String>) -> Self {
        Self {
            router,
            kv,
            watched_addresses,
            protocol_tag: protocol_tag.into(),
        }
    }

    /// Drives events from `source` until the upstream connection closes
    /// for good.
    pub async fn run(&self, mut source: impl ChainSyncSource) {
        while let Some(event) = source.next_event().await {
            let now = Utc::now().timestamp();
            match event {
                ChainEvent::Transaction(tx) => self.on_transaction(tx, now).await,
                ChainEvent::Rollback(rb) => self.on_rollback(rb).await,
                ChainEvent::Status(status) => self.on_status(status).await,
            }
        }
    }

    /// `on_transaction` (spec §4.3 steps 1-5 for each produced output,
    /// plus the consumed-input removal pass).
    pub async fn on_transaction(&self, event: TransactionEvent, now: i64) {
        crate::metrics::record_chain_event("transaction");
        for output in event.produced {
            self.apply_produced_output(&event.tx_hash, event.slot, output, now).await;
        }
        for input in event.consumed {
            self.apply_consumed_input(input).await;
        }
        if let Err(err) = self.kv.update_cursor(event.slot, &event.block_hash).await {
            warn!(error = %err, "failed to persist chain-sync cursor");
        }
    }

    async fn apply_produced_output(&self, tx_hash: &str, slot: u64, output: ProducedOutput, now: i64) {
        if !self.watched_addresses.contains(&output.address) {
            return;
        }
        let Some(datum_cbor) = output.datum_cbor else {
            debug!(tx_hash, index = output.index, "output has no datum, skipping");
            return;
        };
        let datum = match decode_order_datum(&datum_cbor) {
            Ok(d) => d,
            Err(err) => {
                debug!(tx_hash, index = output.index, error = %err, "datum decode failed, skipping");
                crate::metrics::record_datum_decode_failure("chain");
                return;
            }
        };

        let order_id = format!("{}:{}", self.protocol_tag, hex::encode(&datum.nft));
        let is_active = datum.start_time.map_or(true, |s| s <= now) && datum.end_time.map_or(true, |e| e > now);

        let order = OrderState {
            order_id: order_id.clone(),
            tx_hash: tx_hash.to_string(),
            tx_index: output.index,
            slot,
            offered_asset: datum.offered_asset,
            offered_amount: datum.offered_amount,
            original_amount: datum.original_amount,
            asked_asset: datum.asked_asset,
            price: datum.price,
            is_active,
            start_time: datum.start_time,
            end_time: datum.end_time,
            partial_fills: datum.partial_fills,
            nft: datum.nft,
            owner_key: datum.owner_key,
            flat_fee: datum.flat_fee,
            percent_fee_ppm: datum.percent_fee_ppm,
            percent_fee_max: datum.percent_fee_max,
            contained_fee: datum.contained_fee,
            contained_payment: datum.contained_payment,
            maker_fee: datum.maker_fee,
            first_seen: now,
            updated_at: now,
        };

        if let Err(err) = self.kv.add_utxo(&output.address, tx_hash, output.index, &output.raw_bytes).await {
            warn!(error = %err, "failed to persist utxo bytes");
        }
        self.router.update_order(order);
        info!(order_id = %order_id, tx_hash, index = output.index, "order observed on chain");
    }

    async fn apply_consumed_input(&self, input: ConsumedInput) {
        if let Some(order_id) = self.order_id_for(&input.tx_hash, input.index) {
            self.router.remove_order(&order_id);
        }
        if let Err(err) = self.kv.remove_utxo(&input.tx_hash, input.index).await {
            warn!(error = %err, "failed to remove spent utxo from storage");
        }
    }

    fn order_id_for(&self, tx_hash: &str, index: u32) -> Option<String> {
        self.router
            .all_orders()
            .into_iter()
            .find(|o| o.tx_hash == tx_hash && o.tx_index == index)
            .map(|o| o.order_id)
    }

    /// Rollback handling (spec §4.3; SPEC_FULL.md §D.1 resolves the
    /// "ambiguous source behavior" open question as the strict
    /// `updated_at ≥ S` interpretation): remove every order whose slot
    /// is in or after the rollback point. Mempool-sourced entries carry
    /// `slot == 0` and are never swept here — they have no chain
    /// position to roll back from.
    pub async fn on_rollback(&self, event: RollbackEvent) {
        crate::metrics::record_chain_event("rollback");
        crate::metrics::record_rollback();
        let victims: Vec<OrderState> = self
            .router
            .all_orders()
            .into_iter()
            .filter(|o| o.slot > 0 && o.slot >= event.slot)
            .collect();
        for order in &victims {
            self.router.remove_order(&order.order_id);
        }
        warn!(slot = event.slot, removed = victims.len(), "rollback applied");
    }

    pub async fn on_status(&self, status: StatusEvent) {
        crate::metrics::record_chain_event("status");
        debug!(
            cursor_slot = status.cursor_slot,
            tip_slot = status.tip_slot,
            tip_reached = status.tip_reached,
            "chain-sync status"
        );
    }

    /// Warm start (spec §4.3 "Cursor and warm start"): populate the
    /// router from persisted UTxO bytes before enabling the mempool
    /// path. The KV interface returns raw bytes per address without
    /// their originating (tx_hash, index); warm-started entries are
    /// given `slot = 0` and an empty provenance, matching the mempool
    /// convention, until the first live chain observation replaces them
    /// with a confirmed slot.
    pub async fn warm_start(&self, now: i64) -> Result<usize, StorageError> {
        let mut restored = 0;
        for address in &self.watched_addresses {
            for bytes in self.kv.get_utxos(address).await? {
                let Ok(datum) = decode_order_datum(&bytes) else {
                    continue;
                };
                let order_id = format!("{}:{}", self.protocol_tag, hex::encode(&datum.nft));
                let is_active = datum.start_time.map_or(true, |s| s <= now) && datum.end_time.map_or(true, |e| e > now);
                let order = OrderState {
                    order_id,
                    tx_hash: String::new(),
                    tx_index: 0,
                    slot: 0,
                    offered_asset: datum.offered_asset,
                    offered_amount: datum.offered_amount,
                    original_amount: datum.original_amount,
                    asked_asset: datum.asked_asset,
                    price: datum.price,
                    is_active,
                    start_time: datum.start_time,
                    end_time: datum.end_time,
                    partial_fills: datum.partial_fills,
                    nft: datum.nft,
                    owner_key: datum.owner_key,
                    flat_fee: datum.flat_fee,
                    percent_fee_ppm: datum.percent_fee_ppm,
                    percent_fee_max: datum.percent_fee_max,
                    contained_fee: datum.contained_fee,
                    contained_payment: datum.contained_payment,
                    maker_fee: datum.maker_fee,
                    first_seen: now,
                    updated_at: now,
                };
                self.router.update_order(order);
                restored += 1;
            }
        }
        Ok(restored)
    }
}
