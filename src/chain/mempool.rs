//! Consumes new-transaction notifications from the mempool and mirrors
//! order outputs into the router as provisional entries (spec §4.4).

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::core::matcher::{MatchOutcome, Matcher};
use crate::core::order::OrderState;
use crate::core::router::SmartOrderRouter;
use crate::external::{MempoolSource, Submitter, TxBuilder, TxParser};

use super::datum::decode_order_datum;

/// Resolves a maker's current state plus its UTxO's lovelace quantity
/// for `Matcher::attempt_match`; see that method's doc comment.
pub type MakerLookup<'a> = dyn Fn(&str) -> Option<(OrderState, u64)> + Send + Sync + 'a;

pub struct MempoolObserver<P, B, S> {
    router: Arc<SmartOrderRouter>,
    parser: Arc<P>,
    matcher: Arc<Matcher<B, S>>,
    watched_addresses: HashSet<String>,
    protocol_tag: String,
}

impl<P, B, S> MempoolObserver<P, B, S>
where
    P: TxParser,
    B: TxBuilder,
    S: Submitter,
{
    pub fn new(
        router: Arc<SmartOrderRouter>,
        parser: Arc<P>,
        matcher: Arc<Matcher<B, S>>,
        watched_addresses: HashSet<String>,
        protocol_tag: impl Into<String>,
    ) -> Self {
        Self {
            router,
            parser,
            matcher,
            watched_addresses,
            protocol_tag: protocol_tag.into(),
        }
    }

    /// Drives mempool notifications from `source` until it closes.
    pub async fn run(&self, mut source: impl MempoolSource, maker_lookup: &MakerLookup<'_>) {
        while let Some(tx) = source.next_transaction().await {
            let now = Utc::now().timestamp();
            self.on_new_transaction(tx.era_tag, &tx.raw_bytes, now, maker_lookup).await;
        }
    }

    /// `on_new_transaction(era_tag, raw_bytes)` (spec §4.4): same decode
    /// path as `ChainFollower`, but `slot = 0`, no persistence, and an
    /// extra step afterward — attempt a match for every taker-shaped
    /// order this transaction introduced.
    pub async fn on_new_transaction(&self, era_tag: u16, raw_bytes: &[u8], now: i64, maker_lookup: &MakerLookup<'_>) {
        let parsed = match self.parser.parse(era_tag, raw_bytes) {
            Ok(parsed) => parsed,
            Err(err) => {
                debug!(error = %err, "failed to re-parse mempool transaction, skipping");
                crate::metrics::record_datum_decode_failure("mempool_tx");
                return;
            }
        };
        crate::metrics::record_mempool_transaction();

        let mut observed = Vec::new();
        for output in parsed.produced {
            if !self.watched_addresses.contains(&output.address) {
                continue;
            }
            let Some(datum_cbor) = output.datum_cbor else {
                continue;
            };
            let datum = match decode_order_datum(&datum_cbor) {
                Ok(d) => d,
                Err(err) => {
                    debug!(tx_hash = %parsed.tx_hash, index = output.index, error = %err, "mempool datum decode failed, skipping");
                    crate::metrics::record_datum_decode_failure("mempool");
                    continue;
                }
            };

            let order_id = format!("{}:{}", self.protocol_tag, hex::encode(&datum.nft));
            let is_active = datum.start_time.map_or(true, |s| s <= now) && datum.end_time.map_or(true, |e| e > now);

            let order = OrderState {
                order_id: order_id.clone(),
                tx_hash: parsed.tx_hash.clone(),
                tx_index: output.index,
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

            // Idempotent re-observation: `update_order` keys on
            // `order_id`, so a transaction seen twice (mempool, then
            // confirmed) only ever refreshes timestamps.
            self.router.update_order(order.clone());
            info!(order_id = %order_id, tx_hash = %parsed.tx_hash, "order observed in mempool");
            observed.push(order);
        }

        for taker in &observed {
            let outcome = self.matcher.attempt_match(taker, now, maker_lookup).await;
            match outcome {
                MatchOutcome::Submitted => info!(order_id = %taker.order_id, "mempool-triggered match submitted"),
                MatchOutcome::NoRoute => debug!(order_id = %taker.order_id, "no route for mempool taker"),
                other => warn!(order_id = %taker.order_id, outcome = ?other, "mempool-triggered match did not complete"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::asset::AssetId;
    use crate::core::fees::FeeSchedule;
    use crate::core::matcher::MatcherConfig;
    use crate::core::order::ContainedFee;
    use crate::external::tx_builder::{SignedTx, UnsignedTx};
    use crate::external::{SubmitStatus, TxBuildRequest};
    use async_trait::async_trait;
    use ciborium::value::Value as V;

    const CONSTR_0_TAG: u64 = 121;
    const CONSTR_1_TAG: u64 = 122;

    struct StubBuilder;

    #[async_trait]
    impl TxBuilder for StubBuilder {
        async fn build(&self, _request: TxBuildRequest) -> Result<UnsignedTx, crate::error::BuildError> {
            Ok(UnsignedTx(vec![1]))
        }
        async fn sign(&self, _unsigned: UnsignedTx) -> Result<SignedTx, crate::error::BuildError> {
            Ok(SignedTx(vec![1]))
        }
        fn to_bytes(&self, signed: &SignedTx) -> Vec<u8> {
            signed.0.clone()
        }
    }

    struct StubSubmitter;

    #[async_trait]
    impl Submitter for StubSubmitter {
        async fn submit(&self, _tx_bytes: Vec<u8>) -> SubmitStatus {
            SubmitStatus::Accepted
        }
    }

    fn constr0(fields: Vec<V>) -> V {
        V::Tag(CONSTR_0_TAG, Box::new(V::Array(fields)))
    }

    fn constr1(fields: Vec<V>) -> V {
        V::Tag(CONSTR_1_TAG, Box::new(V::Array(fields)))
    }

    fn datum_bytes(nft: &str, offered_amount: u64) -> Vec<u8> {
        let value = constr0(vec![
            V::Bytes(vec![0xAA; 28]),
            V::Bytes(nft.as_bytes().to_vec()),
            V::Bytes(vec![]),
            V::Bytes(vec![]),
            V::Bytes(vec![0x01]),
            V::Bytes(b"TKN".to_vec()),
            V::Integer(1.into()),
            V::Integer(2.into()),
            constr1(vec![]),
            constr1(vec![]),
            V::Integer((offered_amount as i64).into()),
            V::Integer((offered_amount as i64).into()),
            V::Integer(0.into()),
            V::Integer(0.into()),
            V::Integer(0.into()),
            V::Integer(0.into()),
            V::Integer(0.into()),
            V::Integer(0.into()),
            V::Integer(0.into()),
            V::Integer(0.into()),
            V::Integer(0.into()),
            V::Integer(1.into()),
        ]);
        let mut buf = Vec::new();
        ciborium::ser::into_writer(&value, &mut buf).unwrap();
        buf
    }

    struct StubParser {
        outputs: Vec<crate::external::ProducedOutput>,
    }

    impl TxParser for StubParser {
        fn parse(&self, _era_tag: u16, _raw_bytes: &[u8]) -> Result<crate::external::ParsedTransaction, crate::error::DecodeError> {
            Ok(crate::external::ParsedTransaction {
                tx_hash: "tx-mempool".to_string(),
                consumed: vec![],
                produced: self.outputs.clone(),
            })
        }
    }

    fn maker_order(id: &str) -> OrderState {
        OrderState {
            order_id: id.to_string(),
            tx_hash: format!("tx-{id}"),
            tx_index: 0,
            slot: 100,
            // An ask: offers TKN, asks native, at 2 native per TKN.
            offered_asset: AssetId::new(vec![1], b"TKN".to_vec()),
            offered_amount: 1_000_000,
            original_amount: 1_000_000,
            asked_asset: AssetId::native(),
            price: crate::core::asset::Rational::new(2, 1),
            is_active: true,
            start_time: None,
            end_time: None,
            partial_fills: 0,
            nft: id.as_bytes().to_vec(),
            owner_key: vec![],
            flat_fee: 0,
            percent_fee_ppm: 0,
            percent_fee_max: 0,
            contained_fee: ContainedFee {
                lovelace: 0,
                offered: 0,
                asked: 0,
            },
            contained_payment: 0,
            maker_fee: crate::core::asset::Rational::zero(),
            first_seen: 0,
            updated_at: 0,
        }
    }

    #[tokio::test]
    async fn observed_order_is_mirrored_and_triggers_a_match() {
        let router = Arc::new(SmartOrderRouter::new(false));
        router.add_order(maker_order("maker1"));

        let watched: HashSet<String> = ["addr_watched".to_string()].into_iter().collect();
        let output = crate::external::ProducedOutput {
            address: "addr_watched".to_string(),
            tx_hash: "tx-mempool".to_string(),
            index: 0,
            raw_bytes: vec![0xAB],
            datum_cbor: Some(datum_bytes("takerNft", 2_000_000)),
        };
        let parser = Arc::new(StubParser { outputs: vec![output] });

        let matcher = Arc::new(Matcher::new(
            router.clone(),
            MatcherConfig {
                enabled: true,
                default_slippage_bps: 1000,
                min_utxo_lovelace: 2_000_000,
                fees: FeeSchedule {
                    taker_fee: 100_000,
                    matcher_reward: 100_000,
                },
            },
            Arc::new(StubBuilder),
            Arc::new(StubSubmitter),
        ));

        let observer = MempoolObserver::new(router.clone(), parser, matcher, watched, "splash");

        let maker = maker_order("maker1");
        let lookup = move |id: &str| if id == "maker1" { Some((maker.clone(), 2_000_000)) } else { None };

        observer.on_new_transaction(1, &[], 1000, &lookup).await;

        assert!(router.all_orders().iter().any(|o| o.order_id == "splash:74616b65724e6674"));
    }
}
