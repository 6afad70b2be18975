//! Orchestrates mempool→route→fill-plan→transaction assembly→submit
//! (spec §4.6). Grounded on the teacher's
//! `services::matching::orchestrator::OrderFlowOrchestrator`, which
//! plays the same "accept one event, drive it through a pipeline,
//! surface or log the outcome" role.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::error::{BuildError, RouterError};
use crate::external::{PlannedRedeemer, Submitter, SubmitStatus, TxBuildRequest, TxBuilder, UtxoRef};

use super::asset::AssetId;
use super::fees::FeeSchedule;
use super::fill_planner::{build_fill_plan, settle_taker_economics, FillPlan, MakerContext, Redeemer};
use super::order::OrderState;
use super::router::SmartOrderRouter;

/// Where a single match attempt currently is (spec §4.6 state table).
/// There is no retry loop: a dropped attempt is simply discarded and the
/// next observation of the same taker (if it survives) starts over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    Routed,
    NoRoute,
    PlanBuilt,
    PlanRejected,
    Submitted,
    BuildFailed,
}

impl MatchOutcome {
    /// Label used for the `outcome` metric dimension.
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchOutcome::Routed => "routed",
            MatchOutcome::NoRoute => "no_route",
            MatchOutcome::PlanBuilt => "plan_built",
            MatchOutcome::PlanRejected => "plan_rejected",
            MatchOutcome::Submitted => "submitted",
            MatchOutcome::BuildFailed => "build_failed",
        }
    }
}

/// Matcher configuration: enable gate, slippage policy, reward, and fee
/// schedule (spec §4.6 "State").
#[derive(Debug, Clone)]
pub struct MatcherConfig {
    pub enabled: bool,
    pub default_slippage_bps: u32,
    pub min_utxo_lovelace: u64,
    pub fees: FeeSchedule,
}

/// Drives the Observed → Routing → Planning → Building → Submitting
/// state machine for one taker observation at a time. Holds no mutable
/// match-attempt state of its own beyond the enable gate; every attempt
/// is a fresh, independently-abandonable task.
pub struct Matcher<B, S> {
    router: Arc<SmartOrderRouter>,
    config: MatcherConfig,
    enabled: AtomicBool,
    tx_builder: Arc<B>,
    submitter: Arc<S>,
}

impl<B, S> Matcher<B, S>
where
    B: TxBuilder,
    S: Submitter,
{
    pub fn new(router: Arc<SmartOrderRouter>, config: MatcherConfig, tx_builder: Arc<B>, submitter: Arc<S>) -> Self {
        let enabled = AtomicBool::new(config.enabled);
        Self {
            router,
            config,
            enabled,
            tx_builder,
            submitter,
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Runs one match attempt for a taker that was just observed in the
    /// mempool (spec §4.6 "Protocol"). `maker_lookup` resolves a maker's
    /// current `OrderState` plus its UTxO's lovelace quantity, since the
    /// router's `Route` only carries order ids, not full state.
    pub async fn attempt_match(
        &self,
        taker: &OrderState,
        now: i64,
        maker_lookup: impl Fn(&str) -> Option<(OrderState, u64)>,
    ) -> MatchOutcome {
        let started = Instant::now();
        let outcome = self.attempt_match_inner(taker, now, maker_lookup).await;
        crate::metrics::record_match_attempt(outcome.as_str(), started.elapsed().as_secs_f64());
        outcome
    }

    async fn attempt_match_inner(
        &self,
        taker: &OrderState,
        now: i64,
        maker_lookup: impl Fn(&str) -> Option<(OrderState, u64)>,
    ) -> MatchOutcome {
        if !self.is_enabled() {
            debug!(order_id = %taker.order_id, "matcher disabled, skipping attempt");
            return MatchOutcome::NoRoute;
        }

        let route = match self.router.find_route(
            &taker.offered_asset,
            &taker.asked_asset,
            taker.offered_amount,
            self.config.default_slippage_bps,
            now,
        ) {
            Ok(route) => route,
            Err(err) => {
                debug!(order_id = %taker.order_id, error = %err, "no route for taker");
                return MatchOutcome::NoRoute;
            }
        };
        info!(order_id = %taker.order_id, legs = route.legs.len(), total_output = route.total_output, "route found");

        let mut maker_states = Vec::with_capacity(route.legs.len());
        for leg in &route.legs {
            match maker_lookup(&leg.order_id) {
                Some(ctx) => maker_states.push(ctx),
                None => {
                    warn!(order_id = %leg.order_id, "maker disappeared before plan could be built");
                    return MatchOutcome::PlanRejected;
                }
            }
        }
        let makers: Vec<MakerContext<'_>> = maker_states
            .iter()
            .map(|(state, lovelace)| MakerContext {
                state,
                utxo_lovelace: *lovelace,
            })
            .collect();

        let plan = match build_fill_plan(&route, taker, &makers, self.config.min_utxo_lovelace) {
            Ok(plan) => plan,
            Err(err) => {
                warn!(order_id = %taker.order_id, error = %err, "fill plan rejected");
                return MatchOutcome::PlanRejected;
            }
        };

        if let Err(err) = settle_taker_economics(&route, self.config.fees.taker_fee, self.config.fees.matcher_reward) {
            warn!(order_id = %taker.order_id, error = %err, "matcher economics rejected");
            return MatchOutcome::PlanRejected;
        }

        let request = build_tx_request(&plan, self.config.min_utxo_lovelace, self.config.fees.taker_fee);

        let unsigned = match self.tx_builder.build(request).await {
            Ok(tx) => tx,
            Err(err) => {
                error!(order_id = %taker.order_id, error = %err, "tx build failed");
                return MatchOutcome::BuildFailed;
            }
        };
        let signed = match self.tx_builder.sign(unsigned).await {
            Ok(tx) => tx,
            Err(err) => {
                error!(order_id = %taker.order_id, error = %err, "tx signing failed");
                return MatchOutcome::BuildFailed;
            }
        };
        let bytes = self.tx_builder.to_bytes(&signed);

        match self.submitter.submit(bytes).await {
            SubmitStatus::Accepted => {
                info!(order_id = %taker.order_id, "match submitted");
                MatchOutcome::Submitted
            }
            SubmitStatus::Rejected(reason) => {
                error!(order_id = %taker.order_id, reason, "submission rejected");
                MatchOutcome::BuildFailed
            }
        }
    }
}

/// Lowers a `FillPlan` into the builder-facing request shape. Redeemer
/// constructor tags follow spec §4.5: `PartialFill` is tag 0 with field
/// `[input_amount]`, `CompleteFill` is tag 1 with no fields.
fn build_tx_request(plan: &FillPlan, min_utxo_lovelace: u64, _taker_fee: u64) -> TxBuildRequest {
    let mut redeemers = Vec::with_capacity(plan.makers.len());
    let mut input_utxos = Vec::with_capacity(plan.makers.len());
    let mut contract_payments = Vec::new();
    let mut plain_payments = Vec::new();

    for maker in &plan.makers {
        let input = UtxoRef {
            tx_hash: maker.tx_hash.clone(),
            index: maker.tx_index,
        };
        let (constructor_tag, fields) = match maker.redeemer {
            Redeemer::PartialFill { fill_amount } => (0, vec![fill_amount]),
            Redeemer::CompleteFill => (1, vec![]),
        };
        input_utxos.push(input.clone());
        redeemers.push(PlannedRedeemer {
            input,
            constructor_tag,
            fields,
        });

        if let Some(updated) = &maker.updated_output {
            contract_payments.push(crate::external::tx_builder::ContractPayment {
                address: String::new(),
                datum_cbor: Vec::new(),
                lovelace: updated.lovelace,
                assets: vec![(updated.order.offered_asset.clone(), updated.order.offered_amount)],
            });
        }
        if let Some(payout) = &maker.payout {
            let mut assets = Vec::new();
            if let Some((asset, amount)) = &payout.token {
                assets.push((asset.clone(), *amount));
            }
            plain_payments.push(crate::external::tx_builder::PlainPayment {
                address: String::new(),
                lovelace: payout.lovelace.max(min_utxo_lovelace),
                assets,
            });
        }
    }

    TxBuildRequest {
        input_utxos,
        wallet_utxos: vec![],
        reference_inputs: vec![],
        redeemers,
        contract_payments,
        plain_payments,
        ttl: 0,
        fee: 0,
    }
}

/// `get_best_price`/`get_quote`-style read helper the operational HTTP
/// surface can expose without reaching into the router directly.
pub fn best_price(router: &SmartOrderRouter, input: &AssetId, output: &AssetId) -> Result<(f64, u64), RouterError> {
    router.get_best_price(input, output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::asset::{Rational, TradingPair};
    use crate::core::order::ContainedFee;
    use crate::external::tx_builder::{SignedTx, UnsignedTx};
    use async_trait::async_trait;

    struct StubBuilder;

    #[async_trait]
    impl TxBuilder for StubBuilder {
        async fn build(&self, _request: TxBuildRequest) -> Result<UnsignedTx, BuildError> {
            Ok(UnsignedTx(vec![1, 2, 3]))
        }
        async fn sign(&self, _unsigned: UnsignedTx) -> Result<SignedTx, BuildError> {
            Ok(SignedTx(vec![1, 2, 3, 4]))
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

    fn asset(tag: u8, name: &str) -> AssetId {
        AssetId::new(vec![tag], name.as_bytes().to_vec())
    }

    fn order_state(id: &str, offered: &AssetId, asked: &AssetId, amount: u64, price: (i64, i64)) -> OrderState {
        OrderState {
            order_id: id.to_string(),
            tx_hash: format!("tx-{id}"),
            tx_index: 0,
            slot: 100,
            offered_asset: offered.clone(),
            offered_amount: amount,
            original_amount: amount,
            asked_asset: asked.clone(),
            price: Rational::new(price.0, price.1),
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
            maker_fee: Rational::zero(),
            first_seen: 0,
            updated_at: 0,
        }
    }

    #[tokio::test]
    async fn disabled_matcher_never_routes() {
        let tkn = asset(1, "TKN");
        let native = AssetId::native();
        let router = Arc::new(SmartOrderRouter::new(false));
        router.add_order(order_state("A1", &tkn, &native, 1_000_000, (2, 1)));

        let matcher = Matcher::new(
            router,
            MatcherConfig {
                enabled: false,
                default_slippage_bps: 500,
                min_utxo_lovelace: 2_000_000,
                fees: FeeSchedule::default(),
            },
            Arc::new(StubBuilder),
            Arc::new(StubSubmitter),
        );

        let taker = order_state("taker", &native, &tkn, 2_000_000, (1, 2));
        let outcome = matcher.attempt_match(&taker, 1000, |_| None).await;
        assert_eq!(outcome, MatchOutcome::NoRoute);
    }

    #[tokio::test]
    async fn enabled_matcher_submits_a_complete_fill() {
        let tkn = asset(1, "TKN");
        let native = AssetId::native();
        let pair = TradingPair::normalize(&tkn, &native);
        assert_eq!(pair.quote, native);

        let router = Arc::new(SmartOrderRouter::new(false));
        let maker = order_state("A1", &tkn, &native, 1_000_000, (2, 1));
        router.add_order(maker.clone());

        let matcher = Matcher::new(
            router,
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
        );

        let taker = order_state("taker", &native, &tkn, 2_000_000, (1, 2));
        let maker_clone = maker.clone();
        let outcome = matcher
            .attempt_match(&taker, 1000, move |id| {
                if id == "A1" {
                    Some((maker_clone.clone(), 2_000_000))
                } else {
                    None
                }
            })
            .await;
        assert_eq!(outcome, MatchOutcome::Submitted);
    }
}
