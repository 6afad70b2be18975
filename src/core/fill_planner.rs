//! Translates a chosen `Route` into per-order fill outputs, redeemers, and
//! updated datums (spec §4.5).

use crate::error::FillError;

use super::asset::AssetId;
use super::order::OrderState;
use super::router::Route;

/// `(order_id, is_complete, input_amount, output_amount)` for one
/// participant in a trade (spec §3 "FillOutput").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillOutput {
    pub order_id: String,
    pub is_complete: bool,
    pub input_amount: u64,
    pub output_amount: u64,
}

/// The protocol-defined redeemer attached to a consumed script input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redeemer {
    /// Constructor tag 0, field `[input_amount]`.
    PartialFill { fill_amount: u64 },
    /// Constructor tag 1, no fields.
    CompleteFill,
}

/// The new datum for a partially-filled order's continuing output, plus
/// the value it must carry.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatedOutput {
    pub order: OrderState,
    pub lovelace: u64,
}

/// A direction-dependent payment to a completely-filled order's owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payout {
    pub lovelace: u64,
    pub token: Option<(AssetId, u64)>,
}

/// Everything the tx-builder needs for one maker leg.
#[derive(Debug, Clone, PartialEq)]
pub struct MakerFillResult {
    pub fill: FillOutput,
    /// The maker's own UTxO being consumed, carried from its `OrderState`
    /// so the builder can key the redeemer to the input it actually spends.
    pub tx_hash: String,
    pub tx_index: u32,
    pub redeemer: Redeemer,
    /// `Some` for a partial fill, `None` for a complete one.
    pub updated_output: Option<UpdatedOutput>,
    /// `Some` for a complete fill, `None` for a partial one.
    pub payout: Option<Payout>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FillPlan {
    pub taker: FillOutput,
    pub makers: Vec<MakerFillResult>,
}

/// Builds the continuing output for a partially-filled maker order
/// (spec §4.5 "Updated-datum construction" and "Value preservation").
pub fn build_partial_fill_output(
    original: &OrderState,
    leg_output: u64,
    original_lovelace: u64,
    min_utxo_lovelace: u64,
) -> Result<UpdatedOutput, FillError> {
    if leg_output > original.offered_amount {
        return Err(FillError::FillExceedsOffered {
            fill: leg_output,
            offered: original.offered_amount,
        });
    }
    let new_offered = original
        .offered_amount
        .checked_sub(leg_output)
        .ok_or(FillError::UnderflowOnPartial {
            offered: original.offered_amount,
            input: leg_output,
        })?;

    let mut updated = original.clone();
    updated.offered_amount = new_offered;
    updated.partial_fills += 1;

    Ok(UpdatedOutput {
        order: updated,
        lovelace: original_lovelace.max(min_utxo_lovelace),
    })
}

/// Builds the owner payout for a completely-filled maker order (spec
/// §4.5 "Complete-fill payout").
pub fn build_payout(maker: &OrderState, fill_input_amount: u64, min_utxo_lovelace: u64) -> Payout {
    if maker.asked_asset.is_native() {
        Payout {
            lovelace: fill_input_amount,
            token: None,
        }
    } else {
        Payout {
            lovelace: min_utxo_lovelace,
            token: Some((maker.asked_asset.clone(), fill_input_amount)),
        }
    }
}

/// One maker order's current on-chain state plus the lovelace quantity
/// carried by its UTxO (needed to preserve it on a partial fill).
pub struct MakerContext<'a> {
    pub state: &'a OrderState,
    pub utxo_lovelace: u64,
}

/// Builds the full fill plan for a route: the taker's own `FillOutput`
/// first, then one `MakerFillResult` per leg, in route order (spec
/// §4.5).
///
/// `makers` must align 1:1 with `route.legs` (same order, same count);
/// the caller (the matcher) is responsible for fetching each leg's
/// current `OrderState` from the router before calling this.
pub fn build_fill_plan(
    route: &Route,
    taker: &OrderState,
    makers: &[MakerContext<'_>],
    min_utxo_lovelace: u64,
) -> Result<FillPlan, FillError> {
    let taker_fill = FillOutput {
        order_id: taker.order_id.clone(),
        is_complete: route.total_input >= taker.offered_amount,
        input_amount: route.total_input,
        output_amount: route.total_output,
    };

    let mut results = Vec::with_capacity(route.legs.len());
    for (leg, ctx) in route.legs.iter().zip(makers.iter()) {
        let is_complete = leg.output_amount >= ctx.state.offered_amount;
        let fill = FillOutput {
            order_id: ctx.state.order_id.clone(),
            is_complete,
            input_amount: leg.output_amount,
            output_amount: leg.input_amount,
        };

        if is_complete {
            let payout = build_payout(ctx.state, leg.input_amount, min_utxo_lovelace);
            results.push(MakerFillResult {
                redeemer: Redeemer::CompleteFill,
                fill,
                tx_hash: ctx.state.tx_hash.clone(),
                tx_index: ctx.state.tx_index,
                updated_output: None,
                payout: Some(payout),
            });
        } else {
            let updated = build_partial_fill_output(ctx.state, leg.output_amount, ctx.utxo_lovelace, min_utxo_lovelace)?;
            results.push(MakerFillResult {
                redeemer: Redeemer::PartialFill {
                    fill_amount: fill.input_amount,
                },
                fill,
                tx_hash: ctx.state.tx_hash.clone(),
                tx_index: ctx.state.tx_index,
                updated_output: Some(updated),
                payout: None,
            });
        }
    }

    Ok(FillPlan {
        taker: taker_fill,
        makers: results,
    })
}

/// Validates the matcher's own economics before it asks the tx-builder to
/// assemble a transaction: the reward must be nonzero, and reward plus
/// taker fee must not consume more than the taker actually provided.
pub fn settle_taker_economics(route: &Route, taker_fee: u64, matcher_reward: u64) -> Result<(u64, u64), FillError> {
    if matcher_reward == 0 {
        return Err(FillError::ZeroRewardAsset);
    }
    let total_deduction = taker_fee.saturating_add(matcher_reward);
    if total_deduction >= route.total_input {
        return Err(FillError::MatcherFeeWouldExceedInput);
    }
    Ok((taker_fee, matcher_reward))
}
