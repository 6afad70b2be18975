//! `SmartOrderRouter`: per-pair order books plus direct and two-hop route
//! search under a slippage bound (spec §4.2).

use dashmap::DashMap;

use crate::error::RouterError;

use super::asset::{AssetId, TradingPair};
use super::book::OrderBook;
use super::order::OrderState;

/// A single order fill within a route.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteLeg {
    pub order_id: String,
    pub tx_hash: String,
    pub tx_index: u32,
    pub input_amount: u64,
    pub output_amount: u64,
    pub price: f64,
}

/// An ordered conversion of `input_asset` into `output_asset`, possibly
/// via an intermediate asset.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub input_asset: AssetId,
    pub output_asset: AssetId,
    pub legs: Vec<RouteLeg>,
    pub total_input: u64,
    pub total_output: u64,
    pub avg_price: f64,
    pub price_impact: f64,
    pub estimated_fee: u64,
    pub is_multi_hop: bool,
    pub intermediate_asset: Option<AssetId>,
}

/// Minimum fraction of the requested input a direct route must fill
/// before two-hop search is skipped.
const DIRECT_FILL_THRESHOLD: f64 = 0.8;
const BASE_FEE: u64 = 200_000;
const PER_LEG_FEE: u64 = 50_000;

/// Set of per-pair order books, keyed by normalized-pair string, plus a
/// global order-id index so `remove_order` doesn't need to know which
/// pair an order belongs to.
pub struct SmartOrderRouter {
    books: DashMap<String, OrderBook>,
    index: DashMap<String, TradingPair>,
    pub multi_hop_enabled: bool,
}

impl SmartOrderRouter {
    pub fn new(multi_hop_enabled: bool) -> Self {
        Self {
            books: DashMap::new(),
            index: DashMap::new(),
            multi_hop_enabled,
        }
    }

    fn book_for(&self, pair: &TradingPair) -> dashmap::mapref::one::Ref<'_, String, OrderBook> {
        if !self.books.contains_key(&pair.key()) {
            self.books.entry(pair.key()).or_insert_with(|| OrderBook::new(pair.clone()));
        }
        self.books.get(&pair.key()).expect("just inserted")
    }

    /// Insert or refresh an order; the pair is derived from the order's
    /// own offered/asked assets, not supplied by the caller.
    pub fn add_order(&self, order: OrderState) {
        self.update_order(order);
    }

    /// Remove-then-add (spec §4.2): a globally unique `order_id` lets this
    /// be correct even if the order moved between pairs.
    pub fn update_order(&self, order: OrderState) {
        let pair = TradingPair::normalize(&order.offered_asset, &order.asked_asset);
        let order_id = order.order_id.clone();

        if let Some(prior) = self.index.get(&order_id) {
            if *prior != pair {
                if let Some(prior_book) = self.books.get(&prior.key()) {
                    prior_book.remove(&order_id);
                }
            }
        }

        let book = self.book_for(&pair);
        book.update(order);
        self.index.insert(order_id, pair);
    }

    pub fn remove_order(&self, order_id: &str) {
        if let Some((_, pair)) = self.index.remove(order_id) {
            if let Some(book) = self.books.get(&pair.key()) {
                book.remove(order_id);
            }
        }
    }

    pub fn book(&self, pair: &TradingPair) -> Option<dashmap::mapref::one::Ref<'_, String, OrderBook>> {
        self.books.get(&pair.key())
    }

    pub fn pair_count(&self) -> usize {
        self.books.len()
    }

    /// Summed live order count across all books. Derived from the books
    /// themselves, not the id index, so it stays accurate after
    /// `clear_expired` prunes entries the index doesn't track per-book.
    pub fn order_count(&self) -> usize {
        self.books.iter().map(|b| b.order_count()).sum()
    }

    /// Every order across every book, for cross-book queries (rollback
    /// sweeps, order lookup by UTxO) that have no single pair to scope
    /// to.
    pub fn all_orders(&self) -> Vec<OrderState> {
        self.books
            .iter()
            .flat_map(|b| b.all_entries())
            .map(|entry| entry.order)
            .collect()
    }

    /// `router.clear_expired(now)` (spec §4.2, §5): single pass over every
    /// book.
    pub fn clear_expired(&self, now: i64) -> usize {
        let mut removed = 0;
        for book in self.books.iter() {
            removed += book.clear_expired(now);
        }
        removed
    }

    /// Direct-route search (spec §4.2 "Direct route algorithm").
    fn direct_route(
        &self,
        input: &AssetId,
        output: &AssetId,
        in_amount: u64,
        max_slippage_bps: u32,
        now: i64,
    ) -> Result<Route, RouterError> {
        let pair = TradingPair::normalize(input, output);
        let book = self
            .books
            .get(&pair.key())
            .ok_or_else(|| RouterError::NoOrderBook(pair.key()))?;
        let buying_base = *output == pair.base;
        let entries = if buying_base {
            book.live_asks(now)
        } else {
            book.live_bids(now)
        };
        if entries.is_empty() {
            return Err(RouterError::NoOrders(pair.key()));
        }

        let best = entries[0].effective_price_f64();
        let mut legs = Vec::new();
        let mut remaining = in_amount;
        let mut total_output: u64 = 0;
        let mut worst_price = best;

        for entry in &entries {
            if remaining == 0 {
                break;
            }
            let eff = entry.effective_price_f64();
            if best != 0.0 {
                let deviation_bps = (eff - best).abs() / best * 10_000.0;
                if deviation_bps > max_slippage_bps as f64 {
                    break;
                }
            }

            let (leg_input, leg_output) = if buying_base {
                let cap = (entry.available() as f64 * eff).floor() as u64;
                let li = remaining.min(cap);
                let lo = if eff > 0.0 {
                    (li as f64 / eff).floor() as u64
                } else {
                    0
                };
                (li, lo)
            } else {
                let li = remaining.min(entry.available());
                let lo = (li as f64 * eff).floor() as u64;
                (li, lo)
            };

            if leg_output == 0 {
                continue;
            }

            legs.push(RouteLeg {
                order_id: entry.order_id().to_string(),
                tx_hash: entry.order.tx_hash.clone(),
                tx_index: entry.order.tx_index,
                input_amount: leg_input,
                output_amount: leg_output,
                price: eff,
            });
            remaining -= leg_input;
            total_output += leg_output;
            worst_price = eff;
        }

        if legs.is_empty() {
            return Err(RouterError::SlippageExceeded(max_slippage_bps));
        }

        let total_input = in_amount - remaining;
        let avg_price = total_output as f64 / total_input as f64;
        let price_impact = if best != 0.0 {
            if buying_base {
                (worst_price - best) / best * 100.0
            } else {
                (best - worst_price) / best * 100.0
            }
        } else {
            0.0
        };
        let estimated_fee = BASE_FEE + legs.len() as u64 * PER_LEG_FEE;

        Ok(Route {
            input_asset: input.clone(),
            output_asset: output.clone(),
            legs,
            total_input,
            total_output,
            avg_price,
            price_impact,
            estimated_fee,
            is_multi_hop: false,
            intermediate_asset: None,
        })
    }

    /// Candidate intermediates: distinct assets (native coin first) for
    /// which both `(input, candidate)` and `(candidate, output)` books
    /// exist (spec §4.2 "Two-hop algorithm").
    fn candidate_intermediates(&self, input: &AssetId, output: &AssetId) -> Vec<AssetId> {
        let mut seen = std::collections::HashSet::new();
        let mut candidates = Vec::new();
        for book in self.books.iter() {
            let pair = book.pair();
            for asset in [&pair.base, &pair.quote] {
                if asset == input || asset == output {
                    continue;
                }
                if seen.insert(asset.fingerprint()) {
                    candidates.push(asset.clone());
                }
            }
        }
        candidates.sort_by_key(|a| if a.is_native() { 0 } else { 1 });
        candidates
            .into_iter()
            .filter(|candidate| {
                self.books
                    .contains_key(&TradingPair::normalize(input, candidate).key())
                    && self
                        .books
                        .contains_key(&TradingPair::normalize(candidate, output).key())
            })
            .collect()
    }

    fn two_hop_route(
        &self,
        input: &AssetId,
        output: &AssetId,
        in_amount: u64,
        max_slippage_bps: u32,
        now: i64,
    ) -> Result<Route, RouterError> {
        let half = max_slippage_bps / 2;
        let candidates = self.candidate_intermediates(input, output);
        let mut best: Option<Route> = None;

        for intermediate in &candidates {
            let Ok(first) = self.direct_route(input, intermediate, in_amount, half, now) else {
                continue;
            };
            let Ok(second) = self.direct_route(intermediate, output, first.total_output, half, now) else {
                continue;
            };
            let mut legs = first.legs.clone();
            legs.extend(second.legs.clone());
            let total_input = first.total_input;
            let total_output = second.total_output;
            let route = Route {
                input_asset: input.clone(),
                output_asset: output.clone(),
                legs,
                total_input,
                total_output,
                avg_price: if total_input > 0 {
                    total_output as f64 / total_input as f64
                } else {
                    0.0
                },
                price_impact: first.price_impact + second.price_impact,
                estimated_fee: first.estimated_fee + second.estimated_fee,
                is_multi_hop: true,
                intermediate_asset: Some(intermediate.clone()),
            };
            if best.as_ref().map_or(true, |b| route.total_output > b.total_output) {
                best = Some(route);
            }
        }

        best.ok_or(RouterError::NoMultiHopRoute)
    }

    /// `find_route(in, out, in_amount, max_slippage_bps)` (spec §4.2).
    pub fn find_route(
        &self,
        input: &AssetId,
        output: &AssetId,
        in_amount: u64,
        max_slippage_bps: u32,
        now: i64,
    ) -> Result<Route, RouterError> {
        let direct = self.direct_route(input, output, in_amount, max_slippage_bps, now);

        if !self.multi_hop_enabled {
            return direct;
        }

        if let Ok(ref route) = direct {
            if route.total_input as f64 >= in_amount as f64 * DIRECT_FILL_THRESHOLD {
                return direct;
            }
        }

        let multi = self.two_hop_route(input, output, in_amount, max_slippage_bps, now);
        match (direct, multi) {
            (Ok(d), Ok(m)) => Ok(if m.total_output > d.total_output { m } else { d }),
            (Ok(d), Err(_)) => Ok(d),
            (Err(_), Ok(m)) => Ok(m),
            (Err(e), Err(_)) => Err(e),
        }
    }

    /// `get_quote(in, out, in_amount) -> (out_amount, avg_price)`, using a
    /// generous slippage bound so the quote reflects the book's full
    /// direct depth rather than a caller-chosen policy.
    pub fn get_quote(&self, input: &AssetId, output: &AssetId, in_amount: u64, now: i64) -> Result<(u64, f64), RouterError> {
        let route = self.direct_route(input, output, in_amount, u32::MAX, now)?;
        Ok((route.total_output, route.avg_price))
    }

    /// `get_best_price(in, out) -> (price, available)`.
    pub fn get_best_price(&self, input: &AssetId, output: &AssetId) -> Result<(f64, u64), RouterError> {
        let pair = TradingPair::normalize(input, output);
        let book = self
            .books
            .get(&pair.key())
            .ok_or_else(|| RouterError::NoOrderBook(pair.key()))?;
        let buying_base = *output == pair.base;
        let best = if buying_base { book.best_ask() } else { book.best_bid() };
        let entry = best.ok_or_else(|| RouterError::NoOrders(pair.key()))?;
        Ok((entry.effective_price_f64(), entry.available()))
    }
}
