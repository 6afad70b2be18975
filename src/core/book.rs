//! Per-pair price-time-priority order book (spec §4.1).

use parking_lot::RwLock;

use super::asset::{AssetId, TradingPair};
use super::order::{OrderBookEntry, OrderState, Side};

/// Aggregated depth at one effective price level.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthLevel {
    pub effective_price: f64,
    pub total_available: u64,
}

/// The (spread, spread_pct) pair returned by `OrderBook::spread`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spread {
    pub absolute: f64,
    pub percent_of_mid: f64,
}

fn entry_key(entry: &OrderBookEntry) -> (f64, i64) {
    (entry.effective_price_f64(), entry.first_seen())
}

/// Sort discipline: bids descending by effective price then ascending by
/// `first_seen`; asks ascending by effective price then ascending by
/// `first_seen` (spec §4.1 "Sorting discipline").
fn insert_sorted(entries: &mut Vec<OrderBookEntry>, entry: OrderBookEntry, side: Side) {
    let key = entry_key(&entry);
    let pos = match side {
        Side::Ask => entries.partition_point(|e| entry_key(e) <= key),
        Side::Bid => entries.partition_point(|e| {
            let k = entry_key(e);
            k.0 > key.0 || (k.0 == key.0 && k.1 <= key.1)
        }),
    };
    entries.insert(pos, entry);
}

struct BookState {
    bids: Vec<OrderBookEntry>,
    asks: Vec<OrderBookEntry>,
}

/// One normalized trading pair's live order book.
pub struct OrderBook {
    pair: TradingPair,
    state: RwLock<BookState>,
}

impl OrderBook {
    pub fn new(pair: TradingPair) -> Self {
        Self {
            pair,
            state: RwLock::new(BookState {
                bids: Vec::new(),
                asks: Vec::new(),
            }),
        }
    }

    pub fn pair(&self) -> &TradingPair {
        &self.pair
    }

    /// Classify `order` into bid or ask by comparing its (offered, asked)
    /// assets against the pair's (base, quote); rejects orders whose
    /// assets don't match this pair at all.
    fn classify(&self, order: &OrderState) -> Option<Side> {
        if order.offered_asset == self.pair.base && order.asked_asset == self.pair.quote {
            Some(Side::Ask)
        } else if order.offered_asset == self.pair.quote && order.asked_asset == self.pair.base {
            Some(Side::Bid)
        } else {
            None
        }
    }

    /// Insert an order, classifying it into the correct side. Returns
    /// `false` if the order's assets don't belong to this pair.
    pub fn add(&self, order: OrderState) -> bool {
        let Some(side) = self.classify(&order) else {
            return false;
        };
        let entry = OrderBookEntry::new(order, side);
        let mut state = self.state.write();
        match side {
            Side::Bid => insert_sorted(&mut state.bids, entry, side),
            Side::Ask => insert_sorted(&mut state.asks, entry, side),
        }
        true
    }

    /// Remove an order by id; first match wins (spec: "at most one
    /// occurrence expected").
    pub fn remove(&self, order_id: &str) -> Option<OrderBookEntry> {
        let mut state = self.state.write();
        if let Some(pos) = state.bids.iter().position(|e| e.order_id() == order_id) {
            return Some(state.bids.remove(pos));
        }
        if let Some(pos) = state.asks.iter().position(|e| e.order_id() == order_id) {
            return Some(state.asks.remove(pos));
        }
        None
    }

    /// Remove-then-add; if `order` is inactive or exhausted, it is simply
    /// removed.
    pub fn update(&self, order: OrderState) {
        self.remove(&order.order_id);
        if order.is_active && order.offered_amount > 0 {
            self.add(order);
        }
    }

    pub fn best_bid(&self) -> Option<OrderBookEntry> {
        self.state.read().bids.first().cloned()
    }

    pub fn best_ask(&self) -> Option<OrderBookEntry> {
        self.state.read().asks.first().cloned()
    }

    /// `(best_ask - best_bid, pct_of_mid)`; `None` if either side is
    /// empty.
    pub fn spread(&self) -> Option<Spread> {
        let state = self.state.read();
        let bid = state.bids.first()?;
        let ask = state.asks.first()?;
        let bid_p = bid.effective_price_f64();
        let ask_p = ask.effective_price_f64();
        let absolute = ask_p - bid_p;
        let mid = (ask_p + bid_p) / 2.0;
        let percent_of_mid = if mid != 0.0 { absolute / mid * 100.0 } else { 0.0 };
        Some(Spread {
            absolute,
            percent_of_mid,
        })
    }

    /// Aggregate into at most `k` levels per side by effective price;
    /// bids high-to-low, asks low-to-high.
    pub fn depth(&self, k: usize) -> (Vec<DepthLevel>, Vec<DepthLevel>) {
        let state = self.state.read();
        (aggregate(&state.bids, k), aggregate(&state.asks, k))
    }

    /// All live (non-expired) entries on both sides, used by the router
    /// for direct-route walking.
    pub fn live_asks(&self, now: i64) -> Vec<OrderBookEntry> {
        self.state
            .read()
            .asks
            .iter()
            .filter(|e| e.order.is_live(now))
            .cloned()
            .collect()
    }

    pub fn live_bids(&self, now: i64) -> Vec<OrderBookEntry> {
        self.state
            .read()
            .bids
            .iter()
            .filter(|e| e.order.is_live(now))
            .cloned()
            .collect()
    }

    /// Retain only entries whose `end_time` is absent or strictly after
    /// `now`; returns the number removed (spec §4.2 expiration sweep).
    pub fn clear_expired(&self, now: i64) -> usize {
        let mut state = self.state.write();
        let before = state.bids.len() + state.asks.len();
        state.bids.retain(|e| !e.order.is_expired(now));
        state.asks.retain(|e| !e.order.is_expired(now));
        before - (state.bids.len() + state.asks.len())
    }

    pub fn order_count(&self) -> usize {
        let state = self.state.read();
        state.bids.len() + state.asks.len()
    }

    /// Every live or stale entry on both sides, used by the router to
    /// answer cross-book queries (rollback sweeps, order lookup by
    /// UTxO) without exposing the book's internal locking.
    pub fn all_entries(&self) -> Vec<OrderBookEntry> {
        let state = self.state.read();
        state.bids.iter().chain(state.asks.iter()).cloned().collect()
    }

    pub fn has_asset(&self, asset: &AssetId) -> bool {
        self.pair.base == *asset || self.pair.quote == *asset
    }

    /// Snapshot both sides, for property/round-trip tests.
    #[cfg(test)]
    fn snapshot(&self) -> (Vec<String>, Vec<String>) {
        let state = self.state.read();
        (
            state.bids.iter().map(|e| e.order_id().to_string()).collect(),
            state.asks.iter().map(|e| e.order_id().to_string()).collect(),
        )
    }
}

fn aggregate(entries: &[OrderBookEntry], k: usize) -> Vec<DepthLevel> {
    let mut levels: Vec<DepthLevel> = Vec::new();
    for entry in entries {
        let price = entry.effective_price_f64();
        if let Some(last) = levels.last_mut() {
            if (last.effective_price - price).abs() < f64::EPSILON {
                last.total_available += entry.available();
                continue;
            }
        }
        if levels.len() == k {
            break;
        }
        levels.push(DepthLevel {
            effective_price: price,
            total_available: entry.available(),
        });
    }
    levels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::asset::Rational;
    use crate::core::order::ContainedFee;

    fn pair() -> TradingPair {
        TradingPair::normalize(&AssetId::new(vec![1], b"TKN".to_vec()), &AssetId::native())
    }

    fn order(id: &str, offered: &AssetId, asked: &AssetId, price: (i64, i64), amount: u64, first_seen: i64) -> OrderState {
        OrderState {
            order_id: id.to_string(),
            tx_hash: "tx".to_string(),
            tx_index: 0,
            slot: 0,
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
            first_seen,
            updated_at: first_seen,
        }
    }

    #[test]
    fn add_classifies_by_asset_direction() {
        let p = pair();
        let book = OrderBook::new(p.clone());
        // Ask: offering base (TKN), asking quote (native)
        assert!(book.add(order("a1", &p.base, &p.quote, (2, 1), 1_000_000, 0)));
        // Bid: offering quote (native), asking base (TKN)
        assert!(book.add(order("b1", &p.quote, &p.base, (2, 1), 500_000, 1)));
        assert_eq!(book.order_count(), 2);
        assert!(book.best_ask().is_some());
        assert!(book.best_bid().is_some());
    }

    #[test]
    fn mismatched_asset_is_rejected() {
        let p = pair();
        let book = OrderBook::new(p);
        let other = AssetId::new(vec![9], b"OTHER".to_vec());
        assert!(!book.add(order("x", &other, &AssetId::native(), (1, 1), 1, 0)));
        assert_eq!(book.order_count(), 0);
    }

    #[test]
    fn asks_sorted_ascending_then_by_time() {
        let p = pair();
        let book = OrderBook::new(p.clone());
        book.add(order("a1", &p.base, &p.quote, (3, 1), 100, 5));
        book.add(order("a2", &p.base, &p.quote, (2, 1), 100, 10));
        book.add(order("a3", &p.base, &p.quote, (2, 1), 100, 1));
        let (_, asks) = book.snapshot();
        assert_eq!(asks, vec!["a3", "a2", "a1"]);
    }

    #[test]
    fn bids_sorted_descending_effective_price_then_time() {
        let p = pair();
        let book = OrderBook::new(p.clone());
        // Bid raw price 2 -> eff 1/2; bid raw price 4 -> eff 1/4 (lower, so worse bid)
        book.add(order("b1", &p.quote, &p.base, (2, 1), 100, 0));
        book.add(order("b2", &p.quote, &p.base, (10, 1), 100, 1));
        let (bids, _) = book.snapshot();
        // b2 has raw price 10 -> eff price 1/10, b1 has eff 1/2 (higher) comes first
        assert_eq!(bids, vec!["b1", "b2"]);
    }

    #[test]
    fn add_remove_round_trip() {
        let p = pair();
        let book = OrderBook::new(p.clone());
        book.add(order("a1", &p.base, &p.quote, (2, 1), 100, 0));
        let before = book.snapshot();
        book.add(order("a2", &p.base, &p.quote, (3, 1), 100, 1));
        book.remove("a2");
        let after = book.snapshot();
        assert_eq!(before, after);
    }

    #[test]
    fn update_is_idempotent() {
        let p = pair();
        let book = OrderBook::new(p.clone());
        let o = order("a1", &p.base, &p.quote, (2, 1), 100, 0);
        book.update(o.clone());
        let once = book.snapshot();
        book.update(o);
        let twice = book.snapshot();
        assert_eq!(once, twice);
        assert_eq!(book.order_count(), 1);
    }

    #[test]
    fn update_removes_inactive_or_exhausted() {
        let p = pair();
        let book = OrderBook::new(p.clone());
        let mut o = order("a1", &p.base, &p.quote, (2, 1), 100, 0);
        book.add(o.clone());
        o.offered_amount = 0;
        book.update(o);
        assert_eq!(book.order_count(), 0);
    }

    #[test]
    fn clear_expired_removes_only_expired() {
        let p = pair();
        let book = OrderBook::new(p.clone());
        let mut expired = order("e1", &p.base, &p.quote, (2, 1), 100, 0);
        expired.end_time = Some(50);
        let live = order("l1", &p.base, &p.quote, (2, 1), 100, 0);
        book.add(expired);
        book.add(live);
        let removed = book.clear_expired(100);
        assert_eq!(removed, 1);
        assert_eq!(book.order_count(), 1);
    }

    #[test]
    fn depth_aggregates_by_price_level() {
        let p = pair();
        let book = OrderBook::new(p.clone());
        book.add(order("a1", &p.base, &p.quote, (2, 1), 100, 0));
        book.add(order("a2", &p.base, &p.quote, (2, 1), 50, 1));
        book.add(order("a3", &p.base, &p.quote, (3, 1), 10, 2));
        let (_, asks) = book.depth(10);
        assert_eq!(asks.len(), 2);
        assert_eq!(asks[0].total_available, 150);
    }

    proptest::proptest! {
        /// Invariant 2 (spec §8): asks stay sorted ascending by effective
        /// price then ascending by `first_seen` no matter the insertion
        /// order or price/time values drawn.
        #[test]
        fn asks_stay_sorted_for_arbitrary_inserts(
            prices in proptest::collection::vec(1i64..100, 1..12),
            first_seens in proptest::collection::vec(0i64..1000, 1..12),
        ) {
            let p = pair();
            let book = OrderBook::new(p.clone());
            let n = prices.len().min(first_seens.len());
            for i in 0..n {
                book.add(order(&format!("a{i}"), &p.base, &p.quote, (prices[i], 1), 100, first_seens[i]));
            }
            let (_, asks) = book.depth(usize::MAX);
            for w in asks.windows(2) {
                prop_assert!(w[0].effective_price <= w[1].effective_price);
            }
        }
    }
}
