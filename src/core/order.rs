//! `OrderState`: the authoritative logical record for one on-chain order
//! (spec §3), plus `OrderBookEntry`, the book's side-aware wrapper around
//! it.

use serde::{Deserialize, Serialize};

use super::asset::{AssetId, Rational};

/// Which side of a book an order sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Bid,
    Ask,
}

/// The contained-fee triple preserved verbatim from the datum so a
/// partial-fill output can be reconstructed byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainedFee {
    pub lovelace: u64,
    pub offered: u64,
    pub asked: u64,
}

/// The authoritative logical view of one on-chain order. Two
/// `OrderState`s with the same `order_id` are the same order; any update
/// strictly replaces the previous record (spec §3 Invariants).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderState {
    // Identity
    pub order_id: String,
    pub tx_hash: String,
    pub tx_index: u32,
    pub slot: u64,

    // Economics
    pub offered_asset: AssetId,
    pub offered_amount: u64,
    pub original_amount: u64,
    pub asked_asset: AssetId,
    pub price: Rational,

    // Lifecycle
    pub is_active: bool,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub partial_fills: u32,

    // Preserved datum fields needed to rebuild a partial-fill output
    // byte-for-byte.
    pub nft: Vec<u8>,
    pub owner_key: Vec<u8>,
    pub flat_fee: u64,
    pub percent_fee_ppm: u64,
    pub percent_fee_max: u64,
    pub contained_fee: ContainedFee,
    pub contained_payment: u64,
    pub maker_fee: Rational,

    // Timestamps
    pub first_seen: i64,
    pub updated_at: i64,
}

impl OrderState {
    /// `offered_amount <= original_amount` invariant check (spec §3 and
    /// §8 property 3).
    pub fn amounts_consistent(&self) -> bool {
        self.offered_amount <= self.original_amount
    }

    /// True once this order's time window has strictly closed at `now`.
    pub fn is_expired(&self, now: i64) -> bool {
        matches!(self.end_time, Some(end) if end <= now)
    }

    /// Whether this order is still live: active, non-zero remaining, and
    /// not expired.
    pub fn is_live(&self, now: i64) -> bool {
        self.is_active && self.offered_amount > 0 && !self.is_expired(now)
    }
}

/// An `OrderState` wrapped with its book side and effective per-unit-base
/// price used for sorting (spec §4.1).
#[derive(Debug, Clone)]
pub struct OrderBookEntry {
    pub order: OrderState,
    pub side: Side,
    /// `price` on the ask side, `1/price` on the bid side; zero when the
    /// order's raw price is zero (held, but never matched).
    pub effective_price: Rational,
}

impl OrderBookEntry {
    pub fn new(order: OrderState, side: Side) -> Self {
        let effective_price = match side {
            Side::Ask => order.price,
            Side::Bid => {
                if order.price.is_zero() {
                    Rational::zero()
                } else {
                    order.price.inverse()
                }
            }
        };
        Self {
            order,
            side,
            effective_price,
        }
    }

    pub fn order_id(&self) -> &str {
        &self.order.order_id
    }

    pub fn available(&self) -> u64 {
        self.order.offered_amount
    }

    pub fn first_seen(&self) -> i64 {
        self.order.first_seen
    }

    pub fn effective_price_f64(&self) -> f64 {
        self.effective_price.as_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_order(price_num: i64, price_den: i64) -> OrderState {
        OrderState {
            order_id: "splash:deadbeef".to_string(),
            tx_hash: "abc123".to_string(),
            tx_index: 0,
            slot: 100,
            offered_asset: AssetId::new(vec![1], b"TKN".to_vec()),
            offered_amount: 1_000_000,
            original_amount: 1_000_000,
            asked_asset: AssetId::native(),
            price: Rational::new(price_num, price_den),
            is_active: true,
            start_time: None,
            end_time: None,
            partial_fills: 0,
            nft: b"deadbeef".to_vec(),
            owner_key: vec![0xAA; 28],
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

    #[test]
    fn ask_effective_price_equals_raw_price() {
        let entry = OrderBookEntry::new(base_order(2, 1), Side::Ask);
        assert_eq!(entry.effective_price, Rational::new(2, 1));
    }

    #[test]
    fn bid_effective_price_is_inverse() {
        let entry = OrderBookEntry::new(base_order(2, 1), Side::Bid);
        assert_eq!(entry.effective_price, Rational::new(1, 2));
    }

    #[test]
    fn zero_price_never_wins() {
        let entry = OrderBookEntry::new(base_order(0, 1), Side::Bid);
        assert!(entry.effective_price.is_zero());
    }

    #[test]
    fn expiry_and_liveness() {
        let mut order = base_order(2, 1);
        order.end_time = Some(50);
        assert!(order.is_expired(100));
        assert!(!order.is_live(100));
        order.end_time = Some(150);
        assert!(!order.is_expired(100));
        assert!(order.is_live(100));
    }
}
