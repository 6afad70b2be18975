//! Value types: asset identity, exact rational price, and normalized
//! trading pairs (spec §3).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A policy-id + asset-name pair identifying a native asset. The native
/// coin (lovelace) is represented as both fields empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetId {
    pub policy_id: Vec<u8>,
    pub name: Vec<u8>,
}

impl AssetId {
    /// Canonical native-coin asset id.
    pub fn native() -> Self {
        Self {
            policy_id: Vec::new(),
            name: Vec::new(),
        }
    }

    pub fn is_native(&self) -> bool {
        self.policy_id.is_empty() && self.name.is_empty()
    }

    pub fn new(policy_id: impl Into<Vec<u8>>, name: impl Into<Vec<u8>>) -> Self {
        Self {
            policy_id: policy_id.into(),
            name: name.into(),
        }
    }

    /// Stable fingerprint: `hex(policy)` ‖ `hex(name)`, with a sentinel
    /// for native coin. Gives a total order usable as a map key.
    pub fn fingerprint(&self) -> String {
        if self.is_native() {
            "lovelace".to_string()
        } else {
            format!("{}{}", hex::encode(&self.policy_id), hex::encode(&self.name))
        }
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fingerprint())
    }
}

impl PartialOrd for AssetId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AssetId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.fingerprint().cmp(&other.fingerprint())
    }
}

/// An exact rational number, numerator over a strictly-positive
/// denominator. Used for price storage so matching never accumulates
/// floating-point error; `as_f64` is provided only for ordering/display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rational {
    pub numerator: i64,
    pub denominator: i64,
}

impl Rational {
    /// Construct a rational, panicking if `denominator <= 0` — the
    /// invariant is enforced at every construction site in this crate,
    /// never downstream.
    pub fn new(numerator: i64, denominator: i64) -> Self {
        assert!(denominator > 0, "Rational denominator must be > 0");
        Self {
            numerator,
            denominator,
        }
    }

    pub fn zero() -> Self {
        Self {
            numerator: 0,
            denominator: 1,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.numerator == 0
    }

    pub fn as_f64(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }

    /// Multiplicative inverse. Callers must not invoke this on a zero
    /// rational; `OrderBookEntry` handles the zero-price case explicitly
    /// before ever computing an inverse.
    pub fn inverse(&self) -> Self {
        if self.numerator >= 0 {
            Self::new(self.denominator, self.numerator)
        } else {
            Self::new(-self.denominator, -self.numerator)
        }
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// A normalized (base, quote) trading pair. Native coin is always the
/// quote side; if neither side is native, the lexicographically smaller
/// fingerprint is base.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TradingPair {
    pub base: AssetId,
    pub quote: AssetId,
}

impl TradingPair {
    /// Build the normalized pair for two assets, regardless of the order
    /// they're supplied in. `normalize` is idempotent:
    /// `normalize(normalize(p)) == normalize(p)`.
    pub fn normalize(a: &AssetId, b: &AssetId) -> Self {
        if a.is_native() {
            Self {
                base: b.clone(),
                quote: a.clone(),
            }
        } else if b.is_native() {
            Self {
                base: a.clone(),
                quote: b.clone(),
            }
        } else if a.fingerprint() <= b.fingerprint() {
            Self {
                base: a.clone(),
                quote: b.clone(),
            }
        } else {
            Self {
                base: b.clone(),
                quote: a.clone(),
            }
        }
    }

    pub fn reverse(&self) -> Self {
        Self {
            base: self.quote.clone(),
            quote: self.base.clone(),
        }
    }

    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base.fingerprint(), self.quote.fingerprint())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(n: &str) -> AssetId {
        AssetId::new(vec![0xAB], n.as_bytes().to_vec())
    }

    #[test]
    fn native_is_always_quote() {
        let tkn = token("TKN");
        let native = AssetId::native();
        let p1 = TradingPair::normalize(&tkn, &native);
        let p2 = TradingPair::normalize(&native, &tkn);
        assert_eq!(p1.quote, native);
        assert_eq!(p2.quote, native);
        assert_eq!(p1.base, tkn);
        assert_eq!(p2.base, tkn);
    }

    #[test]
    fn normalize_is_idempotent() {
        let a = token("AAA");
        let b = token("BBB");
        let p = TradingPair::normalize(&a, &b);
        let pp = TradingPair::normalize(&p.base, &p.quote);
        assert_eq!(p, pp);
    }

    #[test]
    fn non_native_pair_orders_by_fingerprint() {
        let a = token("AAA");
        let b = token("ZZZ");
        let p1 = TradingPair::normalize(&a, &b);
        let p2 = TradingPair::normalize(&b, &a);
        assert_eq!(p1, p2);
        assert!(p1.base.fingerprint() <= p1.quote.fingerprint());
    }

    #[test]
    fn rational_inverse_round_trips() {
        let r = Rational::new(2, 5);
        let inv = r.inverse();
        assert_eq!(inv.numerator, 5);
        assert_eq!(inv.denominator, 2);
    }

    #[test]
    #[should_panic]
    fn rational_rejects_non_positive_denominator() {
        let _ = Rational::new(1, 0);
    }

    proptest::proptest! {
        /// Invariant 1 (spec §8): normalize is idempotent for any pair of
        /// policy/name byte strings, native or not.
        #[test]
        fn normalize_is_idempotent_for_arbitrary_assets(
            policy_a in proptest::collection::vec(proptest::num::u8::ANY, 0..28),
            name_a in proptest::collection::vec(proptest::num::u8::ANY, 0..32),
            policy_b in proptest::collection::vec(proptest::num::u8::ANY, 0..28),
            name_b in proptest::collection::vec(proptest::num::u8::ANY, 0..32),
        ) {
            let a = AssetId::new(policy_a, name_a);
            let b = AssetId::new(policy_b, name_b);
            let p = TradingPair::normalize(&a, &b);
            let pp = TradingPair::normalize(&p.base, &p.quote);
            prop_assert_eq!(&p, &pp);
            if a.is_native() || b.is_native() {
                prop_assert!(p.quote.is_native());
            }
        }
    }
}
