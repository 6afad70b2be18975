//! Fee schedule (spec §4.7), generalized from the teacher's
//! `matching::types::FeeConfig`.

use serde::{Deserialize, Serialize};

/// Per-maker / taker / matcher fee amounts. Percent fees are expressed in
/// parts-per-million of the filled leg's output, matching the
/// `*_ppm` naming already used on `OrderState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub taker_fee: u64,
    pub matcher_reward: u64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            taker_fee: 1_000_000,
            matcher_reward: 2_000_000,
        }
    }
}

/// Per-maker fee for one filled leg: `flat_fee + min(percent * output, max)`
/// when `percent_max > 0`, else `flat_fee + percent * output` uncapped.
pub fn maker_fee(flat_fee: u64, percent_fee_ppm: u64, percent_fee_max: u64, leg_output: u64) -> u64 {
    let percent_part = ((percent_fee_ppm as u128) * (leg_output as u128) / 1_000_000) as u64;
    let percent_part = if percent_fee_max > 0 {
        percent_part.min(percent_fee_max)
    } else {
        percent_part
    };
    flat_fee + percent_part
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maker_fee_applies_flat_and_percent() {
        // 1% of 1_000_000 = 10_000, plus a flat 500.
        let fee = maker_fee(500, 10_000, 0, 1_000_000);
        assert_eq!(fee, 10_500);
    }

    #[test]
    fn maker_fee_respects_cap() {
        let fee = maker_fee(0, 500_000, 1_000, 1_000_000);
        assert_eq!(fee, 1_000);
    }

    #[test]
    fn maker_fee_zero_percent_is_flat_only() {
        let fee = maker_fee(250, 0, 0, 1_000_000);
        assert_eq!(fee, 250);
    }

    #[test]
    fn default_schedule_matches_protocol_defaults() {
        let schedule = FeeSchedule::default();
        assert_eq!(schedule.taker_fee, 1_000_000);
        assert_eq!(schedule.matcher_reward, 2_000_000);
    }
}
