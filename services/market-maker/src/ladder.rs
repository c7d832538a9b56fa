//! Spread ladder
//!
//! Evenly spaced spreads between a minimum and maximum distance from the
//! base price. Buys sit at `base × (1 - spread)`, sells at `base × (1 + spread)`.

use rust_decimal::Decimal;
use types::order::Side;

use crate::error::{MakerError, MakerResult};

/// Validated spread range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpreadLadder {
    min_spread: Decimal,
    max_spread: Decimal,
}

impl SpreadLadder {
    /// Fails with `InvalidSpreadRange` when `max < min` or a bound is negative.
    pub fn new(min_spread: Decimal, max_spread: Decimal) -> MakerResult<Self> {
        if max_spread < min_spread || min_spread < Decimal::ZERO {
            return Err(MakerError::InvalidSpreadRange {
                min: min_spread,
                max: max_spread,
            });
        }
        Ok(Self {
            min_spread,
            max_spread,
        })
    }

    pub fn min_spread(&self) -> Decimal {
        self.min_spread
    }

    pub fn max_spread(&self) -> Decimal {
        self.max_spread
    }

    /// `count` spreads from min to max inclusive, non-decreasing
    pub fn rungs(&self, count: usize) -> Vec<Decimal> {
        match count {
            0 => Vec::new(),
            1 => vec![self.min_spread],
            _ => {
                let step = (self.max_spread - self.min_spread) / Decimal::from(count - 1);
                let mut rungs: Vec<Decimal> = (0..count - 1)
                    .map(|i| self.min_spread + step * Decimal::from(i))
                    .collect();
                // pin the top rung so division residue never drifts past max
                rungs.push(self.max_spread);
                rungs
            }
        }
    }
}

/// Free-function form of [`SpreadLadder::rungs`] with range validation.
pub fn rungs(count: usize, min_spread: Decimal, max_spread: Decimal) -> MakerResult<Vec<Decimal>> {
    Ok(SpreadLadder::new(min_spread, max_spread)?.rungs(count))
}

/// Price at `spread` away from `base_price` on `side`
pub fn price_at(base_price: Decimal, spread: Decimal, side: Side) -> Decimal {
    match side {
        Side::Buy => base_price * (Decimal::ONE - spread),
        Side::Sell => base_price * (Decimal::ONE + spread),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_five_rungs() {
        let r = rungs(5, d("0.01"), d("0.05")).unwrap();
        assert_eq!(r, vec![d("0.01"), d("0.02"), d("0.03"), d("0.04"), d("0.05")]);
    }

    #[test]
    fn test_buy_prices_from_rungs() {
        let base = d("50000.00000000");
        let prices: Vec<Decimal> = rungs(5, d("0.01"), d("0.05"))
            .unwrap()
            .into_iter()
            .map(|s| price_at(base, s, Side::Buy))
            .collect();
        assert_eq!(
            prices,
            vec![d("49500"), d("49000"), d("48500"), d("48000"), d("47500")]
        );
    }

    #[test]
    fn test_sell_price() {
        assert_eq!(price_at(d("100"), d("0.02"), Side::Sell), d("102"));
    }

    #[test]
    fn test_single_rung_is_min() {
        assert_eq!(rungs(1, d("0.01"), d("0.05")).unwrap(), vec![d("0.01")]);
        assert!(rungs(0, d("0.01"), d("0.05")).unwrap().is_empty());
    }

    #[test]
    fn test_inexact_step_ends_on_max() {
        let r = rungs(15, d("0.01"), d("0.05")).unwrap();
        assert_eq!(r.len(), 15);
        assert_eq!(r[0], d("0.01"));
        assert_eq!(r[14], d("0.05"));
    }

    #[test]
    fn test_invalid_spread_range() {
        assert_eq!(
            rungs(5, d("0.05"), d("0.01")),
            Err(MakerError::InvalidSpreadRange { min: d("0.05"), max: d("0.01") })
        );
        assert!(SpreadLadder::new(d("-0.01"), d("0.01")).is_err());
    }

    #[test]
    fn test_equal_bounds_allowed() {
        let r = rungs(3, d("0.02"), d("0.02")).unwrap();
        assert_eq!(r, vec![d("0.02"); 3]);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_rungs_monotonic(
                count in 2usize..64,
                lo_bps in 0i64..5_000,
                width_bps in 0i64..5_000,
            ) {
                let lo = Decimal::new(lo_bps, 4);
                let hi = Decimal::new(lo_bps + width_bps, 4);
                let r = rungs(count, lo, hi).unwrap();
                prop_assert_eq!(r.len(), count);
                prop_assert_eq!(r[0], lo);
                prop_assert_eq!(r[count - 1], hi);
                prop_assert!(r.windows(2).all(|w| w[0] <= w[1]));
            }
        }
    }
}
