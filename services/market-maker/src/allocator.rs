//! Balance allocator
//!
//! Splits an account balance into a ladder of equal order quantities that
//! respect the minimum and maximum order value. The sum of the returned
//! quantities never exceeds the balance. Randomness is the caller's job:
//! jittered quantities must go back through [`BalanceAllocator::clamp`].

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use types::numeric::round_down;

use crate::error::{MakerError, MakerResult};

/// Computes per-order quantities at a fixed token precision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceAllocator {
    precision: u32,
}

impl BalanceAllocator {
    /// Allocator for a token with `precision` fractional digits
    pub fn new(precision: u32) -> Self {
        Self { precision }
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    /// Order bounds snapped to the token grid: min rounds up, max rounds down.
    pub fn bounds(&self, min_order: Decimal, max_order: Decimal) -> MakerResult<(Decimal, Decimal)> {
        if min_order <= Decimal::ZERO {
            return Err(MakerError::Config(format!(
                "min order value must be positive, got {min_order}"
            )));
        }
        let mut min = min_order.round_dp_with_strategy(self.precision, RoundingStrategy::AwayFromZero);
        min.rescale(self.precision);
        let max = round_down(max_order, self.precision);
        if max < min {
            return Err(MakerError::Config(format!(
                "order bounds [{min_order}, {max_order}] are empty at {} decimals",
                self.precision
            )));
        }
        Ok((min, max))
    }

    /// Split `total_balance` into at most `requested_count` equal orders.
    ///
    /// Fails with `InsufficientBalance` when not even one minimum order fits.
    pub fn allocate(
        &self,
        total_balance: Decimal,
        min_order: Decimal,
        max_order: Decimal,
        requested_count: usize,
    ) -> MakerResult<Vec<Decimal>> {
        let (min, max) = self.bounds(min_order, max_order)?;
        let max_possible = if total_balance > Decimal::ZERO {
            (total_balance / min).floor().to_usize().unwrap_or(usize::MAX)
        } else {
            0
        };
        let count = requested_count.min(max_possible);
        if count == 0 {
            return Err(MakerError::InsufficientBalance {
                balance: total_balance,
                min_order: min,
            });
        }

        let share = round_down(total_balance / Decimal::from(count), self.precision);
        let per_order = share.clamp(min, max);
        Ok(vec![per_order; count])
    }

    /// Re-clamp a (possibly jittered) quantity into `[min_order, max_order]`
    /// on the token grid.
    pub fn clamp(&self, quantity: Decimal, min_order: Decimal, max_order: Decimal) -> MakerResult<Decimal> {
        let (min, max) = self.bounds(min_order, max_order)?;
        Ok(round_down(quantity, self.precision).clamp(min, max))
    }
}
