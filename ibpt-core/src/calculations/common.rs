//! Rounding for presented amounts.

use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds to whole centavos, midpoints away from zero.
///
/// Only used when amounts are shown; running totals keep full precision.
///
/// ```
/// use rust_decimal_macros::dec;
/// use ibpt_core::calculations::round_half_up;
///
/// assert_eq!(round_half_up(dec!(0.651)), dec!(0.65));
/// assert_eq!(round_half_up(dec!(1.48955)), dec!(1.49));
/// assert_eq!(round_half_up(dec!(0.005)), dec!(0.01));
/// ```
pub fn round_half_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
