//! Local-to-reference currency conversion.
//!
//! CRITICAL: Rounding policy for conversion:
//! - Local amounts carry 2 fractional digits, rates carry 4
//! - Division rounds half-up (midpoint away from zero) at 2 decimals
//! - The converted value is snapshotted, never re-derived from live rates

use rust_decimal::Decimal;
use rust_decimal::RoundingStrategy;

use crate::error::CoreError;

/// Fractional digits carried by monetary amounts.
pub const AMOUNT_SCALE: u32 = 2;

/// Fractional digits carried by exchange rates.
pub const RATE_SCALE: u32 = 4;

/// Converts a local-currency amount to the reference currency.
///
/// `converted = round_half_up(local_amount / rate, 2)`. The rate must be
/// positive; a zero rate would divide by zero and a negative rate has no
/// meaning here.
///
/// # Errors
///
/// Returns `CoreError::NonPositiveRate` if `rate <= 0`.
pub fn convert_to_reference(local_amount: Decimal, rate: Decimal) -> Result<Decimal, CoreError> {
    if rate <= Decimal::ZERO {
        return Err(CoreError::NonPositiveRate);
    }

    let converted = local_amount / rate;
    Ok(converted.round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointAwayFromZero))
}

/// Normalizes a monetary amount to the canonical 2-decimal scale.
#[must_use]
pub fn rescale_amount(amount: Decimal) -> Decimal {
    let mut normalized = amount;
    normalized.rescale(AMOUNT_SCALE);
    normalized
}

/// Normalizes an exchange rate to the canonical 4-decimal scale.
#[must_use]
pub fn rescale_rate(rate: Decimal) -> Decimal {
    let mut normalized = rate;
    normalized.rescale(RATE_SCALE);
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    use rstest::rstest;

    #[rstest]
    // 100.00 / 3.3333 = 30.0003... -> 30.00
    #[case(dec!(100.00), dec!(3.3333), dec!(30.00))]
    // 100.00 / 32.0000 = 3.125 exactly; half-up rounds the 5 away from
    // zero (banker's rounding would give 3.12 here)
    #[case(dec!(100.00), dec!(32.0000), dec!(3.13))]
    // exact division, no rounding involved
    #[case(dec!(100.00), dec!(4.0000), dec!(25.00))]
    // negative amounts round away from zero too
    #[case(dec!(-100.00), dec!(32.0000), dec!(-3.13))]
    fn test_convert(#[case] amount: Decimal, #[case] rate: Decimal, #[case] expected: Decimal) {
        assert_eq!(convert_to_reference(amount, rate).unwrap(), expected);
    }

    #[test]
    fn test_convert_rejects_zero_rate() {
        assert_eq!(
            convert_to_reference(dec!(100.00), Decimal::ZERO),
            Err(CoreError::NonPositiveRate)
        );
    }

    #[test]
    fn test_convert_rejects_negative_rate() {
        assert_eq!(
            convert_to_reference(dec!(100.00), dec!(-5.2500)),
            Err(CoreError::NonPositiveRate)
        );
    }

    #[test]
    fn test_rescale_amount() {
        assert_eq!(rescale_amount(dec!(5)).to_string(), "5.00");
        assert_eq!(rescale_amount(dec!(5.1)).to_string(), "5.10");
    }

    #[test]
    fn test_rescale_rate() {
        assert_eq!(rescale_rate(dec!(5.25)).to_string(), "5.2500");
    }
}
