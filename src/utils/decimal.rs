//! Decimal helpers for emitted price levels.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

/// Display precision for a price level.
///
/// Four or more significant digits are always kept: high-priced
/// instruments get fewer decimals, sub-unit prices get more.
pub fn price_decimals(price: f64) -> u32 {
    if !price.is_finite() || price <= 0.0 {
        return 4;
    }
    if price >= 1000.0 {
        2
    } else if price >= 100.0 {
        3
    } else if price >= 1.0 {
        4
    } else {
        let leading = (-price.log10()).ceil().max(1.0) as u32;
        (4 + leading).min(12)
    }
}

/// Round a decimal to a specific number of decimal places.
pub fn round_to_precision(value: Decimal, decimals: u32) -> Decimal {
    value.round_dp(decimals)
}

/// Convert an `f64` price into a `Decimal` rounded to `decimals`.
pub fn to_price(value: f64, decimals: u32) -> Option<Decimal> {
    Decimal::from_f64(value).map(|d| round_to_precision(d, decimals))
}

/// Safe division that returns zero if divisor is zero.
pub fn safe_div(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator == Decimal::ZERO {
        Decimal::ZERO
    } else {
        numerator / denominator
    }
}

/// Distance between two prices as a percentage of `reference`.
pub fn distance_pct(price: Decimal, reference: Decimal) -> f64 {
    (safe_div(price - reference, reference) * Decimal::ONE_HUNDRED)
        .abs()
        .to_f64()
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_price_decimals_by_magnitude() {
        assert_eq!(price_decimals(65_000.0), 2);
        assert_eq!(price_decimals(250.0), 3);
        assert_eq!(price_decimals(1.5), 4);
        assert_eq!(price_decimals(0.5), 5);
        assert_eq!(price_decimals(0.1), 5);
        assert_eq!(price_decimals(0.0123), 6);
        assert_eq!(price_decimals(0.00001234), 9);
    }

    #[test]
    fn test_price_decimals_invalid_price() {
        assert_eq!(price_decimals(0.0), 4);
        assert_eq!(price_decimals(f64::NAN), 4);
    }

    #[test]
    fn test_to_price_rounds() {
        assert_eq!(to_price(1.234567, 4), Some(dec!(1.2346)));
        assert_eq!(to_price(65_000.129, 2), Some(dec!(65000.13)));
        assert!(to_price(f64::NAN, 2).is_none());
    }

    #[test]
    fn test_safe_div_by_zero() {
        assert_eq!(safe_div(dec!(1), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_distance_pct() {
        assert!((distance_pct(dec!(97), dec!(100)) - 3.0).abs() < 1e-12);
    }
}
