//! Price vs. oscillator divergence.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum number of aligned samples required to look for a divergence.
pub const DIVERGENCE_LOOKBACK: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Divergence {
    /// Price prints a new low while the oscillator holds above its earlier low
    Bullish,
    /// Price prints a new high while the oscillator stays below its earlier high
    Bearish,
    None,
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Divergence::Bullish => write!(f, "BULLISH"),
            Divergence::Bearish => write!(f, "BEARISH"),
            Divergence::None => write!(f, "NONE"),
        }
    }
}

/// Compare the latest (price, indicator) pair against the extremes of the
/// first `reference_len` samples of the trailing `DIVERGENCE_LOOKBACK` window.
///
/// Any undefined indicator sample in the window yields `Divergence::None`.
pub fn divergence(prices: &[f64], values: &[Option<f64>], reference_len: usize) -> Divergence {
    if prices.len() < DIVERGENCE_LOOKBACK
        || values.len() < DIVERGENCE_LOOKBACK
        || reference_len == 0
        || reference_len >= DIVERGENCE_LOOKBACK
    {
        return Divergence::None;
    }

    let prices = &prices[prices.len() - DIVERGENCE_LOOKBACK..];
    let values: Option<Vec<f64>> = values[values.len() - DIVERGENCE_LOOKBACK..]
        .iter()
        .copied()
        .collect();
    let Some(values) = values else {
        return Divergence::None;
    };

    let last_price = prices[DIVERGENCE_LOOKBACK - 1];
    let last_value = values[DIVERGENCE_LOOKBACK - 1];
    let reference_prices = &prices[..reference_len];
    let reference_values = &values[..reference_len];

    let min_price = reference_prices.iter().copied().fold(f64::INFINITY, f64::min);
    let max_price = reference_prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min_value = reference_values.iter().copied().fold(f64::INFINITY, f64::min);
    let max_value = reference_values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if last_price < min_price && last_value > min_value {
        Divergence::Bullish
    } else if last_price > max_price && last_value < max_value {
        Divergence::Bearish
    } else {
        Divergence::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defined(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    #[test]
    fn test_short_series_has_no_divergence() {
        let prices = vec![1.0; 29];
        assert_eq!(divergence(&prices, &defined(&prices), 20), Divergence::None);
    }

    #[test]
    fn test_bullish_divergence() {
        // Price drifts lower to a new low, oscillator recovers
        let prices: Vec<f64> = (0..30).map(|i| 100.0 - i as f64).collect();
        let values: Vec<f64> = (0..30).map(|i| if i < 20 { 30.0 - i as f64 * 0.5 } else { 40.0 }).collect();
        assert_eq!(divergence(&prices, &defined(&values), 20), Divergence::Bullish);
    }

    #[test]
    fn test_bearish_divergence() {
        let prices: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let values: Vec<f64> = (0..30).map(|i| if i < 15 { 70.0 } else { 55.0 }).collect();
        assert_eq!(divergence(&prices, &defined(&values), 15), Divergence::Bearish);
    }

    #[test]
    fn test_co_moving_series_have_no_divergence() {
        let rising: Vec<f64> = (0..40).map(|i| 10.0 + i as f64).collect();
        assert_eq!(divergence(&rising, &defined(&rising), 20), Divergence::None);

        let falling: Vec<f64> = (0..40).map(|i| 100.0 - i as f64).collect();
        assert_eq!(divergence(&falling, &defined(&falling), 15), Divergence::None);
    }

    #[test]
    fn test_undefined_indicator_sample_yields_none() {
        let prices: Vec<f64> = (0..30).map(|i| 100.0 - i as f64).collect();
        let mut values = defined(&[40.0; 30]);
        values[3] = None;
        assert_eq!(divergence(&prices, &values, 20), Divergence::None);
    }
}
