//! Stateless technical indicators over OHLCV history.
//!
//! Every function is pure. Results are `None` when the input history is too
//! short for the indicator to be defined; callers treat `None` as "ineligible"
//! rather than substituting a neutral default.
//!
//! - `momentum`: RSI and MFI oscillators
//! - `trend`: EMA, ATR and ADX-style trend strength
//! - `volume`: VWAP, volume ratio and candle wicks
//! - `divergence`: price vs. oscillator divergence detection

mod divergence;
mod momentum;
mod trend;
mod volume;

pub use divergence::{divergence, Divergence, DIVERGENCE_LOOKBACK};
pub use momentum::{mfi, rsi, rsi_series};
pub use trend::{atr, ema, trend_strength, TrendStrength};
pub use volume::{volume_ratio, vwap, wicks, Wicks};

use serde::{Deserialize, Serialize};

/// Default lookback for RSI, MFI, ATR and trend strength.
pub const DEFAULT_PERIOD: usize = 14;

/// A single OHLCV candle. Series are always ordered oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Candle open time in milliseconds since the epoch
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// True range against the previous bar's close.
    pub fn true_range(&self, prev_close: f64) -> f64 {
        (self.high - self.low)
            .max((self.high - prev_close).abs())
            .max((self.low - prev_close).abs())
    }
}

/// Close prices of a bar series.
pub fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

/// Percentage change from `reference` to `current`.
pub fn pct_change(current: f64, reference: f64) -> Option<f64> {
    if reference == 0.0 || !reference.is_finite() || !current.is_finite() {
        return None;
    }
    Some((current / reference - 1.0) * 100.0)
}

/// Trailing `n` elements of a slice (the whole slice when shorter).
pub fn tail<T>(values: &[T], n: usize) -> &[T] {
    &values[values.len().saturating_sub(n)..]
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Bar;

    /// Flat-bodied bars following the given closes, with a fixed range and volume.
    pub fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                open_time: i as i64 * 60_000,
                open: c,
                high: c * 1.01,
                low: c * 0.99,
                close: c,
                volume: 1_000.0,
            })
            .collect()
    }
}
