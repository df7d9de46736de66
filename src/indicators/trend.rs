//! Trend indicators: EMA, ATR and ADX-style trend strength.

use super::Bar;

/// Exponential moving average of `values`, seeded with the simple average of
/// the first `period` samples. Returns the latest value.
pub fn ema(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;
    Some(
        values[period..]
            .iter()
            .fold(seed, |prev, &v| alpha * v + (1.0 - alpha) * prev),
    )
}

/// Average true range over the trailing `period` bars.
pub fn atr(bars: &[Bar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < period + 1 {
        return None;
    }
    let start = bars.len() - period;
    let sum: f64 = (start..bars.len())
        .map(|i| bars[i].true_range(bars[i - 1].close))
        .sum();
    Some(sum / period as f64)
}

/// Trend strength of a bar series.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrendStrength {
    /// Average directional index, 0-100
    pub adx: f64,
    /// Fractional close-to-close change over the last 10 bars
    pub slope: f64,
}

const SLOPE_LOOKBACK: usize = 10;

/// Wilder ADX plus a short-horizon slope.
///
/// Returns the zero value when fewer than `2 * period` bars are available.
pub fn trend_strength(bars: &[Bar], period: usize) -> TrendStrength {
    if period == 0 || bars.len() < 2 * period || bars.len() < SLOPE_LOOKBACK {
        return TrendStrength::default();
    }

    let last = bars[bars.len() - 1].close;
    let anchor = bars[bars.len() - SLOPE_LOOKBACK].close;
    let slope = if anchor != 0.0 {
        (last - anchor) / anchor
    } else {
        0.0
    };

    let n = bars.len() - 1;
    let mut tr = Vec::with_capacity(n);
    let mut plus_dm = Vec::with_capacity(n);
    let mut minus_dm = Vec::with_capacity(n);
    for i in 1..bars.len() {
        let (cur, prev) = (&bars[i], &bars[i - 1]);
        let up = cur.high - prev.high;
        let down = prev.low - cur.low;
        tr.push(cur.true_range(prev.close));
        plus_dm.push(if up > down && up > 0.0 { up } else { 0.0 });
        minus_dm.push(if down > up && down > 0.0 { down } else { 0.0 });
    }

    let s_tr = wilder_sum(&tr, period);
    let s_plus = wilder_sum(&plus_dm, period);
    let s_minus = wilder_sum(&minus_dm, period);

    let dx: Vec<f64> = s_tr
        .iter()
        .zip(s_plus.iter().zip(s_minus.iter()))
        .map(|(&t, (&p, &m))| {
            if t == 0.0 {
                return 0.0;
            }
            let di_plus = 100.0 * p / t;
            let di_minus = 100.0 * m / t;
            let sum = di_plus + di_minus;
            let denom = if sum == 0.0 { 1.0 } else { sum };
            100.0 * (di_plus - di_minus).abs() / denom
        })
        .collect();

    let adx = if dx.len() < period {
        dx.iter().sum::<f64>() / dx.len().max(1) as f64
    } else {
        let p = period as f64;
        let seed = dx[..period].iter().sum::<f64>() / p;
        dx[period..]
            .iter()
            .fold(seed, |prev, &v| (prev * (p - 1.0) + v) / p)
    };

    TrendStrength { adx, slope }
}

/// Wilder running sum: seeded with the sum of the first `period` values.
fn wilder_sum(values: &[f64], period: usize) -> Vec<f64> {
    if values.len() < period {
        return Vec::new();
    }
    let p = period as f64;
    let mut out = Vec::with_capacity(values.len() - period + 1);
    let mut acc: f64 = values[..period].iter().sum();
    out.push(acc);
    for &v in &values[period..] {
        acc = acc - acc / p + v;
        out.push(acc);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::test_support::bars_from_closes;

    #[test]
    fn test_ema_undefined_below_period() {
        assert!(ema(&[1.0, 2.0], 3).is_none());
    }

    #[test]
    fn test_ema_of_constant_series() {
        assert_eq!(ema(&[5.0; 30], 10), Some(5.0));
    }

    #[test]
    fn test_ema_tracks_rising_series_below_last_value() {
        let values: Vec<f64> = (1..=50).map(|i| i as f64).collect();
        let value = ema(&values, 10).unwrap();
        assert!(value < 50.0 && value > 40.0);
    }

    #[test]
    fn test_atr_undefined_below_minimum_history() {
        let bars = bars_from_closes(&[100.0; 14]);
        assert!(atr(&bars, 14).is_none());
    }

    #[test]
    fn test_atr_of_fixed_range_bars() {
        // Each bar spans 1% either side of a flat close: range = 2.0
        let bars = bars_from_closes(&[100.0; 20]);
        let value = atr(&bars, 14).unwrap();
        assert!((value - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_trend_strength_zero_below_two_periods() {
        let bars = bars_from_closes(&[100.0; 27]);
        assert_eq!(trend_strength(&bars, 14), TrendStrength::default());
    }

    #[test]
    fn test_trend_strength_strong_uptrend() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 * 1.01f64.powi(i)).collect();
        let strength = trend_strength(&bars_from_closes(&closes), 14);
        assert!(strength.adx > 25.0, "adx = {}", strength.adx);
        assert!(strength.slope > 0.0);
    }

    #[test]
    fn test_trend_strength_strong_downtrend() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 * 0.99f64.powi(i)).collect();
        let strength = trend_strength(&bars_from_closes(&closes), 14);
        assert!(strength.adx > 25.0);
        assert!(strength.slope < 0.0);
    }
}
