//! Momentum oscillators: RSI and money flow index.

use super::Bar;

/// Relative Strength Index with Wilder smoothing.
///
/// Needs at least `period + 1` closes. Output is in `[0, 100]`.
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    rsi_series(closes, period).last().copied().flatten()
}

/// RSI value at every bar of `closes`, `None` during the warm-up window.
///
/// `rsi_series(c, p)[i]` equals `rsi(&c[..=i], p)`.
pub fn rsi_series(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() < period + 1 {
        return out;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=period {
        let change = closes[i] - closes[i - 1];
        if change > 0.0 {
            avg_gain += change;
        } else {
            avg_loss -= change;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;
    out[period] = Some(rsi_from_averages(avg_gain, avg_loss));

    let p = period as f64;
    for i in (period + 1)..closes.len() {
        let change = closes[i] - closes[i - 1];
        let (gain, loss) = if change > 0.0 {
            (change, 0.0)
        } else {
            (0.0, -change)
        };
        avg_gain = (avg_gain * (p - 1.0) + gain) / p;
        avg_loss = (avg_loss * (p - 1.0) + loss) / p;
        out[i] = Some(rsi_from_averages(avg_gain, avg_loss));
    }

    out
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return if avg_gain == 0.0 { 50.0 } else { 100.0 };
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

/// Money Flow Index over the trailing `period` typical-price changes.
///
/// Needs at least `period + 1` bars. Output is in `[0, 100]`.
pub fn mfi(bars: &[Bar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < period + 1 {
        return None;
    }

    let start = bars.len() - period;
    let (mut positive, mut negative) = (0.0, 0.0);
    for i in start..bars.len() {
        let tp = bars[i].typical_price();
        let prev_tp = bars[i - 1].typical_price();
        let flow = tp * bars[i].volume;
        if tp > prev_tp {
            positive += flow;
        } else if tp < prev_tp {
            negative += flow;
        }
    }

    if negative == 0.0 {
        return Some(if positive == 0.0 { 50.0 } else { 100.0 });
    }
    let ratio = positive / negative;
    Some(100.0 - 100.0 / (1.0 + ratio))
}
