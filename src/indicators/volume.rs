//! Volume-derived features and candle shape.

use super::Bar;

/// Volume-weighted average of the typical price.
///
/// `None` for an empty window or zero total volume.
pub fn vwap(bars: &[Bar]) -> Option<f64> {
    let (pv, vol) = bars.iter().fold((0.0, 0.0), |(pv, vol), b| {
        (pv + b.typical_price() * b.volume, vol + b.volume)
    });
    if vol > 0.0 {
        Some(pv / vol)
    } else {
        None
    }
}

/// Last bar's volume relative to the mean of the `lookback` bars before it.
///
/// Returns 1.0 when the reference mean is zero.
pub fn volume_ratio(bars: &[Bar], lookback: usize) -> Option<f64> {
    if lookback == 0 || bars.len() < lookback + 1 {
        return None;
    }
    let last = bars.len() - 1;
    let avg = bars[last - lookback..last]
        .iter()
        .map(|b| b.volume)
        .sum::<f64>()
        / lookback as f64;
    if avg > 0.0 {
        Some(bars[last].volume / avg)
    } else {
        Some(1.0)
    }
}

/// Wick lengths as a percentage of the close.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize)]
pub struct Wicks {
    pub upper_pct: f64,
    pub lower_pct: f64,
}

pub fn wicks(bar: &Bar) -> Wicks {
    if bar.close == 0.0 {
        return Wicks::default();
    }
    let body_high = bar.open.max(bar.close);
    let body_low = bar.open.min(bar.close);
    Wicks {
        upper_pct: (bar.high - body_high) / bar.close * 100.0,
        lower_pct: (body_low - bar.low) / bar.close * 100.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(open: f64, high: f64, low: f64, close: f64, volume: f64) -> Bar {
        Bar {
            open_time: 0,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    #[test]
    fn test_vwap_weights_by_volume() {
        let bars = vec![bar(10.0, 10.0, 10.0, 10.0, 1.0), bar(20.0, 20.0, 20.0, 20.0, 3.0)];
        assert_eq!(vwap(&bars), Some(17.5));
    }

    #[test]
    fn test_vwap_undefined_without_volume() {
        assert!(vwap(&[]).is_none());
        assert!(vwap(&[bar(1.0, 1.0, 1.0, 1.0, 0.0)]).is_none());
    }

    #[test]
    fn test_volume_ratio_against_previous_bars() {
        let mut bars: Vec<Bar> = (0..11).map(|_| bar(1.0, 1.0, 1.0, 1.0, 100.0)).collect();
        bars[10].volume = 350.0;
        assert_eq!(volume_ratio(&bars, 10), Some(3.5));
        assert!(volume_ratio(&bars[..10], 10).is_none());
    }

    #[test]
    fn test_volume_ratio_zero_reference_is_one() {
        let mut bars: Vec<Bar> = (0..11).map(|_| bar(1.0, 1.0, 1.0, 1.0, 0.0)).collect();
        bars[10].volume = 50.0;
        assert_eq!(volume_ratio(&bars, 10), Some(1.0));
    }

    #[test]
    fn test_wicks_of_green_candle() {
        let w = wicks(&bar(100.0, 103.0, 99.0, 102.0, 1.0));
        assert!((w.upper_pct - 1.0 / 102.0 * 100.0).abs() < 1e-9);
        assert!((w.lower_pct - 1.0 / 102.0 * 100.0).abs() < 1e-9);
    }
}
