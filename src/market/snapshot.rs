//! Intraday 5m feature snapshot shared by the scalp and momentum scanners.

use crate::exchange::{Granularity, MarketDataSource, Ticker};
use crate::indicators::{
    closes, pct_change, rsi, tail, volume_ratio, vwap, wicks, Bar, Wicks, DEFAULT_PERIOD,
};
use serde::Serialize;
use tracing::trace;

/// Primary-timeframe history required before a symbol is scored.
pub const MIN_INTRADAY_BARS: usize = 20;

/// Bars in the VWAP window of the intraday gap.
pub const VWAP_BARS: usize = 24;

/// Bars averaged as the volume-ratio reference.
pub const VOLUME_LOOKBACK: usize = 10;

/// Volatility assumed when the ticker has no 24h range.
pub const FALLBACK_VOLATILITY_PCT: f64 = 5.0;

/// Volatility from the ticker's 24h range, or `fallback`.
pub fn volatility_or(ticker: &Ticker, fallback: f64) -> f64 {
    ticker.volatility_pct().unwrap_or(fallback)
}

/// Features of one symbol on the 5m timeframe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntradaySnapshot {
    pub symbol: String,
    pub price: f64,
    pub volatility_pct: f64,
    /// Price distance from the 24-bar VWAP, in percent (signed)
    pub vwap_gap_pct: f64,
    pub rsi: f64,
    /// Last bar volume over the preceding 10-bar mean
    pub volume_ratio: f64,
    /// Wicks of the last bar
    pub wicks: Wicks,
    pub change_24h_pct: f64,
}

impl IntradaySnapshot {
    /// Derive the snapshot from an already fetched ticker and 5m history.
    pub fn from_parts(ticker: &Ticker, bars: &[Bar]) -> Option<Self> {
        if ticker.last_price <= 0.0 || bars.len() < MIN_INTRADAY_BARS {
            return None;
        }
        let price = ticker.last_price;
        let rsi = rsi(&closes(bars), DEFAULT_PERIOD)?;
        let vwap = vwap(tail(bars, VWAP_BARS))?;
        let vwap_gap_pct = pct_change(price, vwap)?;
        let volume_ratio = volume_ratio(bars, VOLUME_LOOKBACK)?;
        let last = bars.last()?;

        Some(Self {
            symbol: ticker.symbol.clone(),
            price,
            volatility_pct: volatility_or(ticker, FALLBACK_VOLATILITY_PCT),
            vwap_gap_pct,
            rsi,
            volume_ratio,
            wicks: wicks(last),
            change_24h_pct: ticker.change_24h_pct(),
        })
    }
}

/// Fetch ticker and `limit` 5m candles concurrently and build the snapshot.
pub async fn intraday_snapshot(
    market: &dyn MarketDataSource,
    symbol: &str,
    limit: usize,
) -> Option<IntradaySnapshot> {
    let (ticker, bars) = tokio::join!(
        market.ticker(symbol),
        market.candles(symbol, Granularity::FiveMinutes, limit),
    );
    let Some(ticker) = ticker else {
        trace!(symbol, "No ticker");
        return None;
    };
    let snapshot = IntradaySnapshot::from_parts(&ticker, &bars);
    if snapshot.is_none() {
        trace!(symbol, bars = bars.len(), "Insufficient intraday history");
    }
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::MockMarketDataSource;
    use crate::indicators::test_support::bars_from_closes;

    fn rising(n: usize) -> Vec<Bar> {
        let closes: Vec<f64> = (0..n).map(|i| 100.0 + i as f64 * 0.1).collect();
        bars_from_closes(&closes)
    }

    #[test]
    fn test_snapshot_features() {
        let ticker = Ticker::new("XYZUSDT", 107.0)
            .with_range(110.0, 100.0)
            .with_change(0.02);
        let mut bars = rising(60);
        bars.last_mut().unwrap().volume = 4_000.0;

        let snap = IntradaySnapshot::from_parts(&ticker, &bars).unwrap();
        assert!((snap.volatility_pct - 10.0 / 107.0 * 100.0).abs() < 1e-9);
        assert!((snap.volume_ratio - 4.0).abs() < 1e-9);
        assert!(snap.vwap_gap_pct > 0.0);
        assert!(snap.rsi > 50.0);
        assert!((snap.change_24h_pct - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_volatility_fallback() {
        let ticker = Ticker::new("XYZUSDT", 100.0);
        let snap = IntradaySnapshot::from_parts(&ticker, &rising(30)).unwrap();
        assert_eq!(snap.volatility_pct, FALLBACK_VOLATILITY_PCT);
    }

    #[test]
    fn test_short_history_is_dropped() {
        let ticker = Ticker::new("XYZUSDT", 100.0);
        assert!(IntradaySnapshot::from_parts(&ticker, &rising(19)).is_none());
    }

    #[tokio::test]
    async fn test_missing_ticker_drops_symbol() {
        let mut market = MockMarketDataSource::new();
        market.expect_ticker().returning(|_| None);
        market.expect_candles().returning(|_, _, _| rising(100));

        assert!(intraday_snapshot(&market, "XYZUSDT", 100).await.is_none());
    }
}
