//! Venue-agnostic market data interface.
//!
//! Strategies, engines and the observer only see normalized `Ticker`,
//! `OrderBook` and `Bar` values through `MarketDataSource`. Transport or
//! parse failures surface as "no data" (`None` or an empty list), never as
//! an error the caller has to unwind.

use crate::indicators::Bar;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized 24h ticker for one perpetual contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    /// Last traded price (mark price when no trade price is published)
    pub last_price: f64,
    pub mark_price: f64,
    pub high_24h: Option<f64>,
    pub low_24h: Option<f64>,
    /// 24h change as a ratio (0.012 = +1.2%)
    pub change_24h: f64,
    /// Current funding rate as a ratio
    pub funding_rate: f64,
    /// 24h turnover in USDT
    pub usdt_volume: f64,
    /// Open interest in contracts, when published with the ticker
    pub open_interest: Option<f64>,
}

impl Ticker {
    /// Create a ticker with only a symbol and price set.
    pub fn new(symbol: impl Into<String>, last_price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            last_price,
            mark_price: last_price,
            high_24h: None,
            low_24h: None,
            change_24h: 0.0,
            funding_rate: 0.0,
            usdt_volume: 0.0,
            open_interest: None,
        }
    }

    /// Set the 24h high/low range.
    pub fn with_range(mut self, high: f64, low: f64) -> Self {
        self.high_24h = Some(high);
        self.low_24h = Some(low);
        self
    }

    /// Set the 24h change ratio.
    pub fn with_change(mut self, change_24h: f64) -> Self {
        self.change_24h = change_24h;
        self
    }

    /// Set the funding rate.
    pub fn with_funding(mut self, funding_rate: f64) -> Self {
        self.funding_rate = funding_rate;
        self
    }

    /// Set the 24h USDT volume.
    pub fn with_volume(mut self, usdt_volume: f64) -> Self {
        self.usdt_volume = usdt_volume;
        self
    }

    /// 24h range as a percentage of the last price.
    ///
    /// `None` when the ticker carries no usable high/low.
    pub fn volatility_pct(&self) -> Option<f64> {
        match (self.high_24h, self.low_24h) {
            (Some(high), Some(low)) if high > 0.0 && low > 0.0 && self.last_price > 0.0 => {
                Some((high - low) / self.last_price * 100.0)
            }
            _ => None,
        }
    }

    /// 24h change in percent.
    pub fn change_24h_pct(&self) -> f64 {
        self.change_24h * 100.0
    }
}

/// One price level of an order book.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: f64,
    pub size: f64,
}

/// Top-of-book snapshot, best levels first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

/// Imbalance reported when the ask side is empty.
pub const EMPTY_ASK_IMBALANCE: f64 = 2.0;

impl OrderBook {
    /// Sum of bid sizes over sum of ask sizes across the top `levels`.
    pub fn imbalance(&self, levels: usize) -> f64 {
        let bid_sum: f64 = self.bids.iter().take(levels).map(|l| l.size).sum();
        let ask_sum: f64 = self.asks.iter().take(levels).map(|l| l.size).sum();
        if ask_sum > 0.0 {
            bid_sum / ask_sum
        } else {
            EMPTY_ASK_IMBALANCE
        }
    }
}

/// Candle timeframes used by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Granularity {
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "1H")]
    OneHour,
    #[serde(rename = "4H")]
    FourHours,
    #[serde(rename = "1D")]
    OneDay,
}

impl Granularity {
    /// Venue wire code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::FiveMinutes => "5m",
            Granularity::FifteenMinutes => "15m",
            Granularity::OneHour => "1H",
            Granularity::FourHours => "4H",
            Granularity::OneDay => "1D",
        }
    }

    pub fn seconds(&self) -> u64 {
        match self {
            Granularity::FiveMinutes => 300,
            Granularity::FifteenMinutes => 900,
            Granularity::OneHour => 3_600,
            Granularity::FourHours => 14_400,
            Granularity::OneDay => 86_400,
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of public market data for USDT-margined perpetuals.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// 24h ticker for one symbol; `None` when unavailable.
    async fn ticker(&self, symbol: &str) -> Option<Ticker>;

    /// Up to `limit` candles, oldest first; empty when unavailable.
    async fn candles(&self, symbol: &str, granularity: Granularity, limit: usize) -> Vec<Bar>;

    /// Top `depth` levels per side; `None` when unavailable.
    async fn order_book(&self, symbol: &str, depth: usize) -> Option<OrderBook>;

    /// Open interest in contracts; `None` when unavailable.
    async fn open_interest(&self, symbol: &str) -> Option<f64>;

    /// Tickers for every listed contract; empty when unavailable.
    async fn tickers(&self) -> Vec<Ticker>;
}
