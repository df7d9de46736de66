//! Type definitions for Bitget v2 mix-market API responses.
//!
//! Bitget encodes numbers as strings; conversion to the normalized
//! `Ticker`/`OrderBook`/`Bar` types lives here.

use crate::exchange::traits::{BookLevel, OrderBook, Ticker};
use crate::indicators::Bar;
use serde::Deserialize;

/// Success code in every Bitget response envelope.
pub const SUCCESS_CODE: &str = "00000";

/// Common response envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub code: String,
    #[serde(default)]
    pub msg: String,
    pub data: Option<T>,
}

/// Raw ticker record from `/market/ticker` and `/market/tickers`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTicker {
    pub symbol: String,
    #[serde(default)]
    pub last_pr: Option<String>,
    #[serde(default)]
    pub mark_price: Option<String>,
    #[serde(default, rename = "high24h")]
    pub high_24h: Option<String>,
    #[serde(default, rename = "low24h")]
    pub low_24h: Option<String>,
    #[serde(default, rename = "change24h")]
    pub change_24h: Option<String>,
    #[serde(default)]
    pub funding_rate: Option<String>,
    #[serde(default)]
    pub usdt_volume: Option<String>,
    #[serde(default)]
    pub holding_amount: Option<String>,
}

impl RawTicker {
    /// Normalize; `None` when no positive price is published.
    pub fn into_ticker(self) -> Option<Ticker> {
        let mark = parse_num(&self.mark_price);
        let last = parse_num(&self.last_pr)
            .filter(|p| *p > 0.0)
            .or(mark)
            .filter(|p| *p > 0.0)?;

        Some(Ticker {
            symbol: self.symbol,
            last_price: last,
            mark_price: mark.unwrap_or(last),
            high_24h: parse_num(&self.high_24h),
            low_24h: parse_num(&self.low_24h),
            change_24h: parse_num(&self.change_24h).unwrap_or(0.0),
            funding_rate: parse_num(&self.funding_rate).unwrap_or(0.0),
            usdt_volume: parse_num(&self.usdt_volume).unwrap_or(0.0),
            open_interest: parse_num(&self.holding_amount),
        })
    }
}

/// Order-book payload from `/market/depth`. Levels are `[price, size]`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawDepth {
    #[serde(default)]
    pub bids: Vec<Vec<serde_json::Value>>,
    #[serde(default)]
    pub asks: Vec<Vec<serde_json::Value>>,
}

impl RawDepth {
    pub fn into_order_book(self) -> OrderBook {
        OrderBook {
            bids: self.bids.iter().filter_map(|l| parse_level(l)).collect(),
            asks: self.asks.iter().filter_map(|l| parse_level(l)).collect(),
        }
    }
}

/// Payload from `/market/open-interest`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOpenInterest {
    #[serde(default)]
    pub open_interest_list: Vec<RawOpenInterestEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawOpenInterestEntry {
    pub symbol: String,
    pub size: String,
}

impl RawOpenInterest {
    /// First reported size, when positive.
    pub fn size(&self) -> Option<f64> {
        self.open_interest_list
            .first()
            .and_then(|e| e.size.parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v > 0.0)
    }
}

/// Convert candle rows `[ts, open, high, low, close, baseVolume, ...]` to
/// bars, dropping malformed rows and sorting oldest first.
pub fn parse_candles(rows: &[Vec<serde_json::Value>]) -> Vec<Bar> {
    let mut bars: Vec<Bar> = rows
        .iter()
        .filter_map(|row| {
            if row.len() < 6 {
                return None;
            }
            Some(Bar {
                open_time: value_as_f64(&row[0])? as i64,
                open: value_as_f64(&row[1])?,
                high: value_as_f64(&row[2])?,
                low: value_as_f64(&row[3])?,
                close: value_as_f64(&row[4])?,
                volume: value_as_f64(&row[5])?,
            })
        })
        .collect();
    bars.sort_by_key(|b| b.open_time);
    bars
}

fn parse_level(level: &[serde_json::Value]) -> Option<BookLevel> {
    Some(BookLevel {
        price: value_as_f64(level.first()?)?,
        size: value_as_f64(level.get(1)?)?,
    })
}

fn parse_num(raw: &Option<String>) -> Option<f64> {
    raw.as_deref()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn value_as_f64(value: &serde_json::Value) -> Option<f64> {
    let parsed: Option<f64> = match value {
        serde_json::Value::String(s) => s.trim().parse().ok(),
        serde_json::Value::Number(n) => n.as_f64(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}
