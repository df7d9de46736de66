//! Exchange integration for market data.
//!
//! ## Bitget
//! Read-only access to the v2 mix-market API (USDT-M perpetuals):
//! - Tickers (single and all), candles, order-book depth, open interest
//!
//! Everything downstream depends on the `MarketDataSource` trait only.

mod client;
mod traits;
mod types;

pub use client::BitgetClient;
pub use traits::*;
pub use types::{parse_candles, ApiResponse, RawDepth, RawOpenInterest, RawTicker};
