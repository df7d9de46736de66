//! Multi-timeframe swing scanner on a fixed list of large caps.
//!
//! Direction comes from the 1h RSI. The score stacks daily trend, the 4h
//! EMA-200, the 4h RSI zone, RSI divergence, MFI extremes and open-interest
//! impulse on top of the market bias. Symbols are scanned one at a time.
//! Candidates never pass through the counter-trend guard.

use super::{clamp, within, Direction, Setup, Strategy, StrategyKind, TradePlan};
use crate::exchange::{Granularity, MarketDataSource, Ticker};
use crate::indicators::{
    atr, closes, divergence, ema, mfi, pct_change, rsi, rsi_series, tail, vwap, Bar, Divergence,
    DEFAULT_PERIOD, DIVERGENCE_LOOKBACK,
};
use crate::market::volatility_or;
use crate::persistence::OpenInterestCache;
use crate::risk::MarketBias;
use crate::strategy::{build_plan, PlanParams};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use tracing::trace;

const HOURLY_LIMIT: usize = 100;
const FOUR_HOUR_LIMIT: usize = 300;
const DAILY_LIMIT: usize = 30;

const MIN_HOURLY_BARS: usize = 15;
const MIN_FOUR_HOUR_BARS: usize = 30;
const MIN_DAILY_BARS: usize = 2;

const EMA_PERIOD: usize = 200;
const VWAP_BARS: usize = 48;
const MFI_BARS: usize = 30;
const DIVERGENCE_REFERENCE: usize = 20;
const FALLBACK_VOLATILITY_PCT: f64 = 10.0;

const REWARD_MULTIPLE: f64 = 1.8;
const LEVERAGE: u8 = 3;

/// Direction of the last daily close against the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DailyTrend {
    Up,
    Down,
}

impl DailyTrend {
    fn aligned(&self, direction: Direction) -> bool {
        matches!(
            (self, direction),
            (DailyTrend::Up, Direction::Long) | (DailyTrend::Down, Direction::Short)
        )
    }
}

impl fmt::Display for DailyTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DailyTrend::Up => write!(f, "UP"),
            DailyTrend::Down => write!(f, "DOWN"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendFeatures {
    pub symbol: String,
    pub price: f64,
    pub volatility_pct: f64,
    pub rsi_1h: f64,
    pub rsi_4h: f64,
    /// 4h ATR as a percentage of price
    pub atr_pct: f64,
    /// Undefined below 200 4h closes
    pub ema_200: Option<f64>,
    pub daily_trend: DailyTrend,
    pub mfi_4h: Option<f64>,
    pub divergence: Divergence,
    /// Change against the previous scan's open interest, in percent
    pub oi_delta_pct: Option<f64>,
    /// Price distance from the 48-bar 4h VWAP, in percent
    pub vwap_gap_pct: Option<f64>,
}

impl TrendFeatures {
    /// Derive features from fetched data. `None` when any required
    /// timeframe is too short.
    pub fn from_parts(
        ticker: &Ticker,
        hourly: &[Bar],
        four_hour: &[Bar],
        daily: &[Bar],
        oi_delta_pct: Option<f64>,
    ) -> Option<Self> {
        let price = ticker.last_price;
        if price <= 0.0
            || hourly.len() < MIN_HOURLY_BARS
            || four_hour.len() < MIN_FOUR_HOUR_BARS
            || daily.len() < MIN_DAILY_BARS
        {
            return None;
        }

        let closes_4h = closes(four_hour);
        let rsi_1h = rsi(&closes(hourly), DEFAULT_PERIOD)?;
        let rsi_4h = rsi(&closes_4h, DEFAULT_PERIOD)?;
        let atr_pct = atr(four_hour, DEFAULT_PERIOD)? / price * 100.0;

        let last_daily = daily[daily.len() - 1].close;
        let prev_daily = daily[daily.len() - 2].close;
        let daily_trend = if last_daily > prev_daily {
            DailyTrend::Up
        } else {
            DailyTrend::Down
        };

        let rsi_values = rsi_series(&closes_4h, DEFAULT_PERIOD);
        let divergence = divergence(
            tail(&closes_4h, DIVERGENCE_LOOKBACK),
            tail(&rsi_values, DIVERGENCE_LOOKBACK),
            DIVERGENCE_REFERENCE,
        );

        Some(Self {
            symbol: ticker.symbol.clone(),
            price,
            volatility_pct: volatility_or(ticker, FALLBACK_VOLATILITY_PCT),
            rsi_1h,
            rsi_4h,
            atr_pct,
            ema_200: ema(&closes_4h, EMA_PERIOD),
            daily_trend,
            mfi_4h: mfi(tail(four_hour, MFI_BARS), DEFAULT_PERIOD),
            divergence,
            oi_delta_pct,
            vwap_gap_pct: vwap(tail(four_hour, VWAP_BARS)).and_then(|v| pct_change(price, v)),
        })
    }
}

/// Swing scanner holding the persisted open-interest reference.
#[derive(Debug)]
pub struct TrendStrategy {
    oi_cache: OpenInterestCache,
}

impl TrendStrategy {
    pub fn new(oi_cache: OpenInterestCache) -> Self {
        Self { oi_cache }
    }

    fn base_score(features: &TrendFeatures, direction: Direction) -> f64 {
        let mut score = 0.0;

        score += if features.daily_trend.aligned(direction) {
            20.0
        } else {
            -10.0
        };

        if let Some(ema_200) = features.ema_200 {
            let aligned = match direction {
                Direction::Long => features.price > ema_200,
                Direction::Short => features.price < ema_200,
            };
            score += if aligned { 15.0 } else { -10.0 };
        }

        let rsi_zone = match direction {
            Direction::Long => within(features.rsi_4h, 40.0, 58.0),
            Direction::Short => within(features.rsi_4h, 42.0, 60.0),
        };
        if rsi_zone {
            score += 15.0;
        }

        let divergence_agrees = matches!(
            (features.divergence, direction),
            (Divergence::Bullish, Direction::Long) | (Divergence::Bearish, Direction::Short)
        );
        if divergence_agrees {
            score += 25.0;
        }

        if let Some(mfi) = features.mfi_4h {
            let extreme = match direction {
                Direction::Long => mfi < 35.0,
                Direction::Short => mfi > 65.0,
            };
            if extreme {
                score += 15.0;
            }
        }

        match features.oi_delta_pct {
            Some(d) if d > 1.5 => score += 20.0,
            Some(d) if d > 0.5 => score += 10.0,
            _ => {}
        }

        score
    }
}

#[async_trait]
impl Strategy for TrendStrategy {
    type Features = TrendFeatures;

    fn kind(&self) -> StrategyKind {
        StrategyKind::Trend
    }

    async fn snapshot(
        &self,
        market: &dyn MarketDataSource,
        symbol: &str,
    ) -> Option<Self::Features> {
        let (ticker, open_interest, hourly, four_hour, daily) = tokio::join!(
            market.ticker(symbol),
            market.open_interest(symbol),
            market.candles(symbol, Granularity::OneHour, HOURLY_LIMIT),
            market.candles(symbol, Granularity::FourHours, FOUR_HOUR_LIMIT),
            market.candles(symbol, Granularity::OneDay, DAILY_LIMIT),
        );
        let ticker = ticker?;
        let oi_delta_pct = self.oi_cache.observe(symbol, open_interest);

        let features = TrendFeatures::from_parts(&ticker, &hourly, &four_hour, &daily, oi_delta_pct);
        if features.is_none() {
            trace!(
                symbol,
                hourly = hourly.len(),
                daily = daily.len(),
                "Insufficient multi-timeframe history"
            );
        }
        features
    }

    fn score(&self, features: &Self::Features, bias: &MarketBias) -> Option<Setup> {
        let direction = if features.rsi_1h >= 50.0 {
            Direction::Long
        } else {
            Direction::Short
        };
        Some(Setup {
            direction,
            score: Self::base_score(features, direction) + bias.adjustment(direction),
        })
    }

    fn plan(&self, features: &Self::Features, direction: Direction) -> Option<TradePlan> {
        let risk_pct = clamp(features.atr_pct, 3.0, 8.0);
        build_plan(
            direction,
            PlanParams::r_multiple(features.price, risk_pct, REWARD_MULTIPLE, LEVERAGE),
        )
    }

    fn price(&self, features: &Self::Features) -> f64 {
        features.price
    }

    fn details(&self, features: &Self::Features) -> Vec<String> {
        let fmt_opt = |v: Option<f64>, suffix: &str| match v {
            Some(v) => format!("{:.1}{}", v, suffix),
            None => "n/a".to_string(),
        };
        vec![
            format!("Trend D1: {}", features.daily_trend),
            format!("RSI 1h/4h: {:.1} / {:.1}", features.rsi_1h, features.rsi_4h),
            format!("MFI 4h: {}", fmt_opt(features.mfi_4h, "")),
            format!("OI: {}", fmt_opt(features.oi_delta_pct, "%")),
            format!("Divergence: {}", features.divergence),
            format!("ATR 4h: {:.2}%", features.atr_pct),
            match features.vwap_gap_pct {
                Some(gap) => format!("VWAP 4h: {:+.1}%", gap),
                None => "VWAP 4h: n/a".to_string(),
            },
        ]
    }

    fn sequential(&self) -> bool {
        true
    }
}
