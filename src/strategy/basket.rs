//! Basket scanner over the three majors (BTC, ETH, SOL).
//!
//! Both directions are scored every cycle from a contrarian 15m momentum
//! score plus 4h boosters; the stronger side wins. Alerts carry a
//! NEW / REINFORCE / FLIP hint against the trades already being timed.

use super::{clamp, Direction, Setup, Strategy, StrategyKind, TradePlan};
use crate::exchange::{Granularity, MarketDataSource, Ticker};
use crate::indicators::{
    closes, divergence, mfi, pct_change, rsi_series, tail, Bar, Divergence, DEFAULT_PERIOD,
    DIVERGENCE_LOOKBACK,
};
use crate::market::{volatility_or, FALLBACK_VOLATILITY_PCT};
use crate::persistence::OpenInterestCache;
use crate::risk::MarketBias;
use crate::strategy::{build_plan, PlanParams};
use async_trait::async_trait;
use serde::Serialize;

const FIFTEEN_MINUTE_LIMIT: usize = 50;
const FOUR_HOUR_LIMIT: usize = 100;
const MIN_FIFTEEN_MINUTE_BARS: usize = 2;

const MFI_BARS: usize = 30;
const DIVERGENCE_REFERENCE: usize = 15;

const REWARD_MULTIPLE: f64 = 1.6;
/// Second target as a multiple of the first.
const TP2_EXTENSION: f64 = 1.8;
const LEVERAGE: u8 = 8;

/// Map a signed impulse in `[-1, 1]` onto `[0, 100]`.
pub fn to_score_100(x: f64) -> f64 {
    clamp((x + 1.0) / 2.0 * 100.0, 0.0, 100.0)
}

#[derive(Debug, Clone, Serialize)]
pub struct BasketFeatures {
    pub symbol: String,
    pub price: f64,
    pub volatility_pct: f64,
    /// Last 15m close-to-close change, in percent
    pub change_15m_pct: f64,
    /// Contrarian momentum score for a long
    pub mms_long: f64,
    /// Contrarian momentum score for a short
    pub mms_short: f64,
    pub mfi_4h: Option<f64>,
    pub divergence: Divergence,
    pub oi_delta_pct: Option<f64>,
}

impl BasketFeatures {
    pub fn from_parts(
        ticker: &Ticker,
        fifteen_minute: &[Bar],
        four_hour: &[Bar],
        oi_delta_pct: Option<f64>,
    ) -> Option<Self> {
        let price = ticker.last_price;
        if price <= 0.0 || fifteen_minute.len() < MIN_FIFTEEN_MINUTE_BARS {
            return None;
        }
        let last = fifteen_minute[fifteen_minute.len() - 1].close;
        let prev = fifteen_minute[fifteen_minute.len() - 2].close;
        let change_15m_pct = pct_change(last, prev).unwrap_or(0.0);

        let closes_4h = closes(four_hour);
        let rsi_values = rsi_series(&closes_4h, DEFAULT_PERIOD);

        Some(Self {
            symbol: ticker.symbol.clone(),
            price,
            volatility_pct: volatility_or(ticker, FALLBACK_VOLATILITY_PCT),
            change_15m_pct,
            mms_long: to_score_100(-change_15m_pct / 2.0),
            mms_short: to_score_100(change_15m_pct / 2.0),
            mfi_4h: mfi(tail(four_hour, MFI_BARS), DEFAULT_PERIOD),
            divergence: divergence(
                tail(&closes_4h, DIVERGENCE_LOOKBACK),
                tail(&rsi_values, DIVERGENCE_LOOKBACK),
                DIVERGENCE_REFERENCE,
            ),
            oi_delta_pct,
        })
    }
}

/// Majors scanner holding an in-memory open-interest reference.
#[derive(Debug)]
pub struct BasketStrategy {
    oi_cache: OpenInterestCache,
}

impl BasketStrategy {
    pub fn new() -> Self {
        Self {
            oi_cache: OpenInterestCache::in_memory(),
        }
    }

    /// (long score, short score) including bias and boosters.
    fn side_scores(features: &BasketFeatures, bias: &MarketBias) -> (f64, f64) {
        let mut long = features.mms_long + bias.adjustment(Direction::Long);
        let mut short = features.mms_short + bias.adjustment(Direction::Short);

        if let Some(mfi) = features.mfi_4h {
            if mfi > 65.0 {
                short += 15.0;
            }
            if mfi < 35.0 {
                long += 15.0;
            }
        }
        match features.divergence {
            Divergence::Bearish => short += 20.0,
            Divergence::Bullish => long += 20.0,
            Divergence::None => {}
        }
        if features.oi_delta_pct.is_some_and(|d| d > 0.5) {
            long += 10.0;
            short += 10.0;
        }
        (long, short)
    }
}

impl Default for BasketStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Strategy for BasketStrategy {
    type Features = BasketFeatures;

    fn kind(&self) -> StrategyKind {
        StrategyKind::Basket
    }

    async fn snapshot(
        &self,
        market: &dyn MarketDataSource,
        symbol: &str,
    ) -> Option<Self::Features> {
        let (ticker, open_interest, fifteen_minute, four_hour) = tokio::join!(
            market.ticker(symbol),
            market.open_interest(symbol),
            market.candles(symbol, Granularity::FifteenMinutes, FIFTEEN_MINUTE_LIMIT),
            market.candles(symbol, Granularity::FourHours, FOUR_HOUR_LIMIT),
        );
        let ticker = ticker?;
        let oi_delta_pct = self.oi_cache.observe(symbol, open_interest);
        BasketFeatures::from_parts(&ticker, &fifteen_minute, &four_hour, oi_delta_pct)
    }

    fn score(&self, features: &Self::Features, bias: &MarketBias) -> Option<Setup> {
        let (long, short) = Self::side_scores(features, bias);
        let setup = if short > long {
            Setup {
                direction: Direction::Short,
                score: short,
            }
        } else {
            Setup {
                direction: Direction::Long,
                score: long,
            }
        };
        Some(setup)
    }

    fn plan(&self, features: &Self::Features, direction: Direction) -> Option<TradePlan> {
        let risk_pct = clamp(features.volatility_pct / 2.5, 0.8, 4.0);
        let reward_pct = risk_pct * REWARD_MULTIPLE;
        build_plan(
            direction,
            PlanParams {
                entry: features.price,
                risk_pct,
                tp1_pct: reward_pct,
                tp2_pct: reward_pct * TP2_EXTENSION,
                leverage: LEVERAGE,
            },
        )
    }

    fn price(&self, features: &Self::Features) -> f64 {
        features.price
    }

    fn details(&self, features: &Self::Features) -> Vec<String> {
        let mut lines = vec![
            format!("15m: {:+.2}%", features.change_15m_pct),
            format!(
                "MMS long/short: {:.0} / {:.0}",
                features.mms_long, features.mms_short
            ),
        ];
        if let Some(mfi) = features.mfi_4h {
            lines.push(format!("MFI 4h: {:.1}", mfi));
        }
        if features.divergence != Divergence::None {
            lines.push(format!("Divergence: {}", features.divergence));
        }
        if let Some(oi) = features.oi_delta_pct {
            lines.push(format!("OI: {:+.2}%", oi));
        }
        lines
    }

    fn advises_action(&self) -> bool {
        true
    }
}
