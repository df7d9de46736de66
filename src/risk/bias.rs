//! Market regime classification from a reference instrument.
//!
//! The regime only nudges strategy scores; it never blocks a candidate.

use crate::config::BiasConfig;
use crate::exchange::{Granularity, MarketDataSource};
use crate::indicators::{pct_change, vwap};
use crate::strategy::Direction;
use serde::Serialize;
use std::fmt;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Regime {
    Bullish,
    Bearish,
    Neutral,
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Regime::Bullish => write!(f, "BULLISH"),
            Regime::Bearish => write!(f, "BEARISH"),
            Regime::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Regime snapshot used by every scorer in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarketBias {
    pub regime: Regime,
    /// Reference price distance from its 4h VWAP, in percent
    pub vwap_distance_pct: f64,
    /// Reference 24h change, in percent
    pub change_24h_pct: f64,
    /// Points added when aligned with the regime, removed when opposed
    pub points: f64,
}

impl MarketBias {
    pub fn neutral(points: f64) -> Self {
        Self {
            regime: Regime::Neutral,
            vwap_distance_pct: 0.0,
            change_24h_pct: 0.0,
            points,
        }
    }

    /// Score adjustment for a candidate direction.
    pub fn adjustment(&self, direction: Direction) -> f64 {
        match (self.regime, direction) {
            (Regime::Neutral, _) => 0.0,
            (Regime::Bullish, Direction::Long) | (Regime::Bearish, Direction::Short) => {
                self.points
            }
            _ => -self.points,
        }
    }
}

/// Classify the regime from VWAP distance and 24h change (both in percent).
pub fn classify(vwap_distance_pct: f64, change_24h_pct: f64, threshold_pct: f64) -> Regime {
    if vwap_distance_pct > threshold_pct && change_24h_pct > 0.0 {
        Regime::Bullish
    } else if vwap_distance_pct < -threshold_pct && change_24h_pct < 0.0 {
        Regime::Bearish
    } else {
        Regime::Neutral
    }
}

/// Computes the market bias once per cycle.
#[derive(Debug, Clone)]
pub struct BiasEngine {
    config: BiasConfig,
}

impl BiasEngine {
    pub fn new(config: BiasConfig) -> Self {
        Self { config }
    }

    /// Fetch the reference instrument and classify. Any missing input yields NEUTRAL.
    #[instrument(skip(self, market), fields(reference = %self.config.reference_symbol))]
    pub async fn evaluate(&self, market: &dyn MarketDataSource) -> MarketBias {
        let symbol = self.config.reference_symbol.as_str();
        let (ticker, candles) = tokio::join!(
            market.ticker(symbol),
            market.candles(symbol, Granularity::FourHours, self.config.candle_limit),
        );

        let Some(ticker) = ticker else {
            debug!("Reference ticker unavailable, bias NEUTRAL");
            return MarketBias::neutral(self.config.adjustment);
        };
        if candles.len() < 2 {
            debug!(candles = candles.len(), "Not enough candles, bias NEUTRAL");
            return MarketBias::neutral(self.config.adjustment);
        }

        let distance = vwap(&candles)
            .and_then(|v| pct_change(ticker.last_price, v))
            .unwrap_or(0.0);
        let change = ticker.change_24h_pct();
        let regime = classify(distance, change, self.config.vwap_threshold_pct);

        debug!(%regime, vwap_distance = distance, change_24h = change, "Market bias");

        MarketBias {
            regime,
            vwap_distance_pct: distance,
            change_24h_pct: change,
            points: self.config.adjustment,
        }
    }
}
