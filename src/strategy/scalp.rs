//! Scalp scanner: fast 5m VWAP break-outs on mid-cap contracts.
//!
//! Direction follows the sign of the VWAP gap. A setup needs a volume spike,
//! a tradable volatility band and a gap that is stretched but not exhausted.
//! Entries are placed on a pullback towards VWAP.

use super::{clamp, within, Direction, Setup, Strategy, StrategyKind, TradePlan};
use crate::exchange::MarketDataSource;
use crate::market::{intraday_snapshot, IntradaySnapshot};
use crate::risk::MarketBias;
use crate::strategy::{build_plan, PlanParams};
use async_trait::async_trait;

pub type ScalpFeatures = IntradaySnapshot;

const CANDLE_LIMIT: usize = 120;

const MIN_VOLUME_RATIO_LONG: f64 = 3.0;
const MIN_VOLUME_RATIO_SHORT: f64 = 2.5;
const VOLATILITY_RANGE: (f64, f64) = (5.0, 40.0);
const GAP_RANGE_LONG: (f64, f64) = (0.6, 2.2);
const GAP_RANGE_SHORT: (f64, f64) = (0.8, 2.8);
const MAX_WICK_PCT: f64 = 1.3;

/// Gap at or below which the tighter pullback and reward apply.
const TIGHT_GAP_PCT: f64 = 1.2;

#[derive(Debug, Clone, Default)]
pub struct ScalpStrategy;

impl ScalpStrategy {
    pub fn new() -> Self {
        Self
    }

    fn direction(features: &ScalpFeatures) -> Direction {
        if features.vwap_gap_pct > 0.0 {
            Direction::Long
        } else {
            Direction::Short
        }
    }

    fn passes_gates(features: &ScalpFeatures, direction: Direction) -> bool {
        let gap = features.vwap_gap_pct.abs();
        let (min_volume, (gap_min, gap_max), wick) = match direction {
            Direction::Long => (
                MIN_VOLUME_RATIO_LONG,
                GAP_RANGE_LONG,
                features.wicks.upper_pct,
            ),
            Direction::Short => (
                MIN_VOLUME_RATIO_SHORT,
                GAP_RANGE_SHORT,
                features.wicks.lower_pct,
            ),
        };

        features.volume_ratio >= min_volume
            && within(
                features.volatility_pct,
                VOLATILITY_RANGE.0,
                VOLATILITY_RANGE.1,
            )
            && within(gap, gap_min, gap_max)
            && wick <= MAX_WICK_PCT
    }

    fn base_score(features: &ScalpFeatures, direction: Direction) -> f64 {
        let volume = if features.volume_ratio >= 3.5 {
            35.0
        } else if features.volume_ratio >= 3.0 {
            28.0
        } else {
            20.0
        };

        let gap = features.vwap_gap_pct.abs();
        let gap_score = if within(gap, 1.0, 2.2) {
            25.0
        } else if within(gap, 0.7, 2.5) {
            15.0
        } else {
            5.0
        };

        let rsi_zone = match direction {
            Direction::Long => within(features.rsi, 50.0, 70.0),
            Direction::Short => within(features.rsi, 30.0, 50.0),
        };
        let rsi_score = if rsi_zone { 20.0 } else { 10.0 };

        volume + gap_score + rsi_score
    }
}

#[async_trait]
impl Strategy for ScalpStrategy {
    type Features = ScalpFeatures;

    fn kind(&self) -> StrategyKind {
        StrategyKind::Scalp
    }

    async fn snapshot(
        &self,
        market: &dyn MarketDataSource,
        symbol: &str,
    ) -> Option<Self::Features> {
        intraday_snapshot(market, symbol, CANDLE_LIMIT).await
    }

    fn score(&self, features: &Self::Features, bias: &MarketBias) -> Option<Setup> {
        let direction = Self::direction(features);
        if !Self::passes_gates(features, direction) {
            return None;
        }
        Some(Setup {
            direction,
            score: Self::base_score(features, direction) + bias.adjustment(direction),
        })
    }

    fn plan(&self, features: &Self::Features, direction: Direction) -> Option<TradePlan> {
        let gap = features.vwap_gap_pct.abs();
        let (pullback, reward_multiple) = if gap <= TIGHT_GAP_PCT {
            (0.20, 1.5)
        } else {
            (0.30, 1.7)
        };
        let entry = features.price * (1.0 - direction.sign() * gap / 100.0 * pullback);
        let risk_pct = clamp(features.volatility_pct / 7.0, 2.0, 5.0);
        let leverage = if risk_pct > 2.8 { 2 } else { 3 };

        build_plan(
            direction,
            PlanParams::r_multiple(entry, risk_pct, reward_multiple, leverage),
        )
    }

    fn price(&self, features: &Self::Features) -> f64 {
        features.price
    }

    fn details(&self, features: &Self::Features) -> Vec<String> {
        vec![
            format!("Volume: x{:.1}", features.volume_ratio),
            format!("VWAP gap: {:+.2}%", features.vwap_gap_pct),
            format!("RSI 5m: {:.1}", features.rsi),
            format!("Volatility: {:.1}%", features.volatility_pct),
        ]
    }
}
