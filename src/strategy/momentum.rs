//! Momentum scanner: intraday 5m volume impulses with linear scoring.

use super::{clamp, within, Direction, Setup, Strategy, StrategyKind, TradePlan};
use crate::exchange::MarketDataSource;
use crate::market::{intraday_snapshot, IntradaySnapshot};
use crate::risk::MarketBias;
use crate::strategy::{build_plan, PlanParams};
use async_trait::async_trait;

pub type MomentumFeatures = IntradaySnapshot;

const CANDLE_LIMIT: usize = 100;

const MIN_VOLUME_RATIO_LONG: f64 = 2.5;
const MIN_VOLUME_RATIO_SHORT: f64 = 2.0;
const VOLATILITY_RANGE: (f64, f64) = (3.0, 30.0);
const GAP_RANGE_LONG: (f64, f64) = (0.5, 2.5);
const GAP_RANGE_SHORT: (f64, f64) = (0.8, 3.5);
const MAX_UPPER_WICK_LONG: f64 = 2.0;
const MAX_LOWER_WICK_SHORT: f64 = 1.2;
/// Longs are not taken on contracts down more than this over 24h.
const MIN_CHANGE_24H_LONG: f64 = -5.0;

const REWARD_MULTIPLE: f64 = 1.6;

#[derive(Debug, Clone, Default)]
pub struct MomentumStrategy;

impl MomentumStrategy {
    pub fn new() -> Self {
        Self
    }

    fn passes_gates(features: &MomentumFeatures, direction: Direction) -> bool {
        let gap = features.vwap_gap_pct.abs();
        if !within(
            features.volatility_pct,
            VOLATILITY_RANGE.0,
            VOLATILITY_RANGE.1,
        ) {
            return false;
        }
        match direction {
            Direction::Long => {
                features.volume_ratio >= MIN_VOLUME_RATIO_LONG
                    && within(gap, GAP_RANGE_LONG.0, GAP_RANGE_LONG.1)
                    && features.wicks.upper_pct <= MAX_UPPER_WICK_LONG
                    && features.change_24h_pct >= MIN_CHANGE_24H_LONG
            }
            Direction::Short => {
                features.volume_ratio >= MIN_VOLUME_RATIO_SHORT
                    && within(gap, GAP_RANGE_SHORT.0, GAP_RANGE_SHORT.1)
                    && features.wicks.lower_pct <= MAX_LOWER_WICK_SHORT
            }
        }
    }

    fn base_score(features: &MomentumFeatures, direction: Direction) -> f64 {
        let volume = clamp(features.volume_ratio * 10.0, 20.0, 50.0);

        let gap = features.vwap_gap_pct.abs();
        let gap_score = if within(gap, 1.0, 2.0) {
            30.0
        } else if within(gap, 0.8, 3.0) {
            20.0
        } else {
            10.0
        };

        let rsi_zone = match direction {
            Direction::Long => within(features.rsi, 45.0, 65.0),
            Direction::Short => within(features.rsi, 25.0, 45.0),
        };

        volume + gap_score + if rsi_zone { 20.0 } else { 10.0 }
    }
}

#[async_trait]
impl Strategy for MomentumStrategy {
    type Features = MomentumFeatures;

    fn kind(&self) -> StrategyKind {
        StrategyKind::Momentum
    }

    async fn snapshot(
        &self,
        market: &dyn MarketDataSource,
        symbol: &str,
    ) -> Option<Self::Features> {
        intraday_snapshot(market, symbol, CANDLE_LIMIT).await
    }

    fn score(&self, features: &Self::Features, bias: &MarketBias) -> Option<Setup> {
        let direction = if features.vwap_gap_pct > 0.0 {
            Direction::Long
        } else {
            Direction::Short
        };
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
        let pullback = if gap <= 1.2 {
            0.20
        } else if gap <= 2.0 {
            0.25
        } else {
            0.30
        };
        let entry = features.price * (1.0 - direction.sign() * gap / 100.0 * pullback);
        let risk_pct = clamp(features.volatility_pct / 5.0 * 2.0, 2.0, 5.0);
        let leverage = if risk_pct > 4.0 { 2 } else { 3 };

        build_plan(
            direction,
            PlanParams::r_multiple(entry, risk_pct, REWARD_MULTIPLE, leverage),
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
            format!("24h: {:+.2}%", features.change_24h_pct),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::Wicks;
    use crate::risk::Regime;

    fn features(gap: f64, volume_ratio: f64, rsi: f64) -> MomentumFeatures {
        MomentumFeatures {
            symbol: "ABCUSDT".to_string(),
            price: 0.5,
            volatility_pct: 8.0,
            vwap_gap_pct: gap,
            rsi,
            volume_ratio,
            wicks: Wicks {
                upper_pct: 0.5,
                lower_pct: 0.5,
            },
            change_24h_pct: 1.0,
        }
    }

    #[test]
    fn test_linear_volume_score() {
        let strategy = MomentumStrategy::new();
        let neutral = MarketBias::neutral(5.0);

        let setup = strategy.score(&features(1.5, 4.0, 55.0), &neutral).unwrap();
        assert_eq!(setup.score, 40.0 + 30.0 + 20.0);

        let setup = strategy.score(&features(1.5, 6.0, 55.0), &neutral).unwrap();
        assert_eq!(setup.score, 50.0 + 30.0 + 20.0);
    }

    #[test]
    fn test_long_rejected_after_large_daily_drop() {
        let mut f = features(1.5, 4.0, 55.0);
        f.change_24h_pct = -5.5;
        assert!(MomentumStrategy::new()
            .score(&f, &MarketBias::neutral(5.0))
            .is_none());
    }

    #[test]
    fn test_short_gates() {
        let strategy = MomentumStrategy::new();
        let neutral = MarketBias::neutral(5.0);

        let mut f = features(-1.5, 2.0, 35.0);
        f.change_24h_pct = -12.0;
        let setup = strategy.score(&f, &neutral).unwrap();
        assert_eq!(setup.direction, Direction::Short);

        f.wicks.lower_pct = 1.3;
        assert!(strategy.score(&f, &neutral).is_none());
    }

    #[test]
    fn test_bullish_bias_penalizes_short() {
        let bullish = MarketBias {
            regime: Regime::Bullish,
            vwap_distance_pct: 0.8,
            change_24h_pct: 1.5,
            points: 5.0,
        };
        let setup = MomentumStrategy::new()
            .score(&features(-1.5, 5.0, 35.0), &bullish)
            .unwrap();
        assert_eq!(setup.score, 50.0 + 30.0 + 20.0 - 5.0);
    }

    #[test]
    fn test_plan_risk_and_leverage() {
        let strategy = MomentumStrategy::new();

        let plan = strategy
            .plan(&features(1.5, 4.0, 55.0), Direction::Long)
            .unwrap();
        assert!((plan.risk_pct - 3.2).abs() < 1e-9);
        assert_eq!(plan.leverage, 3);
        assert!(plan.is_ordered(Direction::Long));

        let mut f = features(-2.5, 4.0, 35.0);
        f.volatility_pct = 20.0;
        let plan = strategy.plan(&f, Direction::Short).unwrap();
        assert_eq!(plan.risk_pct, 5.0);
        assert_eq!(plan.leverage, 2);
        assert!(plan.is_ordered(Direction::Short));
    }
}
