//! Signal strategies.
//!
//! Contains the core logic for:
//! - Per-symbol feature snapshots and hard gates
//! - Strategy scoring with market-bias adjustment
//! - Trade plan construction (entry, stop, targets, break-even)
//! - Candidate ranking, cooldowns and directional restrictions

mod basket;
mod momentum;
mod plan;
mod scalp;
mod selection;
mod trend;

pub use basket::{to_score_100, BasketFeatures, BasketStrategy};
pub use momentum::{MomentumFeatures, MomentumStrategy};
pub use plan::{build_plan, PlanParams, TradePlan};
pub use scalp::{ScalpFeatures, ScalpStrategy};
pub use selection::{apply_score_limits, is_direction_allowed, select_candidates};
pub use trend::{DailyTrend, TrendFeatures, TrendStrategy};

use crate::exchange::MarketDataSource;
use crate::indicators::Bar;
use crate::risk::MarketBias;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for LONG, -1 for SHORT.
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Direction::Long => "🟢",
            Direction::Short => "🔴",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

/// The four strategy variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StrategyKind {
    Scalp,
    Momentum,
    Trend,
    Basket,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::Scalp,
        StrategyKind::Momentum,
        StrategyKind::Trend,
        StrategyKind::Basket,
    ];

    /// Source label stored in the signal registry.
    pub fn label(&self) -> &'static str {
        match self {
            StrategyKind::Scalp => "SCALP",
            StrategyKind::Momentum => "MOMENTUM",
            StrategyKind::Trend => "TREND",
            StrategyKind::Basket => "BASKET",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            StrategyKind::Scalp => "⚡",
            StrategyKind::Momentum => "🚀",
            StrategyKind::Trend => "🎯",
            StrategyKind::Basket => "🧺",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "scalp" => Ok(StrategyKind::Scalp),
            "momentum" => Ok(StrategyKind::Momentum),
            "trend" => Ok(StrategyKind::Trend),
            "basket" => Ok(StrategyKind::Basket),
            other => anyhow::bail!("unknown strategy '{}'", other),
        }
    }
}

/// Output of a scorer: direction plus score including the bias adjustment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Setup {
    pub direction: Direction,
    pub score: f64,
}

/// Suggested action for an instrument that may already be tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionHint {
    /// Nothing tracked for the symbol
    New,
    /// Same direction already tracked
    Reinforce,
    /// Opposite direction tracked
    Flip,
}

impl ActionHint {
    pub fn from_tracked(tracked: Option<Direction>, direction: Direction) -> Self {
        match tracked {
            None => ActionHint::New,
            Some(d) if d == direction => ActionHint::Reinforce,
            Some(_) => ActionHint::Flip,
        }
    }
}

impl fmt::Display for ActionHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionHint::New => write!(f, "NEW"),
            ActionHint::Reinforce => write!(f, "REINFORCE"),
            ActionHint::Flip => write!(f, "FLIP"),
        }
    }
}

/// A fully evaluated trade idea that passed gates, floors and filters.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub strategy: StrategyKind,
    pub symbol: String,
    pub direction: Direction,
    /// Last traded price at evaluation time
    pub price: f64,
    /// Scorer output including bias
    pub raw_score: f64,
    /// Score after the filter engine's bonus
    pub adjusted_score: f64,
    pub plan: TradePlan,
    /// Strategy-specific metric lines for the alert body
    pub details: Vec<String>,
}

/// A signal strategy: snapshot, gates and scoring, trade plan.
///
/// Scoring is pure; all network access happens in `snapshot`.
#[async_trait]
pub trait Strategy: Send + Sync {
    type Features: Send + Sync;

    fn kind(&self) -> StrategyKind;

    /// Build the feature snapshot of one symbol. `None` drops the symbol.
    async fn snapshot(
        &self,
        market: &dyn MarketDataSource,
        symbol: &str,
    ) -> Option<Self::Features>;

    /// Apply hard gates and score. `None` rejects the symbol.
    fn score(&self, features: &Self::Features, bias: &MarketBias) -> Option<Setup>;

    /// Trade plan for an accepted setup.
    fn plan(&self, features: &Self::Features, direction: Direction) -> Option<TradePlan>;

    /// Last traded price of the snapshot.
    fn price(&self, features: &Self::Features) -> f64;

    /// Metric lines shown under the trade plan.
    fn details(&self, features: &Self::Features) -> Vec<String>;

    /// Candles handed to the filter engine's trend guard.
    fn guard_window<'a>(&self, _features: &'a Self::Features) -> Option<&'a [Bar]> {
        None
    }

    /// Scan symbols one at a time instead of in concurrent batches.
    fn sequential(&self) -> bool {
        false
    }

    /// Attach a NEW / REINFORCE / FLIP hint to alerts.
    fn advises_action(&self) -> bool {
        false
    }
}

/// Clamp helper shared by the scorers.
pub(crate) fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

/// Inclusive range check shared by the scorers.
pub(crate) fn within(value: f64, min: f64, max: f64) -> bool {
    value >= min && value <= max
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_sign_and_opposite() {
        assert_eq!(Direction::Long.sign(), 1.0);
        assert_eq!(Direction::Short.opposite(), Direction::Long);
        assert_eq!(Direction::Short.to_string(), "SHORT");
    }

    #[test]
    fn test_action_hint() {
        assert_eq!(ActionHint::from_tracked(None, Direction::Long), ActionHint::New);
        assert_eq!(
            ActionHint::from_tracked(Some(Direction::Long), Direction::Long),
            ActionHint::Reinforce
        );
        assert_eq!(
            ActionHint::from_tracked(Some(Direction::Short), Direction::Long),
            ActionHint::Flip
        );
    }

    #[test]
    fn test_strategy_kind_parse() {
        assert_eq!("Trend".parse::<StrategyKind>().unwrap(), StrategyKind::Trend);
        assert!("swing".parse::<StrategyKind>().is_err());
    }

    #[test]
    fn test_clamp_and_within() {
        assert_eq!(clamp(10.0, 2.0, 5.0), 5.0);
        assert_eq!(clamp(1.0, 2.0, 5.0), 2.0);
        assert!(within(2.2, 0.6, 2.2));
        assert!(!within(2.21, 0.6, 2.2));
    }
}
