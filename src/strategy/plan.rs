//! Trade plan construction.

use crate::strategy::Direction;
use crate::utils::{price_decimals, to_price};
use rust_decimal::Decimal;
use serde::Serialize;

/// Fraction of the entry-to-stop distance where the break-even trigger sits.
const BREAK_EVEN_FRACTION: f64 = 0.5;

/// Emitted price levels of a signal.
///
/// LONG: `stop_loss < break_even_trigger < entry < take_profit_1 < take_profit_2`.
/// SHORT mirrors the ordering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradePlan {
    pub entry: Decimal,
    pub stop_loss: Decimal,
    pub take_profit_1: Decimal,
    pub take_profit_2: Decimal,
    pub break_even_trigger: Decimal,
    /// Suggested leverage multiple
    pub leverage: u8,
    /// Stop distance in percent of entry
    pub risk_pct: f64,
}

/// Inputs of a plan, all distances in percent of entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanParams {
    pub entry: f64,
    pub risk_pct: f64,
    pub tp1_pct: f64,
    pub tp2_pct: f64,
    pub leverage: u8,
}

impl PlanParams {
    /// Stop at `risk_pct`, first target at 1R, second at `reward_multiple` R.
    pub fn r_multiple(entry: f64, risk_pct: f64, reward_multiple: f64, leverage: u8) -> Self {
        Self {
            entry,
            risk_pct,
            tp1_pct: risk_pct,
            tp2_pct: risk_pct * reward_multiple,
            leverage,
        }
    }
}

/// Build a plan; `None` when inputs are degenerate or the ordering would not hold
/// after rounding.
pub fn build_plan(direction: Direction, params: PlanParams) -> Option<TradePlan> {
    let PlanParams {
        entry,
        risk_pct,
        tp1_pct,
        tp2_pct,
        leverage,
    } = params;
    if !(entry.is_finite() && entry > 0.0 && risk_pct > 0.0 && risk_pct < 100.0) {
        return None;
    }
    if !(tp1_pct > 0.0 && tp2_pct > tp1_pct) {
        return None;
    }

    let s = direction.sign();
    let stop = entry * (1.0 - s * risk_pct / 100.0);
    let tp1 = entry * (1.0 + s * tp1_pct / 100.0);
    let tp2 = entry * (1.0 + s * tp2_pct / 100.0);
    let break_even = entry - s * BREAK_EVEN_FRACTION * (entry - stop).abs();

    let decimals = price_decimals(entry);
    let plan = TradePlan {
        entry: to_price(entry, decimals)?,
        stop_loss: to_price(stop, decimals)?,
        take_profit_1: to_price(tp1, decimals)?,
        take_profit_2: to_price(tp2, decimals)?,
        break_even_trigger: to_price(break_even, decimals)?,
        leverage,
        risk_pct,
    };

    plan.is_ordered(direction).then_some(plan)
}

impl TradePlan {
    /// Whether the levels respect the strict ordering for `direction`.
    pub fn is_ordered(&self, direction: Direction) -> bool {
        let levels = [
            self.stop_loss,
            self.break_even_trigger,
            self.entry,
            self.take_profit_1,
            self.take_profit_2,
        ];
        match direction {
            Direction::Long => levels.windows(2).all(|w| w[0] < w[1]),
            Direction::Short => levels.windows(2).all(|w| w[0] > w[1]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_long_plan_ordering() {
        let plan = build_plan(
            Direction::Long,
            PlanParams::r_multiple(100.0, 3.0, 1.5, 3),
        )
        .unwrap();
        assert_eq!(plan.entry, dec!(100.000));
        assert_eq!(plan.stop_loss, dec!(97.000));
        assert_eq!(plan.break_even_trigger, dec!(98.500));
        assert_eq!(plan.take_profit_1, dec!(103.000));
        assert_eq!(plan.take_profit_2, dec!(104.500));
        assert!(plan.is_ordered(Direction::Long));
    }

    #[test]
    fn test_short_plan_ordering() {
        let plan = build_plan(
            Direction::Short,
            PlanParams::r_multiple(2.5, 4.0, 1.8, 3),
        )
        .unwrap();
        assert!(plan.stop_loss > plan.break_even_trigger);
        assert!(plan.break_even_trigger > plan.entry);
        assert!(plan.entry > plan.take_profit_1);
        assert!(plan.take_profit_1 > plan.take_profit_2);
    }

    #[test]
    fn test_tiny_price_keeps_ordering() {
        for direction in [Direction::Long, Direction::Short] {
            let plan = build_plan(
                direction,
                PlanParams::r_multiple(0.000012345, 0.8, 1.6, 8),
            )
            .unwrap();
            assert!(plan.is_ordered(direction));
        }
    }

    #[test]
    fn test_explicit_targets() {
        let plan = build_plan(
            Direction::Long,
            PlanParams {
                entry: 65_000.0,
                risk_pct: 1.0,
                tp1_pct: 1.6,
                tp2_pct: 2.88,
                leverage: 8,
            },
        )
        .unwrap();
        assert_eq!(plan.take_profit_1, dec!(66040.00));
        assert_eq!(plan.take_profit_2, dec!(66872.00));
    }

    #[test]
    fn test_degenerate_inputs_rejected() {
        assert!(build_plan(Direction::Long, PlanParams::r_multiple(0.0, 2.0, 1.5, 3)).is_none());
        assert!(build_plan(Direction::Long, PlanParams::r_multiple(10.0, 0.0, 1.5, 3)).is_none());
        assert!(build_plan(Direction::Long, PlanParams::r_multiple(10.0, 2.0, 1.0, 3)).is_none());
    }
}
