//! Score limits, directional restriction and per-cycle candidate selection.

use crate::config::{DirectionalBias, StrategyConfig};
use crate::strategy::{Candidate, Direction};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, trace};

/// Apply the configured ceiling, cap and floor to a biased score.
///
/// Scores above `max_score` are treated as manipulation traps and rejected;
/// `score_cap` clamps instead. Returns the score to carry forward.
pub fn apply_score_limits(config: &StrategyConfig, score: f64) -> Option<f64> {
    if let Some(max) = config.max_score {
        if score > max {
            trace!(score, max, "Score above ceiling");
            return None;
        }
    }
    let score = match config.score_cap {
        Some(cap) => score.min(cap),
        None => score,
    };
    if score < config.min_score {
        trace!(score, floor = config.min_score, "Score below floor");
        return None;
    }
    Some(score)
}

/// Whether a direction may be emitted under the strategy's directional bias.
///
/// A non-strict bias is advisory and never rejects.
pub fn is_direction_allowed(config: &StrategyConfig, direction: Direction) -> bool {
    if !config.bias_strict {
        return true;
    }
    match config.directional_bias {
        DirectionalBias::Both => true,
        DirectionalBias::Long => direction == Direction::Long,
        DirectionalBias::Short => direction == Direction::Short,
    }
}

/// Rank candidates and keep those that may be alerted this cycle.
///
/// Candidates are ordered by descending adjusted score. Symbols signaled
/// within the cooldown window are dropped; nothing is selected while the
/// strategy's global inter-signal delay is running.
pub fn select_candidates<F>(
    mut candidates: Vec<Candidate>,
    config: &StrategyConfig,
    last_signal_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    is_recently_signaled: F,
) -> Vec<Candidate>
where
    F: Fn(&str) -> bool,
{
    if let Some(last) = last_signal_at {
        let delay = Duration::minutes(config.global_delay_mins as i64);
        if config.global_delay_mins > 0 && now - last < delay {
            debug!(
                remaining_secs = (delay - (now - last)).num_seconds(),
                "Global signal delay active"
            );
            return Vec::new();
        }
    }

    candidates.sort_by(|a, b| b.adjusted_score.total_cmp(&a.adjusted_score));

    candidates
        .into_iter()
        .filter(|c| {
            let recent = is_recently_signaled(&c.symbol);
            if recent {
                debug!(symbol = %c.symbol, "Recently signaled, skipping");
            }
            !recent
        })
        .take(config.max_signals)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{build_plan, PlanParams, StrategyKind};

    // =========================================================================
    // Test Helpers
    // =========================================================================

    fn candidate(symbol: &str, score: f64) -> Candidate {
        Candidate {
            strategy: StrategyKind::Scalp,
            symbol: symbol.to_string(),
            direction: Direction::Long,
            price: 10.0,
            raw_score: score,
            adjusted_score: score,
            plan: build_plan(Direction::Long, PlanParams::r_multiple(10.0, 2.0, 1.5, 3)).unwrap(),
            details: Vec::new(),
        }
    }

    fn symbols(selected: &[Candidate]) -> Vec<&str> {
        selected.iter().map(|c| c.symbol.as_str()).collect()
    }

    // =========================================================================
    // Score Limit Tests
    // =========================================================================

    #[test]
    fn test_scalp_ceiling_rejects_trap() {
        let config = StrategyConfig::scalp();
        assert_eq!(apply_score_limits(&config, 97.0), None);
        assert_eq!(apply_score_limits(&config, 96.0), Some(96.0));
        assert_eq!(apply_score_limits(&config, 79.9), None);
    }

    #[test]
    fn test_basket_cap_clamps() {
        let config = StrategyConfig::basket();
        assert_eq!(apply_score_limits(&config, 120.0), Some(95.0));
        assert_eq!(apply_score_limits(&config, 80.0), Some(80.0));
    }

    // =========================================================================
    // Directional Restriction Tests
    // =========================================================================

    #[test]
    fn test_strict_bias_rejects_opposite_direction() {
        let mut config = StrategyConfig::trend();
        config.directional_bias = DirectionalBias::Long;
        config.bias_strict = true;
        assert!(is_direction_allowed(&config, Direction::Long));
        assert!(!is_direction_allowed(&config, Direction::Short));
    }

    #[test]
    fn test_non_strict_bias_is_advisory() {
        let mut config = StrategyConfig::trend();
        config.directional_bias = DirectionalBias::Short;
        config.bias_strict = false;
        assert!(is_direction_allowed(&config, Direction::Long));
    }

    // =========================================================================
    // Selection Tests
    // =========================================================================

    #[test]
    fn test_selects_highest_adjusted_score() {
        let config = StrategyConfig::basket();
        let selected = select_candidates(
            vec![candidate("A", 81.0), candidate("B", 92.0), candidate("C", 86.0)],
            &config,
            None,
            Utc::now(),
            |_| false,
        );
        assert_eq!(symbols(&selected), vec!["B", "C"]);
    }

    #[test]
    fn test_recently_signaled_symbols_are_skipped() {
        let config = StrategyConfig::scalp();
        let selected = select_candidates(
            vec![candidate("A", 90.0), candidate("B", 85.0)],
            &config,
            None,
            Utc::now(),
            |s| s == "A",
        );
        assert_eq!(symbols(&selected), vec!["B"]);
    }

    #[test]
    fn test_global_delay_blocks_selection() {
        let config = StrategyConfig::scalp();
        let now = Utc::now();
        let selected = select_candidates(
            vec![candidate("A", 90.0)],
            &config,
            Some(now - Duration::minutes(10)),
            now,
            |_| false,
        );
        assert!(selected.is_empty());

        let selected = select_candidates(
            vec![candidate("A", 90.0)],
            &config,
            Some(now - Duration::minutes(31)),
            now,
            |_| false,
        );
        assert_eq!(selected.len(), 1);
    }
}
