//! Advanced veto filters: order-book imbalance, funding and trend guard.
//!
//! The tentative score is reported for logging only; block decisions
//! depend on market inputs alone.

use crate::config::FilterConfig;
use crate::exchange::MarketDataSource;
use crate::indicators::{trend_strength, Bar};
use crate::strategy::Direction;
use std::fmt;
use tracing::{debug, instrument};

/// Why a candidate was vetoed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlockReason {
    /// LONG against a bid-thin book
    BearishOrderBook { imbalance: f64 },
    /// SHORT against an ask-thin book
    BullishOrderBook { imbalance: f64 },
    /// LONG while longs pay a high funding rate
    HighFunding { rate: f64 },
    /// Candidate opposes a strong established trend
    CounterTrend { adx: f64, slope: f64 },
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockReason::BearishOrderBook { imbalance } => {
                write!(f, "Orderbook Bearish (Imbalance {:.2} < 0.7)", imbalance)
            }
            BlockReason::BullishOrderBook { imbalance } => {
                write!(f, "Orderbook Bullish (Imbalance {:.2} > 1.4)", imbalance)
            }
            BlockReason::HighFunding { rate } => {
                write!(f, "High Funding ({:.4}%)", rate * 100.0)
            }
            BlockReason::CounterTrend { adx, slope } => write!(
                f,
                "Strong Counter Trend (ADX {:.1}, slope {:+.2}%)",
                adx,
                slope * 100.0
            ),
        }
    }
}

/// Market inputs of the filter decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterInputs {
    /// Bid/ask size ratio over the top levels
    pub imbalance: f64,
    pub funding_rate: f64,
}

impl Default for FilterInputs {
    /// Values used when the fetches fail: balanced book, zero funding.
    fn default() -> Self {
        Self {
            imbalance: 1.0,
            funding_rate: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterVerdict {
    pub is_blocked: bool,
    /// First rule that blocked
    pub reason: Option<BlockReason>,
    /// Bonus added to the score of an unblocked candidate
    pub score_adjustment: f64,
    pub inputs: FilterInputs,
}

/// Applies the veto rules to scored candidates.
#[derive(Debug, Clone)]
pub struct FilterEngine {
    config: FilterConfig,
}

impl FilterEngine {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    /// Fetch order book and funding concurrently, then decide.
    #[instrument(skip(self, market, candles))]
    pub async fn evaluate(
        &self,
        market: &dyn MarketDataSource,
        symbol: &str,
        direction: Direction,
        tentative_score: f64,
        candles: Option<&[Bar]>,
    ) -> FilterVerdict {
        let (book, ticker) = tokio::join!(
            market.order_book(symbol, self.config.depth_levels),
            market.ticker(symbol),
        );

        let defaults = FilterInputs::default();
        let inputs = FilterInputs {
            imbalance: book
                .map(|b| b.imbalance(self.config.depth_levels))
                .unwrap_or(defaults.imbalance),
            funding_rate: ticker
                .map(|t| t.funding_rate)
                .unwrap_or(defaults.funding_rate),
        };

        let verdict = self.decide(direction, inputs, candles);
        debug!(
            symbol,
            %direction,
            tentative_score,
            imbalance = inputs.imbalance,
            funding = inputs.funding_rate,
            blocked = verdict.is_blocked,
            "Filter verdict"
        );
        verdict
    }

    /// Pure decision over already fetched inputs.
    pub fn decide(
        &self,
        direction: Direction,
        inputs: FilterInputs,
        candles: Option<&[Bar]>,
    ) -> FilterVerdict {
        let reason = self
            .order_book_block(direction, inputs.imbalance)
            .or_else(|| self.funding_block(direction, inputs.funding_rate))
            .or_else(|| candles.and_then(|c| self.trend_block(direction, c)));

        let score_adjustment = match (reason, direction) {
            (Some(_), _) => 0.0,
            (None, Direction::Long) if inputs.imbalance > self.config.long_bonus_imbalance => {
                self.config.imbalance_bonus
            }
            (None, Direction::Short) if inputs.imbalance < self.config.short_bonus_imbalance => {
                self.config.imbalance_bonus
            }
            _ => 0.0,
        };

        FilterVerdict {
            is_blocked: reason.is_some(),
            reason,
            score_adjustment,
            inputs,
        }
    }

    fn order_book_block(&self, direction: Direction, imbalance: f64) -> Option<BlockReason> {
        match direction {
            Direction::Long if imbalance < self.config.min_long_imbalance => {
                Some(BlockReason::BearishOrderBook { imbalance })
            }
            Direction::Short if imbalance > self.config.max_short_imbalance => {
                Some(BlockReason::BullishOrderBook { imbalance })
            }
            _ => None,
        }
    }

    // Shorts collect funding when it is positive; only longs are guarded.
    fn funding_block(&self, direction: Direction, rate: f64) -> Option<BlockReason> {
        (direction == Direction::Long && rate > self.config.max_long_funding)
            .then_some(BlockReason::HighFunding { rate })
    }

    fn trend_block(&self, direction: Direction, candles: &[Bar]) -> Option<BlockReason> {
        let period = self.config.trend_period;
        if candles.len() < 2 * period {
            return None;
        }
        let strength = trend_strength(candles, period);
        if strength.adx <= self.config.adx_threshold {
            return None;
        }
        let opposed = match direction {
            Direction::Long => strength.slope < 0.0,
            Direction::Short => strength.slope > 0.0,
        };
        opposed.then_some(BlockReason::CounterTrend {
            adx: strength.adx,
            slope: strength.slope,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{BookLevel, MockMarketDataSource, OrderBook, Ticker};
    use crate::indicators::test_support::bars_from_closes;

    // =========================================================================
    // Test Helpers
    // =========================================================================

    fn engine() -> FilterEngine {
        FilterEngine::new(FilterConfig::default())
    }

    fn inputs(imbalance: f64, funding_rate: f64) -> FilterInputs {
        FilterInputs {
            imbalance,
            funding_rate,
        }
    }

    fn uptrend() -> Vec<Bar> {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 * 1.01f64.powi(i)).collect();
        bars_from_closes(&closes)
    }

    // =========================================================================
    // Order Book Tests
    // =========================================================================

    #[test]
    fn test_thin_bids_block_long() {
        let verdict = engine().decide(Direction::Long, inputs(0.6, 0.0), None);
        assert!(verdict.is_blocked);
        assert!(verdict.reason.unwrap().to_string().contains("Imbalance"));
        assert!(verdict.reason.unwrap().to_string().contains("< 0.7"));
    }

    #[test]
    fn test_thin_asks_block_short() {
        let verdict = engine().decide(Direction::Short, inputs(1.5, 0.0), None);
        assert_eq!(
            verdict.reason,
            Some(BlockReason::BullishOrderBook { imbalance: 1.5 })
        );
    }

    #[test]
    fn test_imbalance_bonus() {
        let long = engine().decide(Direction::Long, inputs(1.3, 0.0), None);
        assert!(!long.is_blocked);
        assert_eq!(long.score_adjustment, 5.0);

        let short = engine().decide(Direction::Short, inputs(0.75, 0.0), None);
        assert_eq!(short.score_adjustment, 5.0);

        let neutral = engine().decide(Direction::Long, inputs(1.0, 0.0), None);
        assert_eq!(neutral.score_adjustment, 0.0);
    }

    // =========================================================================
    // Funding Tests
    // =========================================================================

    #[test]
    fn test_high_funding_blocks_long_only() {
        let long = engine().decide(Direction::Long, inputs(1.0, 0.05), None);
        assert!(matches!(long.reason, Some(BlockReason::HighFunding { .. })));

        let short = engine().decide(Direction::Short, inputs(1.0, 0.05), None);
        assert!(!short.is_blocked);
    }

    // =========================================================================
    // Trend Guard Tests
    // =========================================================================

    #[test]
    fn test_counter_trend_short_blocked() {
        let candles = uptrend();
        let verdict = engine().decide(Direction::Short, inputs(1.0, 0.0), Some(candles.as_slice()));
        assert!(matches!(
            verdict.reason,
            Some(BlockReason::CounterTrend { .. })
        ));

        let long = engine().decide(Direction::Long, inputs(1.0, 0.0), Some(candles.as_slice()));
        assert!(!long.is_blocked);
    }

    #[test]
    fn test_trend_guard_needs_two_periods() {
        let candles = uptrend();
        let verdict = engine().decide(Direction::Short, inputs(1.0, 0.0), Some(&candles[..27]));
        assert!(!verdict.is_blocked);
    }

    // =========================================================================
    // Network Tests
    // =========================================================================

    #[tokio::test]
    async fn test_evaluate_bid_30_ask_50_blocks_long() {
        let mut market = MockMarketDataSource::new();
        market.expect_order_book().returning(|_, _| {
            Some(OrderBook {
                bids: vec![BookLevel { price: 99.0, size: 30.0 }],
                asks: vec![BookLevel { price: 101.0, size: 50.0 }],
            })
        });
        market
            .expect_ticker()
            .returning(|s| Some(Ticker::new(s, 100.0)));

        let verdict = engine()
            .evaluate(&market, "XYZUSDT", Direction::Long, 90.0, None)
            .await;
        assert!(verdict.is_blocked);
        assert!(matches!(
            verdict.reason,
            Some(BlockReason::BearishOrderBook { .. })
        ));
    }

    #[tokio::test]
    async fn test_block_is_independent_of_score() {
        let mut market = MockMarketDataSource::new();
        market.expect_order_book().times(3).returning(|_, _| {
            Some(OrderBook {
                bids: vec![BookLevel { price: 99.0, size: 10.0 }],
                asks: vec![BookLevel { price: 101.0, size: 20.0 }],
            })
        });
        market
            .expect_ticker()
            .times(3)
            .returning(|s| Some(Ticker::new(s, 100.0)));

        let engine = engine();
        for score in [10.0, 85.0, 99.0] {
            let verdict = engine
                .evaluate(&market, "XYZUSDT", Direction::Long, score, None)
                .await;
            assert!(verdict.is_blocked, "score {} should not unblock", score);
        }
    }

    #[tokio::test]
    async fn test_evaluate_failures_degrade_to_neutral_inputs() {
        let mut market = MockMarketDataSource::new();
        market.expect_order_book().returning(|_, _| None);
        market.expect_ticker().returning(|_| None);

        let verdict = engine()
            .evaluate(&market, "XYZUSDT", Direction::Long, 90.0, None)
            .await;
        assert!(!verdict.is_blocked);
        assert_eq!(verdict.inputs, FilterInputs::default());
    }
}
