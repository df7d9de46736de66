//! Market-quality index (MQI).
//!
//! A read-only cycle that grades overall market condition from BTC/ETH 1h
//! trend, cross-asset breadth, volatility and VWAP distance. The score is
//! smoothed over two samples and mapped to a state with dead zones; a
//! notify gate keeps reports rare. Produces no trading signals.

use crate::config::ObserverConfig;
use crate::exchange::{Granularity, MarketDataSource, Ticker};
use crate::indicators::{pct_change, vwap, Bar};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, info, instrument};

const CANDLE_LIMIT: usize = 5;
const MIN_BARS: usize = 2;
/// Damping applied to the raw 1h body move.
const TREND_DAMPING: f64 = 0.7;
const SMOOTHING_WINDOW: usize = 2;

const NEUTRAL_ZONE: (f64, f64) = (45.0, 55.0);
const OK_ZONE: (f64, f64) = (58.0, 72.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QualityState {
    Prime,
    Strong,
    Ok,
    Neutral,
    Weak,
    Danger,
}

impl QualityState {
    /// Map a smoothed score to a state. Scores inside a dead zone always map
    /// to that zone's state.
    pub fn classify(score: f64) -> Self {
        if (NEUTRAL_ZONE.0..=NEUTRAL_ZONE.1).contains(&score) {
            return QualityState::Neutral;
        }
        if (OK_ZONE.0..=OK_ZONE.1).contains(&score) {
            return QualityState::Ok;
        }
        match score {
            s if s >= 80.0 => QualityState::Prime,
            s if s >= 70.0 => QualityState::Strong,
            s if s >= 60.0 => QualityState::Ok,
            s if s >= 50.0 => QualityState::Neutral,
            s if s >= 40.0 => QualityState::Weak,
            _ => QualityState::Danger,
        }
    }
}

impl fmt::Display for QualityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            QualityState::Prime => "MARKET PRIME",
            QualityState::Strong => "MARKET STRONG",
            QualityState::Ok => "MARKET OK",
            QualityState::Neutral => "MARKET NEUTRAL",
            QualityState::Weak => "MARKET WEAK",
            QualityState::Danger => "MARKET DANGER",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrendLabel {
    Range,
    Momentum,
    Chop,
}

impl fmt::Display for TrendLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendLabel::Range => write!(f, "RANGE"),
            TrendLabel::Momentum => write!(f, "MOMENTUM"),
            TrendLabel::Chop => write!(f, "CHOP"),
        }
    }
}

/// Inputs of the score, all in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityMetrics {
    pub btc_trend_pct: f64,
    pub eth_trend_pct: f64,
    pub volatility_pct: f64,
    pub vwap_distance_pct: f64,
    /// Smoothed share of the breadth list moving with BTC
    pub breadth_pct: f64,
    pub trend_label: TrendLabel,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityReading {
    /// Score of this cycle alone
    pub raw_score: f64,
    /// Rounded mean of the last two raw scores
    pub score: f64,
    pub state: QualityState,
    pub metrics: QualityMetrics,
}

fn sign(x: f64) -> i8 {
    if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    }
}

/// Damped body move of the last bar, in percent.
fn body_trend(bars: &[Bar]) -> Option<f64> {
    let last = bars.last()?;
    pct_change(last.close, last.open).map(|p| p * TREND_DAMPING)
}

/// Share of `symbols` whose 24h change has the same sign as the reference,
/// pulled towards 50. Missing listing data yields 50.
pub fn breadth(tickers: &[Ticker], symbols: &[String], reference_change: f64) -> f64 {
    let reference = sign(reference_change);
    let (aligned, total) = symbols
        .iter()
        .filter_map(|s| tickers.iter().find(|t| &t.symbol == s))
        .filter(|t| t.change_24h.is_finite())
        .fold((0usize, 0usize), |(aligned, total), t| {
            let same = sign(t.change_24h) == reference;
            (aligned + usize::from(same), total + 1)
        });

    let raw = if total > 0 {
        aligned as f64 / total as f64 * 100.0
    } else {
        50.0
    };
    raw * 0.7 + 15.0
}

fn trend_label(btc: f64, eth: f64, volatility_pct: f64, breadth_pct: f64) -> TrendLabel {
    let (btc, eth) = (btc.abs(), eth.abs());
    if btc < 0.12 && eth < 0.12 && volatility_pct < 0.5 {
        TrendLabel::Range
    } else if btc > 0.45 && eth > 0.45 && breadth_pct > 65.0 {
        TrendLabel::Momentum
    } else {
        TrendLabel::Chop
    }
}

/// Derive the metrics from fetched data. `None` when either 1h series has
/// fewer than two bars.
pub fn compute_metrics(
    btc_1h: &[Bar],
    eth_1h: &[Bar],
    btc: &Ticker,
    tickers: &[Ticker],
    breadth_symbols: &[String],
) -> Option<QualityMetrics> {
    if btc_1h.len() < MIN_BARS || eth_1h.len() < MIN_BARS {
        return None;
    }
    let btc_trend_pct = body_trend(btc_1h)?;
    let eth_trend_pct = body_trend(eth_1h)?;
    let volatility_pct = btc.volatility_pct().unwrap_or(0.0);
    let vwap_distance_pct = vwap(btc_1h)
        .and_then(|v| pct_change(btc.last_price, v))
        .unwrap_or(0.0);
    let breadth_pct = breadth(tickers, breadth_symbols, btc.change_24h);

    Some(QualityMetrics {
        btc_trend_pct,
        eth_trend_pct,
        volatility_pct,
        vwap_distance_pct,
        breadth_pct,
        trend_label: trend_label(btc_trend_pct, eth_trend_pct, volatility_pct, breadth_pct),
    })
}

/// Unsmoothed 0-100 score.
pub fn raw_score(m: &QualityMetrics) -> f64 {
    let avg_trend = (m.btc_trend_pct.abs() + m.eth_trend_pct.abs()) / 2.0;
    let trend = match avg_trend {
        t if t >= 0.8 => 30.0,
        t if t >= 0.4 => 22.0,
        t if t >= 0.2 => 15.0,
        _ => 10.0,
    };

    let breadth = match m.breadth_pct {
        b if b >= 85.0 => 25.0,
        b if b >= 70.0 => 18.0,
        b if b >= 55.0 => 12.0,
        _ => 6.0,
    };

    let v = m.volatility_pct;
    let volatility = if (0.35..=1.6).contains(&v) {
        20.0
    } else if (0.2..=2.5).contains(&v) {
        14.0
    } else if v <= 4.0 {
        8.0
    } else {
        4.0
    };

    let vwap = match m.vwap_distance_pct.abs() {
        d if d <= 0.7 => 15.0,
        d if d <= 1.4 => 10.0,
        d if d <= 3.0 => 6.0,
        _ => 3.0,
    };

    let same_sign = sign(m.btc_trend_pct) == sign(m.eth_trend_pct);
    let coherence = match (same_sign, m.breadth_pct) {
        (true, b) if b >= 60.0 => 10.0,
        (true, b) if b >= 50.0 => 6.0,
        _ => 3.0,
    };

    let total: f64 = trend + breadth + volatility + vwap + coherence;
    total.clamp(0.0, 100.0).round()
}

/// Suppresses report flapping: a report needs a large enough score move,
/// a state confirmed on consecutive cycles and a minimum interval.
#[derive(Debug)]
pub struct NotifyGate {
    min_score_delta: f64,
    min_interval: Duration,
    required_confirmations: u32,
    last_sent: Option<(f64, DateTime<Utc>)>,
    candidate: Option<(QualityState, u32)>,
}

impl NotifyGate {
    pub fn new(config: &ObserverConfig) -> Self {
        Self {
            min_score_delta: config.min_score_delta,
            min_interval: Duration::minutes(config.min_send_interval_mins as i64),
            required_confirmations: config.required_confirmations,
            last_sent: None,
            candidate: None,
        }
    }

    /// Feed one reading; returns whether it should be reported.
    pub fn should_notify(&mut self, score: f64, state: QualityState, now: DateTime<Utc>) -> bool {
        let confirmations = match self.candidate {
            Some((s, n)) if s == state => n + 1,
            _ => 1,
        };
        self.candidate = Some((state, confirmations));

        let send = match self.last_sent {
            None => true,
            Some((last_score, last_at)) => {
                (score - last_score).abs() >= self.min_score_delta
                    && confirmations >= self.required_confirmations
                    && now - last_at >= self.min_interval
            }
        };

        if send {
            self.last_sent = Some((score, now));
            self.candidate = None;
        }
        send
    }
}

/// Observer state carried across cycles.
#[derive(Debug)]
pub struct MarketQualityObserver {
    config: ObserverConfig,
    history: VecDeque<f64>,
    gate: NotifyGate,
}

impl MarketQualityObserver {
    pub fn new(config: ObserverConfig) -> Self {
        let gate = NotifyGate::new(&config);
        Self {
            config,
            history: VecDeque::with_capacity(SMOOTHING_WINDOW),
            gate,
        }
    }

    /// Push a raw score and return the smoothed reading.
    pub fn record(&mut self, metrics: QualityMetrics) -> QualityReading {
        let raw = raw_score(&metrics);
        if self.history.len() == SMOOTHING_WINDOW {
            self.history.pop_front();
        }
        self.history.push_back(raw);
        let score = (self.history.iter().sum::<f64>() / self.history.len() as f64).round();

        QualityReading {
            raw_score: raw,
            score,
            state: QualityState::classify(score),
            metrics,
        }
    }

    /// Fetch inputs and compute this cycle's reading.
    #[instrument(skip(self, market))]
    pub async fn observe(&mut self, market: &dyn MarketDataSource) -> Option<QualityReading> {
        let (btc_1h, eth_1h, btc, tickers) = tokio::join!(
            market.candles("BTCUSDT", Granularity::OneHour, CANDLE_LIMIT),
            market.candles("ETHUSDT", Granularity::OneHour, CANDLE_LIMIT),
            market.ticker("BTCUSDT"),
            market.tickers(),
        );
        let Some(btc) = btc else {
            debug!("No BTC ticker, skipping quality cycle");
            return None;
        };
        let metrics = compute_metrics(&btc_1h, &eth_1h, &btc, &tickers, &self.config.breadth_symbols)?;
        let reading = self.record(metrics);

        info!(
            score = reading.score,
            state = %reading.state,
            btc_trend = reading.metrics.btc_trend_pct,
            eth_trend = reading.metrics.eth_trend_pct,
            breadth = reading.metrics.breadth_pct,
            "📡 [MQI] Market quality"
        );
        Some(reading)
    }

    /// Whether `reading` passes the notify gate at `now`.
    pub fn should_notify(&mut self, reading: &QualityReading, now: DateTime<Utc>) -> bool {
        self.gate.should_notify(reading.score, reading.state, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::MockMarketDataSource;

    // =========================================================================
    // Test Helpers
    // =========================================================================

    fn bar(open: f64, close: f64) -> Bar {
        Bar {
            open_time: 0,
            open,
            high: open.max(close) * 1.001,
            low: open.min(close) * 0.999,
            close,
            volume: 10.0,
        }
    }

    fn metrics() -> QualityMetrics {
        QualityMetrics {
            btc_trend_pct: 0.5,
            eth_trend_pct: 0.6,
            volatility_pct: 1.0,
            vwap_distance_pct: 0.3,
            breadth_pct: 75.0,
            trend_label: TrendLabel::Momentum,
        }
    }

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    // =========================================================================
    // Classification Tests
    // =========================================================================

    #[test]
    fn test_dead_zones() {
        assert_eq!(QualityState::classify(45.0), QualityState::Neutral);
        assert_eq!(QualityState::classify(55.0), QualityState::Neutral);
        assert_eq!(QualityState::classify(58.0), QualityState::Ok);
        assert_eq!(QualityState::classify(72.0), QualityState::Ok);
        assert_eq!(QualityState::classify(73.0), QualityState::Strong);
        assert_eq!(QualityState::classify(85.0), QualityState::Prime);
        assert_eq!(QualityState::classify(42.0), QualityState::Weak);
        assert_eq!(QualityState::classify(30.0), QualityState::Danger);
    }

    // =========================================================================
    // Score Tests
    // =========================================================================

    #[test]
    fn test_raw_score_components() {
        // trend 22 + breadth 18 + volatility 20 + vwap 15 + coherence 10
        assert_eq!(raw_score(&metrics()), 85.0);

        let mut m = metrics();
        m.eth_trend_pct = -0.6;
        m.volatility_pct = 5.0;
        m.vwap_distance_pct = -2.0;
        assert_eq!(raw_score(&m), 22.0 + 18.0 + 4.0 + 6.0 + 3.0);
    }

    #[test]
    fn test_breadth_smoothing() {
        let tickers = vec![
            Ticker::new("AUSDT", 1.0).with_change(0.02),
            Ticker::new("BUSDT", 1.0).with_change(-0.01),
        ];
        let list = symbols(&["AUSDT", "BUSDT", "MISSINGUSDT"]);
        assert_eq!(breadth(&tickers, &list, 0.01), 50.0 * 0.7 + 15.0);
        assert_eq!(breadth(&[], &list, 0.01), 50.0);
    }

    #[test]
    fn test_two_sample_smoothing() {
        let mut observer = MarketQualityObserver::new(ObserverConfig::default());
        let first = observer.record(metrics());
        assert_eq!(first.score, 85.0);

        let mut calm = metrics();
        calm.btc_trend_pct = 0.05;
        calm.eth_trend_pct = 0.05;
        calm.breadth_pct = 40.0;
        let second = observer.record(calm);
        // raw 10 + 6 + 20 + 15 + 3 = 54, mean with 85
        assert_eq!(second.raw_score, 54.0);
        assert_eq!(second.score, 70.0);

        let third = observer.record(calm);
        assert_eq!(third.score, 54.0);
    }

    #[test]
    fn test_metrics_need_two_bars() {
        let btc = Ticker::new("BTCUSDT", 100.0);
        let bars = vec![bar(100.0, 101.0)];
        assert!(compute_metrics(&bars, &bars, &btc, &[], &[]).is_none());
    }

    #[test]
    fn test_trend_label() {
        assert_eq!(trend_label(0.05, -0.1, 0.3, 50.0), TrendLabel::Range);
        assert_eq!(trend_label(0.5, -0.6, 2.0, 70.0), TrendLabel::Momentum);
        assert_eq!(trend_label(0.5, 0.2, 2.0, 70.0), TrendLabel::Chop);
    }

    // =========================================================================
    // Notify Gate Tests
    // =========================================================================

    #[test]
    fn test_first_observation_notifies() {
        let mut gate = NotifyGate::new(&ObserverConfig::default());
        assert!(gate.should_notify(60.0, QualityState::Ok, Utc::now()));
    }

    #[test]
    fn test_gate_needs_delta_confirmation_and_cooldown() {
        let mut gate = NotifyGate::new(&ObserverConfig::default());
        let t0 = Utc::now();
        assert!(gate.should_notify(60.0, QualityState::Ok, t0));

        // Large move, first sighting of the new state
        assert!(!gate.should_notify(82.0, QualityState::Prime, t0 + Duration::minutes(5)));
        // Confirmed, but inside the 12 minute cooldown
        assert!(!gate.should_notify(82.0, QualityState::Prime, t0 + Duration::minutes(10)));
        // Confirmed and cooled down
        assert!(gate.should_notify(83.0, QualityState::Prime, t0 + Duration::minutes(15)));
    }

    #[test]
    fn test_small_delta_never_notifies() {
        let mut gate = NotifyGate::new(&ObserverConfig::default());
        let t0 = Utc::now();
        gate.should_notify(60.0, QualityState::Ok, t0);

        for i in 1..6 {
            assert!(!gate.should_notify(
                64.0,
                QualityState::Ok,
                t0 + Duration::minutes(15 * i)
            ));
        }
    }

    #[test]
    fn test_flapping_state_resets_confirmation() {
        let mut gate = NotifyGate::new(&ObserverConfig::default());
        let t0 = Utc::now();
        gate.should_notify(50.0, QualityState::Neutral, t0);

        assert!(!gate.should_notify(80.0, QualityState::Prime, t0 + Duration::minutes(20)));
        assert!(!gate.should_notify(30.0, QualityState::Danger, t0 + Duration::minutes(25)));
        assert!(!gate.should_notify(80.0, QualityState::Prime, t0 + Duration::minutes(30)));
        assert!(gate.should_notify(80.0, QualityState::Prime, t0 + Duration::minutes(35)));
    }

    // =========================================================================
    // Network Tests
    // =========================================================================

    #[tokio::test]
    async fn test_observe_without_btc_ticker() {
        let mut market = MockMarketDataSource::new();
        market
            .expect_candles()
            .returning(|_, _, _| vec![bar(100.0, 101.0), bar(101.0, 102.0)]);
        market.expect_ticker().returning(|_| None);
        market.expect_tickers().returning(Vec::new);

        let mut observer = MarketQualityObserver::new(ObserverConfig::default());
        assert!(observer.observe(&market).await.is_none());
    }

    #[tokio::test]
    async fn test_observe_produces_reading() {
        let mut market = MockMarketDataSource::new();
        market
            .expect_candles()
            .returning(|_, _, _| vec![bar(100.0, 101.0), bar(101.0, 102.0)]);
        market.expect_ticker().returning(|s| {
            Some(Ticker::new(s, 102.0).with_range(103.0, 101.0).with_change(0.01))
        });
        market.expect_tickers().returning(Vec::new);

        let mut observer = MarketQualityObserver::new(ObserverConfig::default());
        let reading = observer.observe(&market).await.unwrap();
        assert!((0.0..=100.0).contains(&reading.score));
        assert_eq!(reading.metrics.breadth_pct, 50.0);
    }
}
