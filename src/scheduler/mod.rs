//! Per-strategy scan cycles and the background tasks that repeat them.
//!
//! Each strategy runs in its own task with its own universe, lifecycle
//! monitor and global-delay clock. A cycle:
//! 1. sends time-limit alerts for trades past the strategy's limit
//! 2. refreshes the universe when due
//! 3. computes the market bias
//! 4. evaluates symbols in concurrent batches (or one by one)
//! 5. selects, notifies, registers and starts timing the winners
//!
//! A cycle error is logged at the task boundary and the loop continues.

use crate::config::{ObserverConfig, ScanningConfig, StrategyConfig};
use crate::exchange::MarketDataSource;
use crate::market::Universe;
use crate::notify::{observer_report, online_message, signal_message, time_limit_message, Notifier};
use crate::observer::MarketQualityObserver;
use crate::persistence::SignalRegistry;
use crate::risk::{BiasEngine, FilterEngine, LifecycleMonitor, MarketBias};
use crate::strategy::{
    apply_score_limits, is_direction_allowed, select_candidates, ActionHint, Candidate, Strategy,
};
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use futures_util::future::join_all;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

/// Collaborators shared by every strategy task.
pub struct Services {
    pub market: Arc<dyn MarketDataSource>,
    pub registry: Arc<SignalRegistry>,
    pub notifier: Arc<dyn Notifier>,
    pub bias: BiasEngine,
    pub filters: FilterEngine,
    pub scanning: ScanningConfig,
}

/// Whether a cycle may notify and mutate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleMode {
    Live,
    /// Evaluate and select only
    DryRun,
}

/// Reasons for dropping a symbol during a cycle.
#[derive(Debug, Clone, Copy)]
enum RejectReason {
    NoData,
    Gated,
    ScoreLimits,
    Direction,
    Filtered,
    NoPlan,
}

#[derive(Debug, Default)]
struct RejectCounts {
    no_data: usize,
    gated: usize,
    score_limits: usize,
    direction: usize,
    filtered: usize,
    no_plan: usize,
}

impl RejectCounts {
    fn add(&mut self, reason: RejectReason) {
        match reason {
            RejectReason::NoData => self.no_data += 1,
            RejectReason::Gated => self.gated += 1,
            RejectReason::ScoreLimits => self.score_limits += 1,
            RejectReason::Direction => self.direction += 1,
            RejectReason::Filtered => self.filtered += 1,
            RejectReason::NoPlan => self.no_plan += 1,
        }
    }
}

/// Outcome of one cycle.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub scanned: usize,
    pub skipped_recent: usize,
    pub candidates: Vec<Candidate>,
    pub selected: Vec<Candidate>,
    pub expired: usize,
}

/// One strategy plus the state it carries across cycles.
pub struct StrategyRunner<S: Strategy> {
    strategy: S,
    config: StrategyConfig,
    services: Arc<Services>,
    universe: Universe,
    lifecycle: LifecycleMonitor,
    last_signal_at: Option<DateTime<Utc>>,
}

impl<S: Strategy> StrategyRunner<S> {
    pub fn new(strategy: S, config: StrategyConfig, services: Arc<Services>) -> Self {
        let universe = Universe::new(config.universe.clone());
        let lifecycle = LifecycleMonitor::new(Duration::minutes(config.time_limit_mins as i64));
        Self {
            strategy,
            config,
            services,
            universe,
            lifecycle,
            last_signal_at: None,
        }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> &LifecycleMonitor {
        &self.lifecycle
    }

    fn cooldown(&self) -> Duration {
        Duration::minutes(self.config.cooldown_mins as i64)
    }

    /// Run one full cycle at `now`.
    #[instrument(skip(self), fields(strategy = %self.strategy.kind()))]
    pub async fn run_cycle(&mut self, now: DateTime<Utc>, mode: CycleMode) -> Result<CycleReport> {
        let kind = self.strategy.kind();
        let mut report = CycleReport::default();

        if mode == CycleMode::Live {
            report.expired = self.send_time_limit_alerts(now).await;
        }

        let market = Arc::clone(&self.services.market);
        self.universe.refresh(market.as_ref(), now).await;
        anyhow::ensure!(
            !self.universe.symbols().is_empty(),
            "{} universe is empty",
            kind
        );

        let bias = self.services.bias.evaluate(market.as_ref()).await;
        info!(
            "🔍 [{}] Scan started: {} symbols, bias {}",
            kind,
            self.universe.symbols().len(),
            bias.regime
        );

        let cooldown = self.cooldown();
        let registry = Arc::clone(&self.services.registry);
        let symbols: Vec<String> = self
            .universe
            .symbols()
            .iter()
            .filter(|s| !registry.is_recently_signaled_at(s, cooldown, now))
            .cloned()
            .collect();
        report.skipped_recent = self.universe.symbols().len() - symbols.len();
        report.scanned = symbols.len();

        let mut rejected = RejectCounts::default();
        for result in self.evaluate_all(&symbols, &bias).await {
            match result {
                Ok(candidate) => report.candidates.push(candidate),
                Err(reason) => rejected.add(reason),
            }
        }

        info!(
            strategy = %kind,
            scanned = report.scanned,
            skipped_recent = report.skipped_recent,
            candidates = report.candidates.len(),
            rejected_no_data = rejected.no_data,
            rejected_gated = rejected.gated,
            rejected_score = rejected.score_limits,
            rejected_direction = rejected.direction,
            rejected_filtered = rejected.filtered,
            rejected_no_plan = rejected.no_plan,
            "📊 Scan summary"
        );

        report.selected = select_candidates(
            report.candidates.clone(),
            &self.config,
            self.last_signal_at,
            now,
            |symbol| registry.is_recently_signaled_at(symbol, cooldown, now),
        );

        if mode == CycleMode::Live {
            for candidate in &report.selected {
                self.emit(candidate, now).await;
            }
        }
        Ok(report)
    }

    async fn evaluate_all(
        &self,
        symbols: &[String],
        bias: &MarketBias,
    ) -> Vec<Result<Candidate, RejectReason>> {
        let scanning = &self.services.scanning;
        let mut results = Vec::with_capacity(symbols.len());

        if self.strategy.sequential() {
            for (i, symbol) in symbols.iter().enumerate() {
                if i > 0 {
                    tokio::time::sleep(std::time::Duration::from_millis(scanning.symbol_pause_ms))
                        .await;
                }
                results.push(self.evaluate_symbol(symbol, bias).await);
            }
            return results;
        }

        for (i, batch) in symbols.chunks(scanning.batch_size.max(1)).enumerate() {
            if i > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(scanning.batch_pause_ms)).await;
            }
            let batch_results =
                join_all(batch.iter().map(|s| self.evaluate_symbol(s, bias))).await;
            results.extend(batch_results);
        }
        results
    }

    /// Snapshot, score, limit, restrict, filter and plan one symbol.
    async fn evaluate_symbol(
        &self,
        symbol: &str,
        bias: &MarketBias,
    ) -> Result<Candidate, RejectReason> {
        let market = self.services.market.as_ref();
        let features = self
            .strategy
            .snapshot(market, symbol)
            .await
            .ok_or(RejectReason::NoData)?;

        let setup = self
            .strategy
            .score(&features, bias)
            .ok_or(RejectReason::Gated)?;
        let score = apply_score_limits(&self.config, setup.score).ok_or_else(|| {
            debug!(symbol, score = setup.score, "Score outside limits");
            RejectReason::ScoreLimits
        })?;
        if !is_direction_allowed(&self.config, setup.direction) {
            debug!(symbol, direction = %setup.direction, "Direction restricted");
            return Err(RejectReason::Direction);
        }

        let verdict = self
            .services
            .filters
            .evaluate(
                market,
                symbol,
                setup.direction,
                score,
                self.strategy.guard_window(&features),
            )
            .await;
        if let Some(reason) = verdict.reason {
            info!(
                "🚫 [{}] {} {} blocked: {}",
                self.strategy.kind(),
                symbol,
                setup.direction,
                reason
            );
            return Err(RejectReason::Filtered);
        }

        let plan = self
            .strategy
            .plan(&features, setup.direction)
            .ok_or(RejectReason::NoPlan)?;

        Ok(Candidate {
            strategy: self.strategy.kind(),
            symbol: symbol.to_string(),
            direction: setup.direction,
            price: self.strategy.price(&features),
            raw_score: setup.score,
            adjusted_score: score + verdict.score_adjustment,
            plan,
            details: self.strategy.details(&features),
        })
    }

    /// Notify, register and start timing one selected candidate.
    async fn emit(&mut self, candidate: &Candidate, now: DateTime<Utc>) {
        let hint = self.strategy.advises_action().then(|| {
            ActionHint::from_tracked(
                self.lifecycle.get(&candidate.symbol).map(|t| t.direction),
                candidate.direction,
            )
        });

        let text = signal_message(candidate, &self.config.thresholds_version, hint);
        self.services.notifier.send(&text).await;
        self.services.registry.register_at(
            candidate.strategy,
            &candidate.symbol,
            candidate.direction,
            now,
        );
        self.lifecycle
            .track(&candidate.symbol, candidate.direction, now);
        self.last_signal_at = Some(now);

        info!(
            "✅ [{}] Signal {} {} score {:.1} entry {}",
            candidate.strategy,
            candidate.symbol,
            candidate.direction,
            candidate.adjusted_score,
            candidate.plan.entry
        );
    }

    async fn send_time_limit_alerts(&mut self, now: DateTime<Utc>) -> usize {
        let expired = self.lifecycle.take_expired(now);
        let limit = self.lifecycle.time_limit();
        for trade in &expired {
            let text = time_limit_message(self.strategy.kind(), trade, limit);
            self.services.notifier.send(&text).await;
        }
        expired.len()
    }
}

/// Sleep for `interval` unless shutdown is signaled first. Returns `true`
/// when the task should stop.
async fn wait_or_shutdown(interval: std::time::Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return true;
    }
    tokio::select! {
        _ = tokio::time::sleep(interval) => false,
        changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
    }
}

/// Spawn the repeating task of one strategy.
pub fn spawn_strategy<S>(mut runner: StrategyRunner<S>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()>
where
    S: Strategy + 'static,
{
    tokio::spawn(async move {
        let kind = runner.strategy.kind();
        let interval = std::time::Duration::from_secs(runner.config.interval_secs);
        let online = online_message(kind, &runner.config.thresholds_version);
        runner.services.notifier.send(&online).await;
        info!("🟢 [{}] Task started, interval {:?}", kind, interval);

        loop {
            if *shutdown.borrow() {
                break;
            }
            match runner.run_cycle(Utc::now(), CycleMode::Live).await {
                Ok(report) => debug!(
                    strategy = %kind,
                    selected = report.selected.len(),
                    expired = report.expired,
                    "Cycle complete"
                ),
                Err(e) => error!("❌ [{}] Cycle failed: {:#}", kind, e),
            }
            if wait_or_shutdown(interval, &mut shutdown).await {
                break;
            }
        }
        info!("🛑 [{}] Task stopped", kind);
    })
}

/// Spawn the market-quality observer task.
pub fn spawn_observer(
    config: ObserverConfig,
    market: Arc<dyn MarketDataSource>,
    notifier: Arc<dyn Notifier>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let interval = std::time::Duration::from_secs(config.interval_secs);
        let mut observer = MarketQualityObserver::new(config);
        notifier
            .send("🛰️ *Market Quality Index* online")
            .await;

        loop {
            if *shutdown.borrow() {
                break;
            }
            match observer.observe(market.as_ref()).await {
                Some(reading) if observer.should_notify(&reading, Utc::now()) => {
                    notifier.send(&observer_report(&reading)).await;
                }
                Some(_) => {}
                None => warn!("⚠️ [MQI] Inputs unavailable, cycle skipped"),
            }
            if wait_or_shutdown(interval, &mut shutdown).await {
                break;
            }
        }
        info!("🛑 [MQI] Task stopped");
    })
}
