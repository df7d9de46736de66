//! Symbol universe selection.
//!
//! Fixed universes are used as configured. Dynamic universes are rebuilt
//! from the all-tickers listing: USDT contracts above a turnover floor,
//! minus the exclusion list, ranked by volume and truncated.

use crate::config::UniverseConfig;
use crate::exchange::{MarketDataSource, Ticker};
use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument, warn};

/// Reasons for leaving a ticker out of a dynamic universe.
#[derive(Debug, Clone, Copy)]
enum RejectReason {
    NotUsdt,
    Excluded,
    LowVolume,
    NoPrice,
}

fn qualify(ticker: &Ticker, config: &UniverseConfig) -> Result<(), RejectReason> {
    if !ticker.symbol.ends_with("USDT") {
        return Err(RejectReason::NotUsdt);
    }
    if config.exclude.iter().any(|s| s == &ticker.symbol) {
        return Err(RejectReason::Excluded);
    }
    if ticker.last_price <= 0.0 {
        return Err(RejectReason::NoPrice);
    }
    if ticker.usdt_volume <= config.min_usdt_volume {
        return Err(RejectReason::LowVolume);
    }
    Ok(())
}

/// Rank `tickers` into a universe, highest 24h USDT volume first.
pub fn select_universe(tickers: &[Ticker], config: &UniverseConfig) -> Vec<String> {
    let mut rejected_not_usdt = 0usize;
    let mut rejected_excluded = 0usize;
    let mut rejected_low_volume = 0usize;
    let mut rejected_no_price = 0usize;

    let mut qualified: Vec<&Ticker> = tickers
        .iter()
        .filter(|t| match qualify(t, config) {
            Ok(()) => true,
            Err(reason) => {
                match reason {
                    RejectReason::NotUsdt => rejected_not_usdt += 1,
                    RejectReason::Excluded => rejected_excluded += 1,
                    RejectReason::LowVolume => rejected_low_volume += 1,
                    RejectReason::NoPrice => rejected_no_price += 1,
                }
                false
            }
        })
        .collect();

    qualified.sort_by(|a, b| b.usdt_volume.total_cmp(&a.usdt_volume));
    qualified.truncate(config.max_symbols);

    info!(
        total_scanned = tickers.len(),
        selected = qualified.len(),
        rejected_not_usdt,
        rejected_excluded,
        rejected_low_volume,
        rejected_no_price,
        "Universe selection complete"
    );

    qualified.into_iter().map(|t| t.symbol.clone()).collect()
}

/// Symbol list of one strategy, refreshed on a fixed period.
#[derive(Debug)]
pub struct Universe {
    config: UniverseConfig,
    symbols: Vec<String>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl Universe {
    pub fn new(config: UniverseConfig) -> Self {
        let symbols = if config.is_dynamic() {
            Vec::new()
        } else {
            config.symbols.clone()
        };
        Self {
            config,
            symbols,
            refreshed_at: None,
        }
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Whether a dynamic universe is due for a rebuild at `now`.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        if !self.config.is_dynamic() {
            return false;
        }
        match self.refreshed_at {
            None => true,
            Some(at) => now - at >= Duration::minutes(self.config.refresh_mins as i64),
        }
    }

    /// Rebuild a dynamic universe when due. An empty listing keeps the
    /// previous symbols.
    #[instrument(skip(self, market))]
    pub async fn refresh(&mut self, market: &dyn MarketDataSource, now: DateTime<Utc>) {
        if !self.needs_refresh(now) {
            return;
        }
        let tickers = market.tickers().await;
        self.apply(&tickers, now);
    }

    fn apply(&mut self, tickers: &[Ticker], now: DateTime<Utc>) {
        let selected = select_universe(tickers, &self.config);
        if selected.is_empty() {
            warn!(
                kept = self.symbols.len(),
                "Universe refresh returned no symbols, keeping previous list"
            );
            return;
        }
        self.symbols = selected;
        self.refreshed_at = Some(now);
    }
}
