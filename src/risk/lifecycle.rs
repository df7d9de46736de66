//! Time-limit tracking of alerted trades.
//!
//! Each strategy owns one monitor. A tracked trade older than the
//! strategy's time limit yields exactly one close/reassess alert and is
//! forgotten. State is in memory only and does not survive a restart.

use crate::strategy::Direction;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

/// An alerted trade being timed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveTrade {
    pub symbol: String,
    pub direction: Direction,
    pub opened_at: DateTime<Utc>,
}

impl ActiveTrade {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.opened_at
    }
}

#[derive(Debug)]
pub struct LifecycleMonitor {
    time_limit: Duration,
    trades: HashMap<String, ActiveTrade>,
}

impl LifecycleMonitor {
    pub fn new(time_limit: Duration) -> Self {
        Self {
            time_limit,
            trades: HashMap::new(),
        }
    }

    pub fn time_limit(&self) -> Duration {
        self.time_limit
    }

    /// Start (or restart) timing a trade.
    pub fn track(&mut self, symbol: &str, direction: Direction, now: DateTime<Utc>) {
        let trade = ActiveTrade {
            symbol: symbol.to_string(),
            direction,
            opened_at: now,
        };
        if let Some(previous) = self.trades.insert(symbol.to_string(), trade) {
            debug!(
                symbol,
                previous = %previous.direction,
                %direction,
                "Restarted trade timer"
            );
        }
    }

    pub fn get(&self, symbol: &str) -> Option<&ActiveTrade> {
        self.trades.get(symbol)
    }

    /// Remove and return every trade whose age reached the time limit,
    /// oldest first.
    pub fn take_expired(&mut self, now: DateTime<Utc>) -> Vec<ActiveTrade> {
        let limit = self.time_limit;
        let expired_symbols: Vec<String> = self
            .trades
            .values()
            .filter(|t| t.age(now) >= limit)
            .map(|t| t.symbol.clone())
            .collect();

        let mut expired: Vec<ActiveTrade> = expired_symbols
            .iter()
            .filter_map(|s| self.trades.remove(s))
            .collect();
        expired.sort_by_key(|t| t.opened_at);

        for trade in &expired {
            info!(
                symbol = %trade.symbol,
                direction = %trade.direction,
                age_mins = trade.age(now).num_minutes(),
                "Trade reached time limit"
            );
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }
}
