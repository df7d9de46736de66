//! Durable record of the last alert per symbol.
//!
//! Entries are upserted on every accepted signal and never deleted; the
//! recency check compares the entry's age against a caller-supplied window.

use super::{load_json, save_json, StoreError};
use crate::strategy::{Direction, StrategyKind};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Last alert emitted for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Strategy label that emitted the alert
    pub source: String,
    pub direction: Direction,
    /// Milliseconds since the epoch
    pub ts: i64,
}

impl RegistryEntry {
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.ts).single()
    }
}

/// Signal deduplication registry shared by all strategy tasks.
#[derive(Debug)]
pub struct SignalRegistry {
    path: PathBuf,
    entries: RwLock<HashMap<String, RegistryEntry>>,
    /// Serializes file writes so the last write carries the latest snapshot
    write_lock: Mutex<()>,
}

impl SignalRegistry {
    /// Load the registry from `path`. An unreadable or corrupt file is
    /// logged and replaced by an empty registry.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries: HashMap<String, RegistryEntry> = match load_json(&path) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Signal registry unreadable, starting empty");
                HashMap::new()
            }
        };
        info!(path = %path.display(), entries = entries.len(), "Signal registry loaded");

        Self {
            path,
            entries: RwLock::new(entries),
            write_lock: Mutex::new(()),
        }
    }

    /// Record an alert now.
    pub fn register(&self, source: StrategyKind, symbol: &str, direction: Direction) {
        self.register_at(source, symbol, direction, Utc::now());
    }

    /// Record an alert at `now` and rewrite the file. A write failure is
    /// logged; the in-memory entry is kept either way.
    pub fn register_at(
        &self,
        source: StrategyKind,
        symbol: &str,
        direction: Direction,
        now: DateTime<Utc>,
    ) {
        let entry = RegistryEntry {
            source: source.label().to_string(),
            direction,
            ts: now.timestamp_millis(),
        };

        let _write = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let snapshot = {
            let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
            entries.insert(symbol.to_string(), entry);
            entries.clone()
        };
        debug!(symbol, %source, %direction, "Signal registered");

        if let Err(e) = save_json(&self.path, &snapshot) {
            warn!(error = %e, "Failed to persist signal registry");
        }
    }

    /// Whether `symbol` was alerted less than `window` ago.
    pub fn is_recently_signaled(&self, symbol: &str, window: Duration) -> bool {
        self.is_recently_signaled_at(symbol, window, Utc::now())
    }

    pub fn is_recently_signaled_at(
        &self,
        symbol: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> bool {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(symbol)
            .is_some_and(|e| now.timestamp_millis() - e.ts < window.num_milliseconds())
    }

    pub fn get(&self, symbol: &str) -> Option<RegistryEntry> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(symbol).cloned()
    }

    /// All entries, most recent first.
    pub fn entries(&self) -> Vec<(String, RegistryEntry)> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut all: Vec<(String, RegistryEntry)> = entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        all.sort_by(|a, b| b.1.ts.cmp(&a.1.ts));
        all
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rewrite the file from the in-memory state.
    pub fn flush(&self) -> Result<(), StoreError> {
        let _write = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let snapshot = self.entries.read().unwrap_or_else(|e| e.into_inner()).clone();
        save_json(&self.path, &snapshot)
    }
}
