//! Last observed open interest per symbol.
//!
//! Used to turn a single open-interest reading into a change since the
//! previous scan. The trend scanner keeps the cache on disk so the first
//! scan after a restart still has a reference; the basket scanner keeps it
//! in memory.

use super::{load_json, save_json};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug)]
pub struct OpenInterestCache {
    path: Option<PathBuf>,
    values: Mutex<HashMap<String, f64>>,
}

impl OpenInterestCache {
    /// Cache backed by a JSON file. Unreadable files start empty.
    pub fn persistent(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let values = load_json(&path).unwrap_or_else(|e| {
            warn!(error = %e, "Open interest cache unreadable, starting empty");
            HashMap::new()
        });
        Self {
            path: Some(path),
            values: Mutex::new(values),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            values: Mutex::new(HashMap::new()),
        }
    }

    /// Record the current reading and return the percent change against
    /// the previous one. Non-positive readings are ignored.
    pub fn observe(&self, symbol: &str, current: Option<f64>) -> Option<f64> {
        let current = current.filter(|v| *v > 0.0 && v.is_finite())?;

        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        let delta = values
            .insert(symbol.to_string(), current)
            .filter(|prev| *prev > 0.0)
            .map(|prev| (current - prev) / prev * 100.0);
        debug!(symbol, current, delta = ?delta, "Open interest observed");

        if let Some(path) = &self.path {
            if let Err(e) = save_json(path, &*values) {
                warn!(error = %e, "Failed to persist open interest cache");
            }
        }
        delta
    }

    pub fn get(&self, symbol: &str) -> Option<f64> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.get(symbol).copied()
    }

    pub fn snapshot(&self) -> HashMap<String, f64> {
        self.values.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::temp_path;

    #[test]
    fn test_first_observation_has_no_delta() {
        let cache = OpenInterestCache::in_memory();
        assert_eq!(cache.observe("BTCUSDT", Some(1000.0)), None);
        assert_eq!(cache.get("BTCUSDT"), Some(1000.0));
    }

    #[test]
    fn test_delta_percent() {
        let cache = OpenInterestCache::in_memory();
        cache.observe("BTCUSDT", Some(1000.0));
        let delta = cache.observe("BTCUSDT", Some(1100.0)).unwrap();
        assert!((delta - 10.0).abs() < 1e-9);

        let delta = cache.observe("BTCUSDT", Some(990.0)).unwrap();
        assert!((delta + 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_reading_keeps_previous() {
        let cache = OpenInterestCache::in_memory();
        cache.observe("ETHUSDT", Some(500.0));
        assert_eq!(cache.observe("ETHUSDT", None), None);
        assert_eq!(cache.observe("ETHUSDT", Some(0.0)), None);
        assert_eq!(cache.get("ETHUSDT"), Some(500.0));
    }

    #[test]
    fn test_persistent_survives_reload() {
        let path = temp_path("oi-cache");
        {
            let cache = OpenInterestCache::persistent(&path);
            cache.observe("SOLUSDT", Some(200.0));
        }

        let cache = OpenInterestCache::persistent(&path);
        let delta = cache.observe("SOLUSDT", Some(250.0)).unwrap();
        assert!((delta - 25.0).abs() < 1e-9);
        assert_eq!(cache.snapshot().len(), 1);

        std::fs::remove_file(&path).ok();
    }
}
