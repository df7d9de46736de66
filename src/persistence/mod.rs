//! Whole-file JSON persistence for state that must survive restarts.
//!
//! - `registry`: last alert per symbol (deduplication and cooldowns)
//! - `oi_cache`: last observed open interest per symbol
//!
//! Files are loaded once at startup and rewritten in full after every
//! mutation (temp file + rename). A failed write is reported to the caller
//! and the in-memory state stays authoritative until the next write.

mod oi_cache;
mod registry;

pub use oi_cache::OpenInterestCache;
pub use registry::{RegistryEntry, SignalRegistry};

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("invalid JSON in {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to encode state: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Load a JSON document; a missing file yields the default value.
pub fn load_json<T>(path: &Path) -> Result<T, StoreError>
where
    T: DeserializeOwned + Default,
{
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(T::default()),
        Err(source) => {
            return Err(StoreError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    if raw.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(&raw).map_err(|source| StoreError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Rewrite a JSON document in full.
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let encoded = serde_json::to_string_pretty(value).map_err(StoreError::Encode)?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let write_err = |source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };
    std::fs::write(&tmp, encoded).map_err(write_err)?;
    std::fs::rename(&tmp, path).map_err(write_err)
}

#[cfg(test)]
pub(crate) fn temp_path(name: &str) -> PathBuf {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "pse-{}-{}-{}.json",
        std::process::id(),
        n,
        name
    ))
}
