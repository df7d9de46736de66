//! Market views built on top of the raw data source.
//!
//! - `snapshot`: intraday feature snapshot shared by the 5m scanners
//! - `universe`: volume-ranked symbol lists with periodic refresh

mod snapshot;
mod universe;

pub use snapshot::{
    intraday_snapshot, volatility_or, IntradaySnapshot, FALLBACK_VOLATILITY_PCT,
    MIN_INTRADAY_BARS,
};
pub use universe::{select_universe, Universe};
