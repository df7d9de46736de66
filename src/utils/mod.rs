//! Shared utilities.

pub mod decimal;

pub use decimal::{distance_pct, price_decimals, to_price};
