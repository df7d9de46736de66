//! Cross-strategy risk services.
//!
//! - `bias`: market regime from a reference instrument (score nudge)
//! - `filters`: order-book, funding and trend vetoes (plus a small bonus)
//! - `lifecycle`: time limits on alerted trades

mod bias;
mod filters;
mod lifecycle;

pub use bias::{classify, BiasEngine, MarketBias, Regime};
pub use filters::{BlockReason, FilterEngine, FilterInputs, FilterVerdict};
pub use lifecycle::{ActiveTrade, LifecycleMonitor};
