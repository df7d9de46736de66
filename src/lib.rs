//! # Perp Signal Engine
//!
//! Multi-strategy signal pipeline for Bitget USDT-margined perpetual futures.
//! Scans instruments on a schedule, scores setups with technical indicators,
//! vetoes them against order-book and funding conditions, and pushes trade
//! plans to Telegram. It never places orders.
//!
//! ## Architecture
//!
//! - `config`: Layered configuration and validation
//! - `exchange`: Bitget public market-data client
//! - `indicators`: Pure technical indicators over OHLCV history
//! - `market`: Feature snapshots and per-strategy symbol universes
//! - `strategy`: Scalp, momentum, trend and basket scorers, trade plans, selection
//! - `risk`: Market bias, veto filters and trade lifecycle timing
//! - `persistence`: Signal registry and open-interest cache (JSON files)
//! - `notify`: Telegram delivery and message formatting
//! - `observer`: Market-quality index reports
//! - `scheduler`: Per-strategy scan cycles and background tasks
//! - `server`: Liveness listener
//! - `utils`: Shared utilities and decimal arithmetic

pub mod config;
pub mod exchange;
pub mod indicators;
pub mod market;
pub mod notify;
pub mod observer;
pub mod persistence;
pub mod risk;
pub mod scheduler;
pub mod server;
pub mod strategy;
pub mod utils;

pub use config::Config;
