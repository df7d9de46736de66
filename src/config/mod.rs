//! Configuration management for the signal engine.
//!
//! Layering, lowest precedence first:
//! 1. Built-in defaults (`Config::default()`)
//! 2. Optional `config.toml` / `config.json` in the working directory
//! 3. `PSE__`-prefixed environment variables (`PSE__SCALP__MIN_SCORE=82`)
//! 4. Deployment variables: `TELEGRAM_BOT_TOKEN`, `TELEGRAM_CHAT_ID`, `PORT`,
//!    `<STRATEGY>_BIAS` and `<STRATEGY>_BIAS_STRICT`

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Large caps excluded from the dynamic universes and used for market breadth.
pub const MAJORS: [&str; 30] = [
    "BTCUSDT", "ETHUSDT", "BNBUSDT", "SOLUSDT", "XRPUSDT", "ADAUSDT", "DOGEUSDT", "AVAXUSDT",
    "DOTUSDT", "TRXUSDT", "LINKUSDT", "TONUSDT", "SUIUSDT", "APTUSDT", "NEARUSDT", "ARBUSDT",
    "OPUSDT", "INJUSDT", "ATOMUSDT", "AAVEUSDT", "LTCUSDT", "UNIUSDT", "FILUSDT", "XLMUSDT",
    "RUNEUSDT", "ALGOUSDT", "PEPEUSDT", "WIFUSDT", "TIAUSDT", "SEIUSDT",
];

/// Fixed watch list of the multi-timeframe trend strategy.
pub const TREND_SYMBOLS: [&str; 18] = [
    "BTCUSDT", "ETHUSDT", "BNBUSDT", "SOLUSDT", "XRPUSDT", "AVAXUSDT", "LINKUSDT", "DOTUSDT",
    "TRXUSDT", "ADAUSDT", "NEARUSDT", "ATOMUSDT", "OPUSDT", "INJUSDT", "UNIUSDT", "LTCUSDT",
    "TIAUSDT", "SEIUSDT",
];

/// Instruments followed by the basket strategy.
pub const BASKET_SYMBOLS: [&str; 3] = ["BTCUSDT", "ETHUSDT", "SOLUSDT"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Market data venue
    #[serde(default)]
    pub exchange: ExchangeConfig,
    /// Notification channel credentials
    #[serde(default)]
    pub telegram: TelegramConfig,
    /// Liveness listener
    #[serde(default)]
    pub server: ServerConfig,
    /// Durable state file locations
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Batch pacing for per-symbol fetches
    #[serde(default)]
    pub scanning: ScanningConfig,
    /// Market regime classification
    #[serde(default)]
    pub bias: BiasConfig,
    /// Order-book, funding and trend veto rules
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default = "StrategyConfig::scalp")]
    pub scalp: StrategyConfig,
    #[serde(default = "StrategyConfig::momentum")]
    pub momentum: StrategyConfig,
    #[serde(default = "StrategyConfig::trend")]
    pub trend: StrategyConfig,
    #[serde(default = "StrategyConfig::basket")]
    pub basket: StrategyConfig,
    /// Market-quality observer
    #[serde(default)]
    pub observer: ObserverConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    #[serde(default = "default_exchange_base_url")]
    pub base_url: String,
    #[serde(default = "default_product_type")]
    pub product_type: String,
    /// HTTP request timeout
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token; empty disables delivery
    #[serde(default)]
    pub bot_token: String,
    /// Target chat; empty disables delivery
    #[serde(default)]
    pub chat_id: String,
    #[serde(default = "default_telegram_api_url")]
    pub api_base_url: String,
}

impl TelegramConfig {
    pub fn is_configured(&self) -> bool {
        !self.bot_token.is_empty() && !self.chat_id.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Signal history (symbol -> last alert)
    #[serde(default = "default_registry_path")]
    pub registry_path: String,
    /// Last observed open interest per symbol
    #[serde(default = "default_oi_cache_path")]
    pub oi_cache_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanningConfig {
    /// Symbols fetched concurrently per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Pause between batches
    #[serde(default = "default_batch_pause_ms")]
    pub batch_pause_ms: u64,
    /// Pause between symbols for strategies that scan sequentially
    #[serde(default = "default_symbol_pause_ms")]
    pub symbol_pause_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiasConfig {
    /// Reference instrument for the market regime
    #[serde(default = "default_reference_symbol")]
    pub reference_symbol: String,
    /// Number of 4h candles in the VWAP window
    #[serde(default = "default_bias_candles")]
    pub candle_limit: usize,
    /// VWAP distance (%) that separates a trending regime from neutral
    #[serde(default = "default_vwap_threshold")]
    pub vwap_threshold_pct: f64,
    /// Score points added when aligned, removed when opposed
    #[serde(default = "default_bias_adjustment")]
    pub adjustment: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Order-book levels per side used for imbalance
    #[serde(default = "default_depth_levels")]
    pub depth_levels: usize,
    /// LONG is blocked below this bid/ask ratio
    #[serde(default = "default_min_long_imbalance")]
    pub min_long_imbalance: f64,
    /// SHORT is blocked above this bid/ask ratio
    #[serde(default = "default_max_short_imbalance")]
    pub max_short_imbalance: f64,
    /// LONG is blocked above this funding rate (ratio)
    #[serde(default = "default_max_long_funding")]
    pub max_long_funding: f64,
    /// ADX above which a counter-trend candidate is blocked
    #[serde(default = "default_adx_threshold")]
    pub adx_threshold: f64,
    #[serde(default = "default_trend_period")]
    pub trend_period: usize,
    /// LONG earns the bonus above this ratio
    #[serde(default = "default_long_bonus_imbalance")]
    pub long_bonus_imbalance: f64,
    /// SHORT earns the bonus below this ratio
    #[serde(default = "default_short_bonus_imbalance")]
    pub short_bonus_imbalance: f64,
    #[serde(default = "default_imbalance_bonus")]
    pub imbalance_bonus: f64,
}

/// Direction a strategy is allowed (or advised) to trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DirectionalBias {
    #[default]
    Both,
    Long,
    Short,
}

impl fmt::Display for DirectionalBias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectionalBias::Both => write!(f, "BOTH"),
            DirectionalBias::Long => write!(f, "LONG"),
            DirectionalBias::Short => write!(f, "SHORT"),
        }
    }
}

impl FromStr for DirectionalBias {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "BOTH" | "" => Ok(DirectionalBias::Both),
            "LONG" => Ok(DirectionalBias::Long),
            "SHORT" => Ok(DirectionalBias::Short),
            other => anyhow::bail!("unknown directional bias '{}'", other),
        }
    }
}

/// Symbol universe of one strategy.
///
/// A non-empty `symbols` list is used as-is; otherwise the universe is
/// rebuilt from the all-tickers listing every `refresh_mins`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniverseConfig {
    #[serde(default)]
    pub symbols: Vec<String>,
    /// Minimum 24h USDT turnover
    #[serde(default)]
    pub min_usdt_volume: f64,
    /// Keep only the top N by volume
    #[serde(default)]
    pub max_symbols: usize,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default = "default_universe_refresh")]
    pub refresh_mins: u64,
}

impl UniverseConfig {
    fn fixed(symbols: &[&str]) -> Self {
        Self {
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            min_usdt_volume: 0.0,
            max_symbols: symbols.len(),
            exclude: Vec::new(),
            refresh_mins: default_universe_refresh(),
        }
    }

    fn dynamic(min_usdt_volume: f64, max_symbols: usize) -> Self {
        Self {
            symbols: Vec::new(),
            min_usdt_volume,
            max_symbols,
            exclude: MAJORS.iter().map(|s| s.to_string()).collect(),
            refresh_mins: default_universe_refresh(),
        }
    }

    pub fn is_dynamic(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Per-strategy thresholds and pacing.
///
/// `thresholds_version` labels the floor/ceiling set in alerts and logs so
/// a change of thresholds is traceable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub enabled: bool,
    pub thresholds_version: String,
    /// Seconds between cycles
    pub interval_secs: u64,
    /// Minimum score (after bias) to keep a candidate
    pub min_score: f64,
    /// Candidates scoring above this are rejected as traps
    pub max_score: Option<f64>,
    /// Scores are clamped to this value before the floor check
    pub score_cap: Option<f64>,
    /// Registry window: a symbol alerted within it is skipped
    pub cooldown_mins: u64,
    /// Minimum time between two alerts of this strategy
    pub global_delay_mins: u64,
    /// Alerts per cycle
    pub max_signals: usize,
    /// Tracked trades older than this get a close/reassess alert
    pub time_limit_mins: u64,
    pub directional_bias: DirectionalBias,
    /// Reject the opposite direction instead of only advising against it
    pub bias_strict: bool,
    pub universe: UniverseConfig,
}

impl StrategyConfig {
    /// Fast 5m VWAP break-outs on liquid altcoins.
    pub fn scalp() -> Self {
        Self {
            enabled: true,
            thresholds_version: "scalp-4.1".to_string(),
            interval_secs: 120,
            min_score: 80.0,
            max_score: Some(96.0),
            score_cap: None,
            cooldown_mins: 45,
            global_delay_mins: 30,
            max_signals: 1,
            time_limit_mins: 120,
            directional_bias: DirectionalBias::Both,
            bias_strict: false,
            universe: UniverseConfig::dynamic(3_000_000.0, 40),
        }
    }

    /// Intraday volume impulses with linear scoring.
    pub fn momentum() -> Self {
        Self {
            enabled: true,
            thresholds_version: "momentum-2.0".to_string(),
            interval_secs: 300,
            min_score: 85.0,
            max_score: None,
            score_cap: None,
            cooldown_mins: 24 * 60,
            global_delay_mins: 30,
            max_signals: 1,
            time_limit_mins: 8 * 60,
            directional_bias: DirectionalBias::Both,
            bias_strict: false,
            universe: UniverseConfig::dynamic(5_000_000.0, 50),
        }
    }

    /// Multi-timeframe swing setups on large caps.
    pub fn trend() -> Self {
        Self {
            enabled: true,
            thresholds_version: "trend-1.5".to_string(),
            interval_secs: 15 * 60,
            min_score: 65.0,
            max_score: None,
            score_cap: None,
            cooldown_mins: 24 * 60,
            global_delay_mins: 0,
            max_signals: 1,
            time_limit_mins: 48 * 60,
            directional_bias: DirectionalBias::Both,
            bias_strict: false,
            universe: UniverseConfig::fixed(&TREND_SYMBOLS),
        }
    }

    /// BTC/ETH/SOL basket, up to two alerts per cycle.
    pub fn basket() -> Self {
        Self {
            enabled: true,
            thresholds_version: "basket-3.2".to_string(),
            interval_secs: 300,
            min_score: 80.0,
            max_score: None,
            score_cap: Some(95.0),
            cooldown_mins: 45,
            global_delay_mins: 0,
            max_signals: 2,
            time_limit_mins: 24 * 60,
            directional_bias: DirectionalBias::Both,
            bias_strict: false,
            universe: UniverseConfig::fixed(&BASKET_SYMBOLS),
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        anyhow::ensure!(self.interval_secs > 0, "{}: interval_secs must be > 0", name);
        anyhow::ensure!(self.max_signals >= 1, "{}: max_signals must be >= 1", name);
        anyhow::ensure!(
            self.time_limit_mins > 0,
            "{}: time_limit_mins must be > 0",
            name
        );
        if let Some(max) = self.max_score {
            anyhow::ensure!(
                max > self.min_score,
                "{}: max_score must be above min_score",
                name
            );
        }
        if let Some(cap) = self.score_cap {
            anyhow::ensure!(
                cap >= self.min_score,
                "{}: score_cap must be >= min_score",
                name
            );
        }
        anyhow::ensure!(
            !self.universe.is_dynamic() || self.universe.max_symbols > 0,
            "{}: dynamic universe needs max_symbols > 0",
            name
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObserverConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_observer_interval")]
    pub interval_secs: u64,
    /// Minimum smoothed-score change before a new report
    #[serde(default = "default_min_score_delta")]
    pub min_score_delta: f64,
    /// Minimum time between two reports
    #[serde(default = "default_min_send_interval")]
    pub min_send_interval_mins: u64,
    /// Consecutive cycles a new state must be seen
    #[serde(default = "default_required_confirmations")]
    pub required_confirmations: u32,
    /// Instruments whose 24h change is compared with BTC for breadth
    #[serde(default = "default_breadth_symbols")]
    pub breadth_symbols: Vec<String>,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_exchange_base_url() -> String {
    "https://api.bitget.com".to_string()
}

fn default_product_type() -> String {
    "usdt-futures".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_registry_path() -> String {
    "signals_history.json".to_string()
}

fn default_oi_cache_path() -> String {
    "oi_cache.json".to_string()
}

fn default_batch_size() -> usize {
    5
}

fn default_batch_pause_ms() -> u64 {
    200
}

fn default_symbol_pause_ms() -> u64 {
    500
}

fn default_reference_symbol() -> String {
    "BTCUSDT".to_string()
}

fn default_bias_candles() -> usize {
    24 // 4 days of 4h candles
}

fn default_vwap_threshold() -> f64 {
    0.5
}

fn default_bias_adjustment() -> f64 {
    5.0
}

fn default_depth_levels() -> usize {
    10
}

fn default_min_long_imbalance() -> f64 {
    0.7
}

fn default_max_short_imbalance() -> f64 {
    1.4
}

fn default_max_long_funding() -> f64 {
    0.03
}

fn default_adx_threshold() -> f64 {
    25.0
}

fn default_trend_period() -> usize {
    14
}

fn default_long_bonus_imbalance() -> f64 {
    1.2
}

fn default_short_bonus_imbalance() -> f64 {
    0.8
}

fn default_imbalance_bonus() -> f64 {
    5.0
}

fn default_universe_refresh() -> u64 {
    60
}

fn default_observer_interval() -> u64 {
    300
}

fn default_min_score_delta() -> f64 {
    7.0
}

fn default_min_send_interval() -> u64 {
    12
}

fn default_required_confirmations() -> u32 {
    2
}

fn default_breadth_symbols() -> Vec<String> {
    MAJORS.iter().map(|s| s.to_string()).collect()
}

impl Config {
    /// Load configuration from defaults, config files and the environment.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults =
            serde_json::to_string(&Config::default()).context("Failed to encode defaults")?;

        let config = config::Config::builder()
            .add_source(config::File::from_str(&defaults, config::FileFormat::Json))
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .prefix("PSE")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let mut config: Config = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply the plain deployment variables on top of the layered config.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("TELEGRAM_BOT_TOKEN").filter(|v| !v.is_empty()) {
            self.telegram.bot_token = token;
        }
        if let Some(chat_id) = lookup("TELEGRAM_CHAT_ID").filter(|v| !v.is_empty()) {
            self.telegram.chat_id = chat_id;
        }
        if let Some(port) = lookup("PORT").filter(|v| !v.is_empty()) {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid PORT '{}'", port))?;
        }

        for (prefix, strategy) in [
            ("SCALP", &mut self.scalp),
            ("MOMENTUM", &mut self.momentum),
            ("TREND", &mut self.trend),
            ("BASKET", &mut self.basket),
        ] {
            if let Some(bias) = lookup(&format!("{}_BIAS", prefix)) {
                strategy.directional_bias = bias
                    .parse()
                    .with_context(|| format!("Invalid {}_BIAS", prefix))?;
            }
            if let Some(strict) = lookup(&format!("{}_BIAS_STRICT", prefix)) {
                strategy.bias_strict = strict.trim().eq_ignore_ascii_case("true");
            }
        }

        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.scanning.batch_size >= 1,
            "scanning.batch_size must be >= 1"
        );

        anyhow::ensure!(
            self.bias.vwap_threshold_pct >= 0.0,
            "bias.vwap_threshold_pct must be >= 0"
        );

        anyhow::ensure!(
            self.filters.min_long_imbalance < self.filters.max_short_imbalance,
            "filters.min_long_imbalance must be below max_short_imbalance"
        );

        anyhow::ensure!(
            self.filters.trend_period >= 2,
            "filters.trend_period must be >= 2"
        );

        anyhow::ensure!(
            self.observer.interval_secs > 0 && self.observer.required_confirmations >= 1,
            "observer interval and confirmations must be positive"
        );

        self.scalp.validate("scalp")?;
        self.momentum.validate("momentum")?;
        self.trend.validate("trend")?;
        self.basket.validate("basket")?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exchange: ExchangeConfig::default(),
            telegram: TelegramConfig::default(),
            server: ServerConfig::default(),
            persistence: PersistenceConfig::default(),
            scanning: ScanningConfig::default(),
            bias: BiasConfig::default(),
            filters: FilterConfig::default(),
            scalp: StrategyConfig::scalp(),
            momentum: StrategyConfig::momentum(),
            trend: StrategyConfig::trend(),
            basket: StrategyConfig::basket(),
            observer: ObserverConfig::default(),
        }
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            base_url: default_exchange_base_url(),
            product_type: default_product_type(),
            timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: String::new(),
            api_base_url: default_telegram_api_url(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_port(),
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            registry_path: default_registry_path(),
            oi_cache_path: default_oi_cache_path(),
        }
    }
}

impl Default for ScanningConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_pause_ms: default_batch_pause_ms(),
            symbol_pause_ms: default_symbol_pause_ms(),
        }
    }
}

impl Default for BiasConfig {
    fn default() -> Self {
        Self {
            reference_symbol: default_reference_symbol(),
            candle_limit: default_bias_candles(),
            vwap_threshold_pct: default_vwap_threshold(),
            adjustment: default_bias_adjustment(),
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            depth_levels: default_depth_levels(),
            min_long_imbalance: default_min_long_imbalance(),
            max_short_imbalance: default_max_short_imbalance(),
            max_long_funding: default_max_long_funding(),
            adx_threshold: default_adx_threshold(),
            trend_period: default_trend_period(),
            long_bonus_imbalance: default_long_bonus_imbalance(),
            short_bonus_imbalance: default_short_bonus_imbalance(),
            imbalance_bonus: default_imbalance_bonus(),
        }
    }
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_observer_interval(),
            min_score_delta: default_min_score_delta(),
            min_send_interval_mins: default_min_send_interval(),
            required_confirmations: default_required_confirmations(),
            breadth_symbols: default_breadth_symbols(),
        }
    }
}
