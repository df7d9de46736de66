//! Perp Signal Engine - Main Entry Point

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use perp_signal_engine::config::{Config, StrategyConfig};
use perp_signal_engine::exchange::{BitgetClient, MarketDataSource};
use perp_signal_engine::notify::{format_price, Notifier, TelegramNotifier};
use perp_signal_engine::persistence::{OpenInterestCache, SignalRegistry};
use perp_signal_engine::risk::{BiasEngine, FilterEngine};
use perp_signal_engine::scheduler::{
    spawn_observer, spawn_strategy, CycleMode, Services, StrategyRunner,
};
use perp_signal_engine::server;
use perp_signal_engine::strategy::{
    BasketStrategy, MomentumStrategy, ScalpStrategy, Strategy, StrategyKind, TrendStrategy,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Perp Signal Engine CLI
#[derive(Parser)]
#[command(name = "perp-signal-engine")]
#[command(version, about = "Signal pipeline for Bitget USDT perpetual futures")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all enabled strategies, the observer and the liveness listener
    Run,

    /// Show persisted signal registry and open-interest cache
    Status {
        /// Show every registry entry instead of the latest 20
        #[arg(short, long)]
        verbose: bool,
    },

    /// Run a single dry cycle of one strategy and print its candidates
    Scan {
        /// scalp, momentum, trend or basket
        #[arg(short, long)]
        strategy: StrategyKind,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging()?;

    let config = Config::load()?;
    config.validate()?;

    match cli.command {
        Some(Commands::Status { verbose }) => show_status(&config, verbose),
        Some(Commands::Scan { strategy }) => scan_once(&config, strategy).await,
        Some(Commands::Run) | None => run(config).await,
    }
}

async fn run(config: Config) -> Result<()> {
    info!("╔════════════════════════════════════════════════════════════╗");
    info!(
        "║            Perp Signal Engine v{}                       ║",
        env!("CARGO_PKG_VERSION")
    );
    info!("╚════════════════════════════════════════════════════════════╝");
    log_config(&config);

    if !config.telegram.is_configured() {
        warn!("⚠️  Telegram credentials missing. Alerts will only be logged.");
    }

    let services = build_services(&config)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Shutdown signal received");
        shutdown_tx.send(true).ok();
    });

    info!("🚀 Starting strategy tasks...");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let mut handles = Vec::new();
    if config.scalp.enabled {
        let runner = StrategyRunner::new(
            ScalpStrategy::new(),
            config.scalp.clone(),
            Arc::clone(&services),
        );
        handles.push(spawn_strategy(runner, shutdown_rx.clone()));
    }
    if config.momentum.enabled {
        let runner = StrategyRunner::new(
            MomentumStrategy::new(),
            config.momentum.clone(),
            Arc::clone(&services),
        );
        handles.push(spawn_strategy(runner, shutdown_rx.clone()));
    }
    if config.trend.enabled {
        let oi_cache = OpenInterestCache::persistent(&config.persistence.oi_cache_path);
        let runner = StrategyRunner::new(
            TrendStrategy::new(oi_cache),
            config.trend.clone(),
            Arc::clone(&services),
        );
        handles.push(spawn_strategy(runner, shutdown_rx.clone()));
    }
    if config.basket.enabled {
        let runner = StrategyRunner::new(
            BasketStrategy::new(),
            config.basket.clone(),
            Arc::clone(&services),
        );
        handles.push(spawn_strategy(runner, shutdown_rx.clone()));
    }
    if config.observer.enabled {
        handles.push(spawn_observer(
            config.observer.clone(),
            Arc::clone(&services.market),
            Arc::clone(&services.notifier),
            shutdown_rx.clone(),
        ));
    }
    if config.server.enabled {
        let port = config.server.port;
        let rx = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = server::serve(port, rx).await {
                error!("❌ [SERVER] {:#}", e);
            }
        }));
    }

    for handle in handles {
        if let Err(e) = handle.await {
            error!("❌ Task panicked: {}", e);
        }
    }

    if let Err(e) = services.registry.flush() {
        error!("❌ [PERSISTENCE] Failed to save signal registry: {}", e);
    }

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("👋 Perp Signal Engine shutdown complete");
    Ok(())
}

fn build_services(config: &Config) -> Result<Arc<Services>> {
    let market: Arc<dyn MarketDataSource> = Arc::new(BitgetClient::new(&config.exchange)?);
    let notifier: Arc<dyn Notifier> = Arc::new(TelegramNotifier::new(config.telegram.clone())?);
    let registry = Arc::new(SignalRegistry::open(&config.persistence.registry_path));
    info!(
        "📂 [PERSISTENCE] Signal registry loaded: {} symbols",
        registry.len()
    );

    Ok(Arc::new(Services {
        market,
        registry,
        notifier,
        bias: BiasEngine::new(config.bias.clone()),
        filters: FilterEngine::new(config.filters.clone()),
        scanning: config.scanning.clone(),
    }))
}

/// Run one dry cycle and print the candidates.
async fn scan_once(config: &Config, kind: StrategyKind) -> Result<()> {
    let services = build_services(config)?;
    match kind {
        StrategyKind::Scalp => {
            dry_cycle(ScalpStrategy::new(), config.scalp.clone(), services).await
        }
        StrategyKind::Momentum => {
            dry_cycle(MomentumStrategy::new(), config.momentum.clone(), services).await
        }
        StrategyKind::Trend => {
            // A dry run must not move the persisted open-interest reference.
            let strategy = TrendStrategy::new(OpenInterestCache::in_memory());
            dry_cycle(strategy, config.trend.clone(), services).await
        }
        StrategyKind::Basket => {
            dry_cycle(BasketStrategy::new(), config.basket.clone(), services).await
        }
    }
}

async fn dry_cycle<S: Strategy>(
    strategy: S,
    config: StrategyConfig,
    services: Arc<Services>,
) -> Result<()> {
    let kind = strategy.kind();
    let mut runner = StrategyRunner::new(strategy, config, services);
    let report = runner.run_cycle(Utc::now(), CycleMode::DryRun).await?;

    println!("\n{} {} dry run", kind.emoji(), kind);
    println!(
        "   ├─ Scanned:        {} ({} in cooldown)",
        report.scanned, report.skipped_recent
    );
    println!("   └─ Candidates:     {}", report.candidates.len());

    let mut candidates = report.candidates;
    candidates.sort_by(|a, b| b.adjusted_score.total_cmp(&a.adjusted_score));
    for c in &candidates {
        let selected = report.selected.iter().any(|s| s.symbol == c.symbol);
        println!(
            "\n   ┌─ {} {} {}score {:.1} (raw {:.1})",
            c.symbol,
            c.direction,
            if selected { "★ " } else { "" },
            c.adjusted_score,
            c.raw_score
        );
        println!("   ├─ Price:  {}", format_price(c.price));
        println!(
            "   ├─ Entry:  {}  SL {}  TP {} / {}",
            c.plan.entry, c.plan.stop_loss, c.plan.take_profit_1, c.plan.take_profit_2
        );
        println!("   └─ {}", c.details.join(" | "));
    }
    println!();
    Ok(())
}

/// Print the persisted state without touching the network.
fn show_status(config: &Config, verbose: bool) -> Result<()> {
    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║              SIGNAL ENGINE STATUS                          ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    let registry = SignalRegistry::open(&config.persistence.registry_path);
    let entries = registry.entries();
    println!(
        "\n📨 Signal Registry ({}): {} symbols",
        config.persistence.registry_path,
        entries.len()
    );
    let shown = if verbose { entries.len() } else { 20 };
    for (symbol, entry) in entries.iter().take(shown) {
        let when = entry
            .timestamp()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        println!(
            "   ├─ {:<14} {:<9} {:<5} {}",
            symbol, entry.source, entry.direction, when
        );
    }

    let oi_cache = OpenInterestCache::persistent(&config.persistence.oi_cache_path);
    let mut values: Vec<(String, f64)> = oi_cache.snapshot().into_iter().collect();
    values.sort_by(|a, b| a.0.cmp(&b.0));
    println!(
        "\n📈 Open Interest Cache ({}): {} symbols",
        config.persistence.oi_cache_path,
        values.len()
    );
    for (symbol, value) in &values {
        println!("   ├─ {:<14} {:.2}", symbol, value);
    }

    println!();
    Ok(())
}

/// Initialize logging to stdout and an hourly rolling file.
fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::hourly("logs", "perp-signal-engine.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    // Leak the guard to keep it alive for the program duration
    Box::leak(Box::new(_guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("perp_signal_engine=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .init();

    Ok(())
}

/// Log configuration on startup.
fn log_config(config: &Config) {
    info!("📋 Configuration:");
    info!("   Exchange: {} ({})", config.exchange.base_url, config.exchange.product_type);
    info!(
        "   Scanning: batches of {}, {}ms pause",
        config.scanning.batch_size, config.scanning.batch_pause_ms
    );
    for (kind, strategy) in [
        (StrategyKind::Scalp, &config.scalp),
        (StrategyKind::Momentum, &config.momentum),
        (StrategyKind::Trend, &config.trend),
        (StrategyKind::Basket, &config.basket),
    ] {
        if !strategy.enabled {
            info!("   {} {}: disabled", kind.emoji(), kind);
            continue;
        }
        info!(
            "   {} {} [{}]: every {}s, floor {}, cooldown {}m, bias {}{}",
            kind.emoji(),
            kind,
            strategy.thresholds_version,
            strategy.interval_secs,
            strategy.min_score,
            strategy.cooldown_mins,
            strategy.directional_bias,
            if strategy.bias_strict { " (strict)" } else { "" }
        );
    }
    info!(
        "   Observer: {}",
        if config.observer.enabled { "enabled" } else { "disabled" }
    );
}
