//! Triarb - Main Entry Point
//!
//! Scans one exchange for triangular arbitrage and trades the opportunities
//! it finds, until interrupted.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use triarb::common::traits::Notifier;
use triarb::config::load_config;
use triarb::{
    exchange, ArbitrageEstimator, ArbitrageOrchestrator, BalanceLedger, Exchange,
    MarketDataCache, NotificationSink, ScanScheduler,
};

/// CLI arguments for the application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Exchange to scan
    #[arg(value_enum)]
    exchange: Exchange,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Invalid exchange selectors exit here with usage and the valid values
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting triarb on {}", args.exchange);
    info!("Configuration file: {}", args.config);

    let config = load_config(Some(&args.config)).context("loading configuration")?;
    config.validate(args.exchange).context("validating configuration")?;

    let gateway = exchange::connect(args.exchange, &config)?;
    let timeout = Duration::from_secs(config.settings.request_timeout_seconds);

    let ledger = Arc::new(BalanceLedger::open(&config.ledger.path).await?);
    let history = ledger.history().await?;
    info!(
        path = %ledger.path().display(),
        entries = history.len(),
        "Ledger baseline: {} {}",
        ledger.baseline().await,
        config.trading.base_currency
    );

    let notifier: Arc<dyn Notifier> =
        Arc::new(NotificationSink::from_config(&config.notifications, timeout)?);

    let cache = Arc::new(MarketDataCache::new(gateway.clone()));
    let estimator = Arc::new(ArbitrageEstimator::new(args.exchange, &config.trading));
    let orchestrator = Arc::new(ArbitrageOrchestrator::new(
        gateway,
        &config.trading,
        ledger,
        notifier.clone(),
    ));

    let scheduler = ScanScheduler::new(
        config.universe.for_exchange(args.exchange),
        &config.trading,
        cache,
        estimator,
        orchestrator,
        notifier.clone(),
    );

    info!(assets = scheduler.triangles().len(), "Universe loaded");
    notifier
        .log(&format!("Starting to listen the {} markets", args.exchange))
        .await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut scan = tokio::spawn(async move { scheduler.run_forever(shutdown_rx).await });

    tokio::select! {
        joined = &mut scan => {
            joined.context("scan loop crashed")?;
            return Ok(());
        }
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Received shutdown signal, finishing the current batch");
            let _ = shutdown_tx.send(true);
        }
    }

    scan.await.context("scan loop crashed")?;
    info!("Stopped");
    Ok(())
}
