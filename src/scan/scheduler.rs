//! Batched scan of the asset universe
//!
//! Each batch spawns one task per asset, waits for all of them, then flushes
//! the market data cache before the next batch starts. A shutdown request is
//! only honoured between batches, so runs already started reach a terminal
//! state.

use futures_util::future::join_all;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::common::traits::Notifier;
use crate::common::types::Exchange;
use crate::config::types::TradingConfig;
use crate::execution::{ArbitrageOrchestrator, RunStatus};
use crate::market::MarketDataCache;
use crate::strategy::{ArbitrageEstimate, ArbitrageEstimator, Direction, Triangle};

/// What a worker did with one asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetOutcome {
    /// Estimates were computed and none passed the threshold
    NoOpportunity,
    /// A run was started; `None` when it could not be measured
    Ran {
        direction: Direction,
        status: Option<RunStatus>,
    },
    /// Market data could not be fetched this cycle
    Skipped(String),
}

/// Tally of one full pass over the universe
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub batches: usize,
    pub evaluated: usize,
    pub triggered: usize,
    pub skipped: usize,
    /// Shutdown was requested before the universe was covered
    pub interrupted: bool,
}

impl CycleReport {
    fn record(&mut self, outcome: &AssetOutcome) {
        match outcome {
            AssetOutcome::NoOpportunity => self.evaluated += 1,
            AssetOutcome::Ran { .. } => {
                self.evaluated += 1;
                self.triggered += 1;
            }
            AssetOutcome::Skipped(_) => self.skipped += 1,
        }
    }
}

/// Everything a per-asset task needs, cheap to clone into `tokio::spawn`
#[derive(Clone)]
struct ScanWorker {
    exchange: Exchange,
    threshold_pct: Decimal,
    cache: Arc<MarketDataCache>,
    estimator: Arc<ArbitrageEstimator>,
    orchestrator: Arc<ArbitrageOrchestrator>,
    notifier: Arc<dyn Notifier>,
}

impl ScanWorker {
    async fn process(self, triangle: Triangle) -> AssetOutcome {
        let forward = match self.estimator.estimate_forward(&self.cache, &triangle).await {
            Ok(estimate) => estimate,
            Err(e) => return self.skip(&triangle, e.to_string()),
        };
        let backward = match self.estimator.estimate_backward(&self.cache, &triangle).await {
            Ok(estimate) => estimate,
            Err(e) => return self.skip(&triangle, e.to_string()),
        };

        self.notifier
            .log(&format!(
                "{} / {}: {:.4}% / {:.4}%",
                self.exchange, triangle.asset, forward.return_pct, backward.return_pct
            ))
            .await;

        let chosen = if forward.exceeds(self.threshold_pct) {
            forward
        } else if backward.exceeds(self.threshold_pct) {
            backward
        } else {
            return AssetOutcome::NoOpportunity;
        };

        self.announce(&chosen).await;

        let status = match self.orchestrator.run(&triangle, chosen.direction).await {
            Ok(run) => Some(run.status),
            Err(e) => {
                error!(asset = %triangle.asset, direction = %chosen.direction, "Run failed: {}", e);
                None
            }
        };

        AssetOutcome::Ran {
            direction: chosen.direction,
            status,
        }
    }

    async fn announce(&self, estimate: &ArbitrageEstimate) {
        self.notifier
            .alert(&format!(
                "Found opportunity for {} @{:.4} on {}",
                estimate.asset, estimate.return_pct, self.exchange
            ))
            .await;

        if let Some(quotes) = &estimate.quotes {
            for quote in &quotes.legs {
                self.notifier.log(&quote.to_string()).await;
            }
        }
    }

    fn skip(&self, triangle: &Triangle, reason: String) -> AssetOutcome {
        warn!(asset = %triangle.asset, "Skipping this cycle: {}", reason);
        AssetOutcome::Skipped(reason)
    }
}

/// Drives scan cycles over a fixed universe
pub struct ScanScheduler {
    triangles: Vec<Triangle>,
    concurrency: usize,
    worker: ScanWorker,
}

impl ScanScheduler {
    pub fn new(
        universe: &[String],
        trading: &TradingConfig,
        cache: Arc<MarketDataCache>,
        estimator: Arc<ArbitrageEstimator>,
        orchestrator: Arc<ArbitrageOrchestrator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let triangles = universe
            .iter()
            .map(|asset| Triangle::new(&trading.base_currency, &trading.anchor_currency, asset))
            .collect();

        Self {
            triangles,
            concurrency: trading.concurrency.max(1),
            worker: ScanWorker {
                exchange: cache.exchange(),
                threshold_pct: trading.threshold_pct,
                cache,
                estimator,
                orchestrator,
                notifier,
            },
        }
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    /// One pass over the universe, batch by batch
    pub async fn run_cycle(&self) -> CycleReport {
        self.cycle(None).await
    }

    async fn cycle(&self, shutdown: Option<&watch::Receiver<bool>>) -> CycleReport {
        let mut report = CycleReport::default();

        for batch in self.triangles.chunks(self.concurrency) {
            if shutdown.is_some_and(stop_requested) {
                report.interrupted = true;
                break;
            }

            let handles: Vec<_> = batch
                .iter()
                .map(|triangle| tokio::spawn(self.worker.clone().process(triangle.clone())))
                .collect();

            for (triangle, joined) in batch.iter().zip(join_all(handles).await) {
                match joined {
                    Ok(outcome) => report.record(&outcome),
                    Err(e) => {
                        error!(asset = %triangle.asset, "Worker crashed: {}", e);
                        report.skipped += 1;
                    }
                }
            }

            self.worker.cache.flush();
            report.batches += 1;
        }

        debug!(
            batches = report.batches,
            evaluated = report.evaluated,
            triggered = report.triggered,
            skipped = report.skipped,
            interrupted = report.interrupted,
            "Scan cycle done"
        );
        report
    }

    /// Scan until `shutdown` turns true, finishing the batch in flight
    pub async fn run_forever(&self, shutdown: watch::Receiver<bool>) {
        info!(
            exchange = %self.worker.exchange,
            assets = self.triangles.len(),
            concurrency = self.concurrency,
            "Starting scan loop"
        );
        let mut cycle: u64 = 0;
        while !stop_requested(&shutdown) {
            cycle += 1;
            let report = self.cycle(Some(&shutdown)).await;
            if report.triggered > 0 {
                info!(cycle, triggered = report.triggered, "Cycle finished with runs");
            }
        }
        info!(cycles = cycle, "Scan loop stopped");
    }
}

fn stop_requested(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow()
}
