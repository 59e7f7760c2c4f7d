// src/pipeline/coordinator.rs

//! Worker coordination.
//!
//! Runs a fixed pool of cooperative workers on the current runtime. Each
//! worker owns one browsing session. Workers share the record store, an
//! admission gate, the progress counter and the limit flag; nothing else.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{Mutex, Semaphore};

use crate::browser::{PageSession, SessionLauncher};
use crate::error::{AppError, Result};
use crate::models::{Config, DispatchStrategy, StoreStats};
use crate::pipeline::partition::partition;
use crate::services::{DiscoveryEngine, ItemProcessor, Personalizer, ProcessOutcome};
use crate::storage::RecordStore;

/// Worker id used for the single discovery pass of partitioned runs.
const DISCOVERY_WORKER: usize = 0;

/// Global count of processed items, shared by all workers of a run.
#[derive(Debug, Default)]
pub struct ProgressCounter {
    count: Mutex<u64>,
}

impl ProgressCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment and return the new value. Values are unique and strictly
    /// increasing across workers.
    pub async fn advance(&self) -> u64 {
        let mut count = self.count.lock().await;
        *count += 1;
        *count
    }
}

/// State shared by the workers of one run.
struct RunContext {
    gate: Semaphore,
    progress: ProgressCounter,
    halted: AtomicBool,
    limit_reason: Mutex<Option<String>>,
}

impl RunContext {
    fn new(workers: usize) -> Self {
        Self {
            gate: Semaphore::new(workers.max(1)),
            progress: ProgressCounter::new(),
            halted: AtomicBool::new(false),
            limit_reason: Mutex::new(None),
        }
    }

    fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    async fn signal_limit(&self, reason: &str, stop: bool) {
        let mut slot = self.limit_reason.lock().await;
        if slot.is_none() {
            *slot = Some(reason.to_string());
        }
        if stop {
            self.halted.store(true, Ordering::SeqCst);
        }
    }
}

/// What one worker did during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker_id: usize,
    /// URLs the worker discovered or was assigned
    pub assigned: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Why the worker stopped early, if it did
    pub error: Option<String>,
}

impl WorkerReport {
    fn new(worker_id: usize) -> Self {
        Self {
            worker_id,
            ..Self::default()
        }
    }

    fn record(&mut self, outcome: &ProcessOutcome) {
        self.processed += 1;
        if outcome.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// Result of a full run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub workers: Vec<WorkerReport>,
    pub stats: StoreStats,
    /// First limit reason reported by any worker
    pub limit_reached: Option<String>,
}

impl RunReport {
    pub fn processed(&self) -> usize {
        self.workers.iter().map(|w| w.processed).sum()
    }

    pub fn worker_errors(&self) -> usize {
        self.workers.iter().filter(|w| w.error.is_some()).count()
    }
}

pub struct Coordinator {
    config: Arc<Config>,
    store: Arc<dyn RecordStore>,
    launcher: Arc<dyn SessionLauncher>,
    personalizer: Arc<Personalizer>,
    discovery: DiscoveryEngine,
}

impl Coordinator {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn RecordStore>,
        launcher: Arc<dyn SessionLauncher>,
        personalizer: Arc<Personalizer>,
    ) -> Result<Self> {
        let discovery = DiscoveryEngine::new(&config)?;
        Ok(Self {
            config,
            store,
            launcher,
            personalizer,
            discovery,
        })
    }

    /// Run all workers to completion and report final store stats.
    ///
    /// Worker failures are recorded in their reports; only a failure to
    /// read the final stats is returned as an error.
    pub async fn run(&self) -> Result<RunReport> {
        let workers = self.config.worker.workers.max(1);
        let ctx = RunContext::new(workers);
        let processor = ItemProcessor::new(
            &self.config,
            Arc::clone(&self.store),
            Arc::clone(&self.personalizer),
        )?;

        log::info!(
            "Starting {} workers ({:?}, {:?})",
            workers,
            self.config.worker.strategy,
            self.config.worker.mode
        );

        let reports = match self.config.worker.strategy {
            DispatchStrategy::Duplicated => {
                join_all(
                    (1..=workers).map(|id| self.duplicated_worker(id, &ctx, &processor)),
                )
                .await
            }
            DispatchStrategy::Partitioned => {
                self.partitioned(workers, &ctx, &processor).await
            }
        };

        let stats = self.store.stats().await?;
        let limit_reached = ctx.limit_reason.lock().await.clone();

        Ok(RunReport {
            workers: reports,
            stats,
            limit_reached,
        })
    }

    async fn duplicated_worker(
        &self,
        worker_id: usize,
        ctx: &RunContext,
        processor: &ItemProcessor,
    ) -> WorkerReport {
        let mut report = WorkerReport::new(worker_id);
        log::info!("[Worker {}] Starting", worker_id);

        let mut session = match self.launcher.open(worker_id).await {
            Ok(session) => session,
            Err(e) => {
                log::error!("[Worker {}] Could not open session: {}", worker_id, e);
                report.error = Some(e.to_string());
                return report;
            }
        };

        let result = match self.discover(session.as_mut(), worker_id).await {
            Ok(urls) => {
                report.assigned = urls.len();
                self.process_all(session.as_mut(), &urls, worker_id, ctx, processor, &mut report)
                    .await
            }
            Err(e) => Err(e),
        };
        finish(session.as_mut(), worker_id, result, &mut report).await;
        report
    }

    async fn partitioned(
        &self,
        workers: usize,
        ctx: &RunContext,
        processor: &ItemProcessor,
    ) -> Vec<WorkerReport> {
        let mut discovery_report = WorkerReport::new(DISCOVERY_WORKER);

        let mut urls = match self.discover_once().await {
            Ok(urls) => urls,
            Err(e) => {
                log::error!("Discovery failed: {}", e);
                discovery_report.error = Some(e.to_string());
                return vec![discovery_report];
            }
        };
        urls.sort();
        discovery_report.assigned = urls.len();

        let chunks = partition(&urls, workers);
        for (i, chunk) in chunks.iter().enumerate() {
            log::info!("[Worker {}] Assigned {} profiles", i + 1, chunk.len());
        }

        let mut reports = vec![discovery_report];
        reports.extend(
            join_all(
                chunks
                    .into_iter()
                    .enumerate()
                    .map(|(i, chunk)| self.partition_worker(i + 1, chunk, ctx, processor)),
            )
            .await,
        );
        reports
    }

    async fn discover_once(&self) -> Result<Vec<String>> {
        let mut session = self.launcher.open(DISCOVERY_WORKER).await?;
        let result = self.discover(session.as_mut(), DISCOVERY_WORKER).await;
        if let Err(e) = session.close().await {
            log::warn!("Could not close discovery session: {}", e);
        }
        result
    }

    async fn partition_worker(
        &self,
        worker_id: usize,
        urls: Vec<String>,
        ctx: &RunContext,
        processor: &ItemProcessor,
    ) -> WorkerReport {
        let mut report = WorkerReport::new(worker_id);
        if urls.is_empty() {
            log::info!("[Worker {}] Nothing assigned, exiting", worker_id);
            return report;
        }
        report.assigned = urls.len();

        let mut session = match self.launcher.open(worker_id).await {
            Ok(session) => session,
            Err(e) => {
                log::error!("[Worker {}] Could not open session: {}", worker_id, e);
                report.error = Some(e.to_string());
                return report;
            }
        };

        let result = self
            .process_all(session.as_mut(), &urls, worker_id, ctx, processor, &mut report)
            .await;
        finish(session.as_mut(), worker_id, result, &mut report).await;
        report
    }

    async fn discover(&self, session: &mut dyn PageSession, worker_id: usize) -> Result<Vec<String>> {
        log::info!(
            "[Worker {}] Loading listing {}",
            worker_id,
            self.config.browser.listing_url
        );
        session.navigate(&self.config.browser.listing_url).await?;
        tokio::time::sleep(Duration::from_millis(self.config.worker.listing_settle_ms)).await;
        self.discovery.discover(session, worker_id).await
    }

    async fn process_all(
        &self,
        session: &mut dyn PageSession,
        urls: &[String],
        worker_id: usize,
        ctx: &RunContext,
        processor: &ItemProcessor,
        report: &mut WorkerReport,
    ) -> Result<()> {
        let delay = Duration::from_millis(self.config.worker.request_delay_ms);
        let batch_size = self.config.worker.batch_size.max(1);

        for (i, url) in urls.iter().enumerate() {
            if ctx.is_halted() {
                log::info!("[Worker {}] Stopping: action limit reached", worker_id);
                break;
            }

            log::info!(
                "[Worker {}] Processing {}/{}: {}",
                worker_id,
                i + 1,
                urls.len(),
                url
            );

            let outcome = {
                let _permit = ctx
                    .gate
                    .acquire()
                    .await
                    .map_err(|e| AppError::session(format!("admission gate closed: {e}")))?;
                processor.process(session, url, worker_id).await?
            };
            report.record(&outcome);

            if let ProcessOutcome::LimitReached(reason) = &outcome {
                log::warn!("[Worker {}] ⚠ LIMIT REACHED: {}", worker_id, reason);
                ctx.signal_limit(reason, self.config.worker.stop_on_limit)
                    .await;
            }

            let done = ctx.progress.advance().await;
            if done % batch_size == 0 {
                match self.store.stats().await {
                    Ok(stats) => log::info!("[Progress] {} processed | {}", done, stats),
                    Err(e) => log::warn!("[Progress] Could not read stats: {}", e),
                }
            }

            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}

async fn finish(
    session: &mut dyn PageSession,
    worker_id: usize,
    result: Result<()>,
    report: &mut WorkerReport,
) {
    match result {
        Ok(()) => log::info!(
            "[Worker {}] Finished: {} processed, {} failed",
            worker_id,
            report.processed,
            report.failed
        ),
        Err(e) => {
            log::error!("[Worker {}] Stopped: {}", worker_id, e);
            report.error = Some(e.to_string());
        }
    }
    if let Err(e) = session.close().await {
        log::warn!("[Worker {}] Could not close session: {}", worker_id, e);
    }
}
