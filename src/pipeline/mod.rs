//! Pipeline entry points.
//!
//! - `run_pipeline`: Validate configuration, wire the store, sessions and
//!   personalizer together and run the worker pool
//! - `Coordinator`: Worker pool with duplicated or partitioned dispatch

pub mod coordinator;
pub mod partition;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

#[cfg(feature = "chrome")]
use crate::browser::ChromeLauncher;
use crate::browser::{Cookie, HttpLauncher, SessionLauncher, load_cookies};
use crate::error::{AppError, Result};
use crate::models::{BrowserBackend, BrowserConfig, Config, RunMode};
use crate::services::{ChatCompletionGenerator, LineGenerator, Personalizer};
use crate::storage::LocalStore;

pub use coordinator::{Coordinator, ProgressCounter, RunReport, WorkerReport};
pub use partition::partition;

/// Run discovery (and actions, in full mode) against the configured site.
///
/// Configuration problems (invalid values, a backend that cannot run the
/// requested mode, unreadable cookies, a missing API key in full action
/// mode) are reported before the store is opened or any worker starts.
pub async fn run_pipeline(config: Config, storage_dir: &Path) -> Result<RunReport> {
    config.validate()?;
    check_backend(&config)?;
    let cookies = load_cookies(&config.cookies_path(storage_dir))?;

    let generator: Option<Arc<dyn LineGenerator>> = match config.worker.mode {
        RunMode::FullAction => Some(Arc::new(ChatCompletionGenerator::from_config(
            &config.personalizer,
            Duration::from_secs(config.browser.timeout_secs),
        )?)),
        RunMode::DiscoverOnly => None,
    };

    let store = Arc::new(LocalStore::open(storage_dir).await?);
    let launcher = launch_sessions(&config.browser, &cookies).await?;
    let personalizer = Arc::new(Personalizer::new(config.personalizer.clone(), generator));

    let start = Utc::now();
    crate::utils::log::header(&format!(
        "Outreach run: {} workers, {:?}, {:?}",
        config.worker.workers, config.worker.strategy, config.worker.mode
    ));

    let report = Coordinator::new(Arc::new(config), store, launcher, personalizer)?
        .run()
        .await?;

    let elapsed = Utc::now() - start;
    log_report(&report, elapsed.num_seconds());
    Ok(report)
}

/// Reject backends this build lacks, and full action runs on a backend
/// that cannot click buttons or fill the message.
fn check_backend(config: &Config) -> Result<()> {
    let backend = config.browser.backend;
    if !backend.is_available() {
        return Err(AppError::config(format!(
            "browser.backend = {backend:?} is not available in this build"
        )));
    }
    if config.worker.mode == RunMode::FullAction && !backend.can_act() {
        return Err(AppError::config(format!(
            "browser.backend = {backend:?} cannot fill or submit forms; use chrome for full action runs"
        )));
    }
    Ok(())
}

async fn launch_sessions(
    config: &BrowserConfig,
    cookies: &[Cookie],
) -> Result<Arc<dyn SessionLauncher>> {
    match config.backend {
        BrowserBackend::Http => Ok(Arc::new(HttpLauncher::new(config, cookies)?)),
        #[cfg(feature = "chrome")]
        BrowserBackend::Chrome => Ok(Arc::new(ChromeLauncher::launch(config, cookies).await?)),
        #[cfg(not(feature = "chrome"))]
        BrowserBackend::Chrome => Err(AppError::config("built without the chrome feature")),
    }
}

fn log_report(report: &RunReport, elapsed_secs: i64) {
    crate::utils::log::separator();
    for worker in &report.workers {
        let status = match &worker.error {
            Some(e) => format!("stopped: {e}"),
            None => "ok".to_string(),
        };
        log::info!(
            "[Worker {}] assigned={} processed={} failed={} {}",
            worker.worker_id,
            worker.assigned,
            worker.processed,
            worker.failed,
            status
        );
    }

    let mut items = vec![
        ("Total", report.stats.total.to_string()),
        ("Sent", report.stats.action_sent.to_string()),
        ("Pending", report.stats.pending.to_string()),
        ("Failed", report.stats.failed.to_string()),
        ("Processed this run", report.processed().to_string()),
        ("Elapsed", format!("{elapsed_secs}s")),
    ];
    if let Some(reason) = &report.limit_reached {
        items.push(("Limit reached", reason.clone()));
    }
    crate::utils::log::summary("Run complete", &items);
}
