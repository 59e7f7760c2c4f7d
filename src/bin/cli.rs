//! Outreach CLI
//!
//! Local execution entry point.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use outreach::{
    browser::load_cookies,
    error::Result,
    models::{BrowserBackend, Config, DispatchStrategy, RunMode},
    pipeline,
    storage::{LocalStore, RecordStore},
    utils,
};

/// Outreach - event attendee discovery and meeting requests
#[derive(Parser, Debug)]
#[command(
    name = "outreach",
    version,
    about = "Concurrent profile discovery and outreach pipeline"
)]
struct Cli {
    /// Path to storage directory containing config, cookies and records
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Discover and store profiles without sending requests
    Discover(RunArgs),

    /// Discover profiles and send meeting requests
    Run(RunArgs),

    /// Show record counts
    Stats,

    /// List stored profiles without a request attempt
    Pending {
        /// Maximum number of records to list
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Validate configuration and cookies
    Validate,
}

/// Overrides for the `[worker]` and `[browser]` config sections.
#[derive(Args, Debug)]
struct RunArgs {
    /// Number of concurrent workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Log store stats every N processed profiles
    #[arg(short, long)]
    batch_size: Option<u64>,

    /// Dispatch strategy: duplicated or partitioned
    #[arg(long)]
    strategy: Option<DispatchStrategy>,

    /// Session backend: chrome or http
    #[arg(long)]
    backend: Option<BrowserBackend>,

    /// Run sessions without a visible window
    #[arg(long)]
    headless: bool,
}

impl RunArgs {
    fn apply(&self, config: &mut Config, mode: RunMode) {
        config.worker.mode = mode;
        if let Some(workers) = self.workers {
            config.worker.workers = workers;
        }
        if let Some(batch_size) = self.batch_size {
            config.worker.batch_size = batch_size;
        }
        if let Some(strategy) = self.strategy {
            config.worker.strategy = strategy;
        }
        if let Some(backend) = self.backend {
            config.browser.backend = backend;
        }
        if self.headless {
            config.browser.headless = true;
        }
    }
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.storage_dir.join("config.toml");
    let mut config = Config::load_or_default(&config_path);

    log::info!("Loaded configuration from {}", cli.storage_dir.display());

    match cli.command {
        Command::Discover(args) => {
            args.apply(&mut config, RunMode::DiscoverOnly);
            pipeline::run_pipeline(config, &cli.storage_dir).await?;
        }

        Command::Run(args) => {
            args.apply(&mut config, RunMode::FullAction);
            let report = pipeline::run_pipeline(config, &cli.storage_dir).await?;
            if let Some(reason) = report.limit_reached {
                log::warn!("Stopped early, action limit reached: {}", reason);
            }
        }

        Command::Stats => {
            let store = LocalStore::open(&cli.storage_dir).await?;
            let stats = store.stats().await?;
            utils::log::summary(
                &format!("Records in {}", store.path().display()),
                &[
                    ("Total", stats.total.to_string()),
                    ("Sent", stats.action_sent.to_string()),
                    ("Pending", stats.pending.to_string()),
                    ("Failed", stats.failed.to_string()),
                ],
            );
        }

        Command::Pending { limit } => {
            let store = LocalStore::open(&cli.storage_dir).await?;
            let records = store.pending(limit).await?;
            log::info!("{} pending records", records.len());
            for record in &records {
                log::info!(
                    "  {} | {} | {} | {}",
                    record.id(),
                    record.profile.display_name,
                    record.profile.organization,
                    record.discovered_at.format("%Y-%m-%d %H:%M")
                );
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");

            let backend = config.browser.backend;
            if backend.is_available() {
                log::info!("✓ Backend {:?} available", backend);
            } else {
                log::warn!("Backend {:?} is not built in; use --backend http", backend);
            }

            let cookies = load_cookies(&config.cookies_path(&cli.storage_dir))?;
            log::info!("✓ Cookies OK ({} entries)", cookies.len());

            if std::env::var(&config.personalizer.api_key_env).is_ok() {
                log::info!("✓ {} is set", config.personalizer.api_key_env);
            } else {
                log::warn!(
                    "{} is not set; only discovery runs are possible",
                    config.personalizer.api_key_env
                );
            }

            log::info!("All validations passed!");
        }
    }

    log::info!("Done!");

    Ok(())
}
