// src/services/processor.rs

//! Per-record workflow.
//!
//! Each discovered URL is taken through extraction, storage and (in full
//! action mode) the request dialog. Sent records are never touched again.
//! Per-record failures become a `ProcessOutcome`; only store errors are
//! returned as `Err`.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::browser::PageSession;
use crate::error::{AppError, Result};
use crate::models::{Config, Profile, RunMode};
use crate::services::action::ActionRunner;
use crate::services::extract::ProfileExtractor;
use crate::services::personalizer::Personalizer;
use crate::storage::RecordStore;
use crate::utils::url::ProfileIdPattern;

/// How processing of one URL ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Already handled, nothing to do
    SkippedTerminal,
    /// Stored without taking action (discovery-only mode)
    Extracted,
    ActionSent,
    ActionFailed(String),
    /// The action surface refused further actions
    LimitReached(String),
    /// Detail page unreachable or empty; nothing stored
    ExtractionFailed(String),
}

impl ProcessOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            ProcessOutcome::SkippedTerminal | ProcessOutcome::Extracted | ProcessOutcome::ActionSent
        )
    }
}

impl fmt::Display for ProcessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessOutcome::SkippedTerminal => write!(f, "skipped"),
            ProcessOutcome::Extracted => write!(f, "extracted"),
            ProcessOutcome::ActionSent => write!(f, "action sent"),
            ProcessOutcome::ActionFailed(e) => write!(f, "action failed: {e}"),
            ProcessOutcome::LimitReached(reason) => write!(f, "limit reached: {reason}"),
            ProcessOutcome::ExtractionFailed(e) => write!(f, "extraction failed: {e}"),
        }
    }
}

/// Shared by all workers of one run.
pub struct ItemProcessor {
    mode: RunMode,
    pattern: ProfileIdPattern,
    extractor: ProfileExtractor,
    action: ActionRunner,
    page_settle: Duration,
    store: Arc<dyn RecordStore>,
    personalizer: Arc<Personalizer>,
    /// Ids some worker has started acting on during this run
    claimed: Mutex<HashSet<String>>,
}

impl ItemProcessor {
    pub fn new(
        config: &Config,
        store: Arc<dyn RecordStore>,
        personalizer: Arc<Personalizer>,
    ) -> Result<Self> {
        Ok(Self {
            mode: config.worker.mode,
            pattern: ProfileIdPattern::new(&config.discovery.profile_path)?,
            extractor: ProfileExtractor::new(config),
            action: ActionRunner::new(config),
            page_settle: Duration::from_millis(config.worker.page_settle_ms),
            store,
            personalizer,
            claimed: Mutex::new(HashSet::new()),
        })
    }

    /// Take one detail URL through the workflow.
    pub async fn process(
        &self,
        session: &mut dyn PageSession,
        url: &str,
        worker_id: usize,
    ) -> Result<ProcessOutcome> {
        let Some(id) = self.pattern.extract(url) else {
            log::warn!("[Worker {}] No profile id in {}", worker_id, url);
            return Ok(ProcessOutcome::ExtractionFailed(format!(
                "no profile id in {url}"
            )));
        };

        let profile = if self.store.exists(&id).await? {
            if self.mode == RunMode::DiscoverOnly {
                log::info!("[Worker {}] Skipping {} (already stored)", worker_id, id);
                return Ok(ProcessOutcome::SkippedTerminal);
            }
            let record = self.store.get(&id).await?;
            if record.is_terminal() {
                log::info!("[Worker {}] Skipping {} (already sent)", worker_id, id);
                return Ok(ProcessOutcome::SkippedTerminal);
            }
            log::info!(
                "[Worker {}] Using stored data for {} ({})",
                worker_id,
                id,
                record.action_status.as_str()
            );
            record.profile
        } else {
            log::info!("[Worker {}] Extracting {}", worker_id, url);
            let profile = match self.extractor.extract(session, &id, url).await {
                Ok(profile) => profile,
                Err(e) => {
                    log::warn!("[Worker {}] {}", worker_id, e);
                    return Ok(ProcessOutcome::ExtractionFailed(e.to_string()));
                }
            };

            match self.store.insert(&profile).await {
                Ok(row_id) => log::info!(
                    "[Worker {}] Stored {} ({}) as row {}",
                    worker_id,
                    profile.display_name,
                    id,
                    row_id
                ),
                Err(e) if e.is_duplicate() => {
                    log::info!(
                        "[Worker {}] {} was stored concurrently by another worker",
                        worker_id,
                        id
                    );
                    if self.mode == RunMode::FullAction && self.store.get(&id).await?.is_terminal() {
                        log::info!("[Worker {}] Skipping {} (already sent)", worker_id, id);
                        return Ok(ProcessOutcome::SkippedTerminal);
                    }
                }
                Err(e) => return Err(e),
            }

            if self.mode == RunMode::DiscoverOnly {
                return Ok(ProcessOutcome::Extracted);
            }
            profile
        };

        if !self.claimed.lock().await.insert(id.clone()) {
            log::info!(
                "[Worker {}] Skipping {} (already attempted this run)",
                worker_id,
                id
            );
            return Ok(ProcessOutcome::SkippedTerminal);
        }

        let outcome = match self.act(session, &profile, url, worker_id).await {
            Ok(()) => {
                self.store.mark_sent(&id).await?;
                log::info!("[Worker {}] ✓ Action sent to {}", worker_id, profile.display_name);
                ProcessOutcome::ActionSent
            }
            Err(AppError::LimitReached(reason)) => {
                self.store
                    .mark_failed(&id, &format!("limit reached: {reason}"))
                    .await?;
                log::warn!("[Worker {}] Action limit reached: {}", worker_id, reason);
                ProcessOutcome::LimitReached(reason)
            }
            Err(e) => {
                let message = e.to_string();
                self.store.mark_failed(&id, &message).await?;
                log::warn!("[Worker {}] ✗ Action failed for {}: {}", worker_id, id, message);
                ProcessOutcome::ActionFailed(message)
            }
        };
        Ok(outcome)
    }

    async fn act(
        &self,
        session: &mut dyn PageSession,
        profile: &Profile,
        url: &str,
        worker_id: usize,
    ) -> Result<()> {
        let target = if profile.source_url.is_empty() {
            url
        } else {
            profile.source_url.as_str()
        };
        session.navigate(target).await?;
        tokio::time::sleep(self.page_settle).await;

        let trigger = self.action.check_available(session).await?;
        let message = self.personalizer.personalize(profile).await;
        self.action
            .perform(session, &trigger, &message, worker_id)
            .await
    }
}
