// src/services/action.rs

//! Multi-step request dialog on a detail page.
//!
//! Optional steps report a `StepOutcome` and never abort the sequence. Only
//! a missing trigger, a disabled trigger or a missing submit control fail
//! the action.

use std::fmt;
use std::time::Duration;

use crate::browser::{ElementHandle, PageSession};
use crate::error::{AppError, Result};
use crate::models::{ActionSelectors, Config, Locator};

/// Result of one optional step of the dialog.
#[derive(Debug)]
pub enum StepOutcome {
    Done,
    SkippedAbsent,
    Failed(AppError),
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Done => write!(f, "done"),
            StepOutcome::SkippedAbsent => write!(f, "skipped (element not found)"),
            StepOutcome::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}

pub struct ActionRunner {
    selectors: ActionSelectors,
    settle: Duration,
    wait_timeout: Duration,
}

impl ActionRunner {
    pub fn new(config: &Config) -> Self {
        Self {
            selectors: config.action.selectors.clone(),
            settle: Duration::from_millis(config.action.step_settle_ms),
            wait_timeout: Duration::from_millis(config.action.wait_timeout_ms),
        }
    }

    /// Locate the trigger on the current page and make sure it is usable.
    ///
    /// A disabled trigger means the account ran out of actions; its tooltip
    /// becomes the `AppError::LimitReached` reason.
    pub async fn check_available(&self, session: &mut dyn PageSession) -> Result<ElementHandle> {
        let Some(trigger) = session.query(&self.selectors.trigger).await? else {
            return Err(AppError::action(format!(
                "trigger '{}' not found",
                self.selectors.trigger
            )));
        };

        if session.attribute(&trigger, "disabled").await?.is_some() {
            let reason = session
                .attribute(&trigger, &self.selectors.disabled_reason_attr)
                .await?
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| "trigger disabled".to_string());
            return Err(AppError::LimitReached(reason));
        }

        Ok(trigger)
    }

    /// Run the dialog from an available trigger through to submission.
    pub async fn perform(
        &self,
        session: &mut dyn PageSession,
        trigger: &ElementHandle,
        message: &str,
        worker_id: usize,
    ) -> Result<()> {
        let outcome = self.open_dialog(session, trigger).await;
        log_step(worker_id, "open dialog", &outcome);

        let outcome = self
            .select_first(session, &self.selectors.location_options)
            .await;
        log_step(worker_id, "select location", &outcome);

        let outcome = self.select_first(session, &self.selectors.slot_options).await;
        log_step(worker_id, "select slot", &outcome);

        let outcome = self.fill_message(session, message).await;
        log_step(worker_id, "fill message", &outcome);

        let Some(submit) = session.query(&self.selectors.submit).await? else {
            return Err(AppError::action(format!(
                "submit control '{}' not found",
                self.selectors.submit
            )));
        };
        session
            .click(&submit)
            .await
            .map_err(|e| AppError::action(format!("submit failed: {e}")))?;
        tokio::time::sleep(self.settle).await;
        Ok(())
    }

    async fn open_dialog(
        &self,
        session: &mut dyn PageSession,
        trigger: &ElementHandle,
    ) -> StepOutcome {
        if let Err(e) = session.click(trigger).await {
            return StepOutcome::Failed(e);
        }
        tokio::time::sleep(self.settle).await;
        match session.wait_for(&self.selectors.dialog, self.wait_timeout).await {
            Ok(Some(_)) => StepOutcome::Done,
            Ok(None) => StepOutcome::SkippedAbsent,
            Err(e) => StepOutcome::Failed(e),
        }
    }

    /// Click the first element of the first locator that matches anything.
    async fn select_first(
        &self,
        session: &mut dyn PageSession,
        candidates: &[Locator],
    ) -> StepOutcome {
        for locator in candidates {
            match session.query(locator).await {
                Ok(Some(option)) => {
                    if let Err(e) = session.click(&option).await {
                        return StepOutcome::Failed(e);
                    }
                    tokio::time::sleep(self.settle).await;
                    return StepOutcome::Done;
                }
                Ok(None) => continue,
                Err(e) => return StepOutcome::Failed(e),
            }
        }
        StepOutcome::SkippedAbsent
    }

    async fn fill_message(&self, session: &mut dyn PageSession, message: &str) -> StepOutcome {
        match session.query(&self.selectors.message_input).await {
            Ok(Some(input)) => match session.fill_text(&input, message).await {
                Ok(()) => StepOutcome::Done,
                Err(e) => StepOutcome::Failed(e),
            },
            Ok(None) => StepOutcome::SkippedAbsent,
            Err(e) => StepOutcome::Failed(e),
        }
    }
}

fn log_step(worker_id: usize, step: &str, outcome: &StepOutcome) {
    match outcome {
        StepOutcome::Done => log::debug!("[Worker {}] {}: {}", worker_id, step, outcome),
        StepOutcome::SkippedAbsent => log::info!("[Worker {}] {}: {}", worker_id, step, outcome),
        StepOutcome::Failed(_) => log::warn!("[Worker {}] {}: {}", worker_id, step, outcome),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::browser::SessionLauncher;
    use crate::browser::scripted::{ScriptedProfile, ScriptedSite, Trigger, profile_url, test_config};

    async fn run_on(site: &Arc<ScriptedSite>, id: u32) -> Result<()> {
        let config = test_config();
        let runner = ActionRunner::new(&config);
        let mut session = site.launcher().open(1).await?;
        session.navigate(&profile_url(id)).await?;
        let trigger = runner.check_available(session.as_mut()).await?;
        runner.perform(session.as_mut(), &trigger, "Hello", 1).await
    }

    #[tokio::test]
    async fn test_full_sequence_submits_message() {
        let site = Arc::new(
            ScriptedSite::new(&test_config()).with_profile(1, ScriptedProfile::sample(1)),
        );
        run_on(&site, 1).await.unwrap();

        let submissions = site.submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].url, profile_url(1));
        assert_eq!(submissions[0].message.as_deref(), Some("Hello"));
        assert!(submissions[0].location_selected);
        assert!(submissions[0].slot_selected);
    }

    #[tokio::test]
    async fn test_disabled_trigger_is_limit_reached() {
        let site = Arc::new(ScriptedSite::new(&test_config()).with_profile(
            1,
            ScriptedProfile::sample(1)
                .with_trigger(Trigger::Disabled("You have used all requests".into())),
        ));
        let err = run_on(&site, 1).await.unwrap_err();
        match err {
            AppError::LimitReached(reason) => assert_eq!(reason, "You have used all requests"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(site.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_missing_trigger_is_action_error() {
        let site = Arc::new(ScriptedSite::new(&test_config()).with_profile(
            1,
            ScriptedProfile::sample(1).with_trigger(Trigger::Absent),
        ));
        assert!(matches!(run_on(&site, 1).await, Err(AppError::Action(_))));
    }

    #[tokio::test]
    async fn test_missing_submit_is_hard_failure() {
        let site = Arc::new(
            ScriptedSite::new(&test_config())
                .with_profile(1, ScriptedProfile::sample(1).without_submit()),
        );
        assert!(matches!(run_on(&site, 1).await, Err(AppError::Action(_))));
        assert!(site.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_dialog_never_opening_skips_steps_then_fails_at_submit() {
        let site = Arc::new(
            ScriptedSite::new(&test_config())
                .with_profile(1, ScriptedProfile::sample(1).without_dialog()),
        );
        assert!(matches!(run_on(&site, 1).await, Err(AppError::Action(_))));
    }
}
