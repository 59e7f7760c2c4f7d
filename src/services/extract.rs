// src/services/extract.rs

//! Detail page extraction.

use std::time::Duration;

use crate::browser::PageSession;
use crate::error::{AppError, Result};
use crate::models::{Config, PageSelectors, Profile};

/// Replacement character some pages prefix icon-only list items with.
const ICON_MARKER: char = '\u{FFFD}';

/// Reads a profile from its detail page.
pub struct ProfileExtractor {
    selectors: PageSelectors,
    settle: Duration,
}

impl ProfileExtractor {
    pub fn new(config: &Config) -> Self {
        Self {
            selectors: config.discovery.selectors.clone(),
            settle: Duration::from_millis(config.worker.page_settle_ms),
        }
    }

    /// Navigate to `url` and map the main region's lines onto a profile.
    ///
    /// Fails with `AppError::Extraction` when the page cannot be loaded or
    /// has no content. The groups list is best-effort.
    pub async fn extract(
        &self,
        session: &mut dyn PageSession,
        id: &str,
        url: &str,
    ) -> Result<Profile> {
        session
            .navigate(url)
            .await
            .map_err(|e| AppError::extraction(url, e))?;
        tokio::time::sleep(self.settle).await;

        let lines = self.content_lines(session).await.map_err(|e| match e {
            AppError::Extraction { .. } => e,
            other => AppError::extraction(url, other),
        })?;
        if lines.is_empty() {
            return Err(AppError::extraction(url, "page has no content"));
        }

        let groups = match self.groups(session).await {
            Ok(groups) => groups,
            Err(e) => {
                log::debug!("Could not read groups for {}: {}", id, e);
                Vec::new()
            }
        };

        Ok(Profile::from_lines(id, url, &lines, groups))
    }

    async fn content_lines(&self, session: &mut dyn PageSession) -> Result<Vec<String>> {
        let Some(main) = session.query(&self.selectors.main_region).await? else {
            return Ok(Vec::new());
        };
        let text = session.text(&main).await?;
        Ok(split_lines(&text))
    }

    async fn groups(&self, session: &mut dyn PageSession) -> Result<Vec<String>> {
        let Some(region) = session.query(&self.selectors.groups_region).await? else {
            return Ok(Vec::new());
        };
        let text = session.text(&region).await?;
        Ok(split_lines(&text)
            .into_iter()
            .filter(|line| !line.starts_with(ICON_MARKER))
            .collect())
    }
}

/// Trimmed, non-empty lines.
fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::browser::SessionLauncher;
    use crate::browser::scripted::{ScriptedProfile, ScriptedSite, profile_url, test_config};

    #[test]
    fn test_split_lines() {
        assert_eq!(split_lines("  a \n\n\t\n b\n"), vec!["a", "b"]);
        assert!(split_lines(" \n ").is_empty());
    }

    #[tokio::test]
    async fn test_extract_maps_lines_by_position() {
        let config = test_config();
        let site = Arc::new(ScriptedSite::new(&config).with_profile(
            7,
            ScriptedProfile::sample(7).with_groups(&["Climate", "\u{FFFD} icon", "Mobility"]),
        ));
        let mut session = site.launcher().open(1).await.unwrap();

        let extractor = ProfileExtractor::new(&config);
        let profile = extractor
            .extract(session.as_mut(), "7", &profile_url(7))
            .await
            .unwrap();

        assert_eq!(profile.id, "7");
        assert_eq!(profile.badge_type, "Attendee");
        assert_eq!(profile.display_name, "Person 7");
        assert_eq!(profile.organization, "Org 7");
        assert_eq!(profile.category_text, "Logistics");
        assert_eq!(profile.groups, vec!["Climate", "Mobility"]);
        assert_eq!(profile.source_url, profile_url(7));
    }

    #[tokio::test]
    async fn test_short_page_leaves_missing_fields_empty() {
        let config = test_config();
        let site = Arc::new(
            ScriptedSite::new(&config).with_profile(3, ScriptedProfile::new(&["Speaker", "Grace"])),
        );
        let mut session = site.launcher().open(1).await.unwrap();

        let profile = ProfileExtractor::new(&config)
            .extract(session.as_mut(), "3", &profile_url(3))
            .await
            .unwrap();
        assert_eq!(profile.display_name, "Grace");
        assert_eq!(profile.role_title, "");
        assert!(profile.groups.is_empty());
    }

    #[tokio::test]
    async fn test_empty_page_is_extraction_error() {
        let config = test_config();
        let site = Arc::new(ScriptedSite::new(&config).with_profile(4, ScriptedProfile::new(&[])));
        let mut session = site.launcher().open(1).await.unwrap();

        let err = ProfileExtractor::new(&config)
            .extract(session.as_mut(), "4", &profile_url(4))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Extraction { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_page_is_extraction_error() {
        let config = test_config();
        let site = Arc::new(ScriptedSite::new(&config).with_unreachable(5));
        let mut session = site.launcher().open(1).await.unwrap();

        let err = ProfileExtractor::new(&config)
            .extract(session.as_mut(), "5", &profile_url(5))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Extraction { .. }));
    }
}
