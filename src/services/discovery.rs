// src/services/discovery.rs

//! Listing discovery service.
//!
//! Scrolls an infinite listing until it stops growing and collects the
//! canonical URLs of every detail page it links to.

use std::collections::HashSet;
use std::time::Duration;

use url::Url;

use crate::browser::PageSession;
use crate::error::Result;
use crate::models::{Config, PageSelectors};
use crate::utils::url::{ProfileIdPattern, canonical_url};

/// Scroll-until-stable traversal over a listing page.
pub struct DiscoveryEngine {
    origin: Url,
    pattern: ProfileIdPattern,
    selectors: PageSelectors,
    scroll_settle: Duration,
    stall_limit: usize,
}

impl DiscoveryEngine {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            origin: Url::parse(&config.browser.origin)?,
            pattern: ProfileIdPattern::new(&config.discovery.profile_path)?,
            selectors: config.discovery.selectors.clone(),
            scroll_settle: Duration::from_millis(config.discovery.scroll_settle_ms),
            stall_limit: config.discovery.stall_limit.max(1),
        })
    }

    /// Collect detail URLs from the listing the session is positioned on.
    ///
    /// Stops when the loading indicator is gone after a scroll, or after
    /// `stall_limit` consecutive passes without new URLs. The result is
    /// unordered.
    pub async fn discover(
        &self,
        session: &mut dyn PageSession,
        worker_id: usize,
    ) -> Result<Vec<String>> {
        let mut found: HashSet<String> = HashSet::new();
        let mut last_count = 0;
        let mut stalls = 0;

        loop {
            self.collect_links(session, &mut found).await?;

            let count = found.len();
            log::info!("[Worker {}] Found {} profiles so far...", worker_id, count);

            if count == last_count {
                stalls += 1;
                if stalls >= self.stall_limit {
                    log::info!(
                        "[Worker {}] No new profiles after {} scrolls. Stopping.",
                        worker_id,
                        stalls
                    );
                    break;
                }
            } else {
                stalls = 0;
            }
            last_count = count;

            session.scroll_to_bottom().await?;
            tokio::time::sleep(self.scroll_settle).await;

            if session.query(&self.selectors.loading_indicator).await?.is_none() {
                log::info!(
                    "[Worker {}] No loading indicator found. Reached end.",
                    worker_id
                );
                break;
            }
        }

        log::info!(
            "[Worker {}] Total profiles collected: {}",
            worker_id,
            found.len()
        );
        Ok(found.into_iter().collect())
    }

    async fn collect_links(
        &self,
        session: &mut dyn PageSession,
        found: &mut HashSet<String>,
    ) -> Result<()> {
        let links = session.query_all(&self.selectors.profile_link).await?;
        for link in links {
            let Some(href) = session.attribute(&link, "href").await? else {
                continue;
            };
            match canonical_url(&self.origin, &href) {
                Some(url) if self.pattern.matches(&url) => {
                    found.insert(url);
                }
                _ => log::debug!("Ignoring link {}", href),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::browser::scripted::{ScriptedSite, test_config};
    use crate::browser::SessionLauncher;

    fn hrefs(ids: &[u32]) -> Vec<String> {
        ids.iter().map(|i| format!("/lis25/profiles/{i}?src=list")).collect()
    }

    #[tokio::test]
    async fn test_stops_after_three_stalled_passes() {
        let config = test_config();
        // K = 3 scrolls keep producing new ids, then the listing is exhausted
        // but the loading indicator never goes away.
        let site = Arc::new(
            ScriptedSite::new(&config)
                .with_batches(vec![
                    hrefs(&[1, 2]),
                    hrefs(&[3, 4]),
                    hrefs(&[2, 5]),
                    hrefs(&[6]),
                ])
                .with_stuck_loading(),
        );
        let mut session = site.launcher().open(1).await.unwrap();
        session.navigate(&config.browser.listing_url).await.unwrap();

        let engine = DiscoveryEngine::new(&config).unwrap();
        let mut urls = engine.discover(session.as_mut(), 1).await.unwrap();
        urls.sort();

        assert_eq!(urls.len(), 6);
        assert!(urls.iter().all(|u| !u.contains('?')));
        assert!(site.scrolls() <= 3 + 3);
    }

    #[tokio::test]
    async fn test_stops_when_loading_indicator_disappears() {
        let config = test_config();
        let site = Arc::new(
            ScriptedSite::new(&config)
                .with_batches(vec![hrefs(&[1]), hrefs(&[2]), hrefs(&[3])])
                .with_loading_passes(1),
        );
        let mut session = site.launcher().open(1).await.unwrap();
        session.navigate(&config.browser.listing_url).await.unwrap();

        let engine = DiscoveryEngine::new(&config).unwrap();
        let urls = engine.discover(session.as_mut(), 1).await.unwrap();

        // Indicator gone after the first scroll: only the first pass counts.
        assert_eq!(site.scrolls(), 1);
        assert_eq!(urls.len(), 1);
    }

    #[tokio::test]
    async fn test_ignores_links_without_profile_marker() {
        let config = test_config();
        let site = Arc::new(
            ScriptedSite::new(&config)
                .with_batches(vec![vec![
                    "/lis25/profiles/".to_string(),
                    "/lis25/profiles/10".to_string(),
                    "https://attend.example.com/lis25/profiles/10#bio".to_string(),
                ]])
                .with_loading_passes(0),
        );
        let mut session = site.launcher().open(1).await.unwrap();
        session.navigate(&config.browser.listing_url).await.unwrap();

        let engine = DiscoveryEngine::new(&config).unwrap();
        let urls = engine.discover(session.as_mut(), 1).await.unwrap();
        assert_eq!(
            urls,
            vec!["https://attend.example.com/lis25/profiles/10".to_string()]
        );
    }
}
