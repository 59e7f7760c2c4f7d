// src/browser/chrome.rs

//! Chromium sessions over the DevTools protocol.
//!
//! One browser process is launched per run and each worker gets its own tab.
//! Handles are resolved again on every call, the same way the static backend
//! does it, so they go stale once the tab navigates elsewhere.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromiumConfig};
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::{Element, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use url::Url;

use crate::browser::{Cookie, ElementHandle, PageSession, SessionLauncher};
use crate::error::{AppError, Result};
use crate::models::{BrowserConfig, Locator};

const SCROLL_TO_BOTTOM: &str = "window.scrollTo(0, document.body.scrollHeight)";

/// Owns the browser process and its DevTools event loop.
pub struct ChromeLauncher {
    browser: Browser,
    events: JoinHandle<()>,
    cookies: Vec<CookieParam>,
}

impl ChromeLauncher {
    /// Start Chromium, windowed unless `headless` is set.
    pub async fn launch(config: &BrowserConfig, cookies: &[Cookie]) -> Result<Self> {
        let cookies = cookie_params(&config.origin, cookies)?;

        let mut builder = ChromiumConfig::builder()
            .request_timeout(Duration::from_secs(config.timeout_secs))
            .arg(format!("--user-agent={}", config.user_agent));
        if !config.headless {
            builder = builder.with_head();
        }
        let chromium = builder.build().map_err(AppError::config)?;

        let (browser, mut handler) = Browser::launch(chromium)
            .await
            .map_err(|e| AppError::config(format!("Cannot launch Chromium: {e}")))?;

        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    log::debug!("Browser event loop stopped: {}", e);
                    break;
                }
            }
        });

        log::info!(
            "Launched Chromium ({})",
            if config.headless { "headless" } else { "windowed" }
        );

        Ok(Self {
            browser,
            events,
            cookies,
        })
    }
}

impl Drop for ChromeLauncher {
    fn drop(&mut self) {
        self.events.abort();
    }
}

#[async_trait]
impl SessionLauncher for ChromeLauncher {
    async fn open(&self, worker_id: usize) -> Result<Box<dyn PageSession>> {
        log::debug!("[Worker {}] Opening browser tab", worker_id);
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(AppError::session)?;

        if !self.cookies.is_empty() {
            page.set_cookies(self.cookies.clone())
                .await
                .map_err(AppError::session)?;
        }

        Ok(Box::new(ChromeSession { page }))
    }
}

/// Cookies from the export that apply to the configured origin.
fn cookie_params(origin: &str, cookies: &[Cookie]) -> Result<Vec<CookieParam>> {
    let origin = Url::parse(origin)?;
    let host = origin.host_str().unwrap_or_default();

    cookies
        .iter()
        .filter(|c| c.matches_host(host))
        .map(|c| {
            CookieParam::builder()
                .name(c.name.clone())
                .value(c.value.clone())
                .domain(c.domain.clone())
                .path(c.path.clone())
                .build()
                .map_err(|e| AppError::config(format!("Invalid cookie '{}': {e}", c.name)))
        })
        .collect()
}

/// One browser tab.
pub struct ChromeSession {
    page: Page,
}

impl ChromeSession {
    async fn matches(&self, locator: &Locator) -> Result<Vec<Element>> {
        let elements = self
            .page
            .find_elements(locator.css.as_str())
            .await
            .map_err(|e| AppError::selector(&locator.css, e))?;

        let Some(text) = &locator.has_text else {
            return Ok(elements);
        };

        let mut kept = Vec::with_capacity(elements.len());
        for element in elements {
            let inner = element
                .inner_text()
                .await
                .map_err(AppError::session)?
                .unwrap_or_default();
            if inner.contains(text.as_str()) {
                kept.push(element);
            }
        }
        Ok(kept)
    }

    async fn resolve(&self, handle: &ElementHandle) -> Result<Element> {
        self.matches(&handle.locator)
            .await?
            .into_iter()
            .nth(handle.index)
            .ok_or_else(|| {
                AppError::session(format!(
                    "element #{} of '{}' is no longer on the page",
                    handle.index, handle.locator
                ))
            })
    }
}

#[async_trait]
impl PageSession for ChromeSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.page.goto(url).await.map_err(AppError::session)?;
        Ok(())
    }

    async fn query_all(&mut self, locator: &Locator) -> Result<Vec<ElementHandle>> {
        let count = self.matches(locator).await?.len();
        Ok((0..count).map(|i| ElementHandle::new(locator, i)).collect())
    }

    async fn attribute(&mut self, handle: &ElementHandle, name: &str) -> Result<Option<String>> {
        self.resolve(handle)
            .await?
            .attribute(name)
            .await
            .map_err(AppError::session)
    }

    async fn text(&mut self, handle: &ElementHandle) -> Result<String> {
        Ok(self
            .resolve(handle)
            .await?
            .inner_text()
            .await
            .map_err(AppError::session)?
            .unwrap_or_default())
    }

    async fn click(&mut self, handle: &ElementHandle) -> Result<()> {
        self.resolve(handle)
            .await?
            .click()
            .await
            .map_err(AppError::session)?;
        Ok(())
    }

    async fn fill_text(&mut self, handle: &ElementHandle, text: &str) -> Result<()> {
        let element = self.resolve(handle).await?;
        element.click().await.map_err(AppError::session)?;
        element.type_str(text).await.map_err(AppError::session)?;
        Ok(())
    }

    async fn scroll_to_bottom(&mut self) -> Result<()> {
        self.page
            .evaluate(SCROLL_TO_BOTTOM)
            .await
            .map_err(AppError::session)?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.page.clone().close().await.map_err(AppError::session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookie(name: &str, domain: &str) -> Cookie {
        Cookie {
            name: name.into(),
            value: "v".into(),
            domain: domain.into(),
            path: "/".into(),
        }
    }

    #[test]
    fn test_cookie_params_keep_origin_cookies() {
        let cookies = vec![
            cookie("sid", ".websummit.com"),
            cookie("tracker", "ads.example.net"),
        ];
        let params = cookie_params("https://attend.websummit.com", &cookies).unwrap();

        assert_eq!(params.len(), 1);
        assert_eq!(params[0].name, "sid");
        assert_eq!(params[0].domain.as_deref(), Some(".websummit.com"));
        assert_eq!(params[0].path.as_deref(), Some("/"));
    }

    #[test]
    fn test_cookie_params_rejects_bad_origin() {
        assert!(cookie_params("not a url", &[cookie("sid", "x.com")]).is_err());
    }
}
