//! Browsing session abstraction.
//!
//! The pipeline drives pages only through `PageSession`, one session per
//! worker, opened by a `SessionLauncher`. Sessions are never shared between
//! workers.

#[cfg(feature = "chrome")]
pub mod chrome;
pub mod http;
#[cfg(test)]
pub mod scripted;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::{AppError, Result};
use crate::models::Locator;

#[cfg(feature = "chrome")]
pub use chrome::ChromeLauncher;
pub use http::HttpLauncher;

/// Polling interval used by `PageSession::wait_for`.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Reference to an element matched by a locator on the current page.
///
/// Handles are resolved again on use, so they become stale after the
/// session navigates elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle {
    pub locator: Locator,
    pub index: usize,
}

impl ElementHandle {
    pub fn new(locator: &Locator, index: usize) -> Self {
        Self {
            locator: locator.clone(),
            index,
        }
    }
}

/// An isolated browsing session (one tab).
#[async_trait]
pub trait PageSession: Send {
    /// Load a page and make it current.
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// All elements on the current page matching the locator.
    async fn query_all(&mut self, locator: &Locator) -> Result<Vec<ElementHandle>>;

    /// First element matching the locator, if any.
    async fn query(&mut self, locator: &Locator) -> Result<Option<ElementHandle>> {
        Ok(self.query_all(locator).await?.into_iter().next())
    }

    /// Attribute value, `None` when the attribute is absent.
    async fn attribute(&mut self, handle: &ElementHandle, name: &str) -> Result<Option<String>>;

    /// Text content of an element; text nodes are separated by newlines.
    async fn text(&mut self, handle: &ElementHandle) -> Result<String>;

    async fn click(&mut self, handle: &ElementHandle) -> Result<()>;

    async fn fill_text(&mut self, handle: &ElementHandle, text: &str) -> Result<()>;

    /// Scroll to the end of the page to trigger lazy loading.
    async fn scroll_to_bottom(&mut self) -> Result<()>;

    /// Poll for an element until it appears or the timeout elapses.
    async fn wait_for(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<Option<ElementHandle>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(handle) = self.query(locator).await? {
                return Ok(Some(handle));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Opens one session per worker.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn open(&self, worker_id: usize) -> Result<Box<dyn PageSession>>;
}

/// A session cookie as exported from a browser.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

impl Cookie {
    /// Whether the cookie applies to the given host.
    pub fn matches_host(&self, host: &str) -> bool {
        let domain = self.domain.trim_start_matches('.');
        host == domain || host.ends_with(&format!(".{domain}"))
    }
}

/// Load the cookie export once at startup.
pub fn load_cookies(path: &Path) -> Result<Vec<Cookie>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        AppError::config(format!("Cannot read cookies from {}: {e}", path.display()))
    })?;
    let cookies: Vec<Cookie> = serde_json::from_str(&content)?;
    log::info!("Loaded {} cookies from {}", cookies.len(), path.display());
    Ok(cookies)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_cookie_host_matching() {
        let cookie = Cookie {
            name: "sid".into(),
            value: "x".into(),
            domain: ".websummit.com".into(),
            path: "/".into(),
        };
        assert!(cookie.matches_host("attend.websummit.com"));
        assert!(cookie.matches_host("websummit.com"));
        assert!(!cookie.matches_host("notwebsummit.com"));
    }

    #[test]
    fn test_load_cookies_ignores_extra_fields() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cookies.json");
        std::fs::write(
            &path,
            r#"[{"name":"sid","value":"abc","domain":"example.com","httpOnly":true,"secure":true}]"#,
        )
        .unwrap();

        let cookies = load_cookies(&path).unwrap();
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].path, "/");
    }

    #[test]
    fn test_load_cookies_missing_file_is_config_error() {
        let tmp = TempDir::new().unwrap();
        let err = load_cookies(&tmp.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
