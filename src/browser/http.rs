// src/browser/http.rs

//! Static HTML sessions over HTTP.
//!
//! Pages are fetched with `reqwest` and queried with `scraper`. There is no
//! script execution, so scrolling never loads more content, clicking only
//! follows links and text inputs cannot be filled. This is enough for
//! discovery-only runs against server-rendered listings.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::browser::{Cookie, ElementHandle, PageSession, SessionLauncher};
use crate::error::{AppError, Result};
use crate::models::{BrowserConfig, Locator};
use crate::utils::resolve_url;

/// Launches HTTP sessions that share one cookie-carrying client.
pub struct HttpLauncher {
    client: Client,
}

impl HttpLauncher {
    /// Build a client carrying the cookies that apply to the configured origin.
    pub fn new(config: &BrowserConfig, cookies: &[Cookie]) -> Result<Self> {
        let origin = Url::parse(&config.origin)?;
        let host = origin.host_str().unwrap_or_default();

        let cookie_header = cookies
            .iter()
            .filter(|c| c.matches_host(host))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ");

        let mut headers = HeaderMap::new();
        if !cookie_header.is_empty() {
            let value = HeaderValue::from_str(&cookie_header)
                .map_err(|e| AppError::config(format!("Invalid cookie value: {e}")))?;
            headers.insert(COOKIE, value);
        }

        if !config.headless {
            log::debug!("HTTP sessions have no window; headless setting ignored");
        }

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl SessionLauncher for HttpLauncher {
    async fn open(&self, worker_id: usize) -> Result<Box<dyn PageSession>> {
        log::debug!("[Worker {}] Opening HTTP session", worker_id);
        Ok(Box::new(HttpSession {
            client: self.client.clone(),
            current: None,
            html: String::new(),
        }))
    }
}

/// One static page at a time.
pub struct HttpSession {
    client: Client,
    current: Option<Url>,
    html: String,
}

impl HttpSession {
    fn parse_selector(s: &str) -> Result<Selector> {
        Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
    }

    fn element_text(element: &ElementRef<'_>) -> String {
        element.text().collect::<Vec<_>>().join("\n")
    }

    /// Run `f` over the elements matching `locator` on the current page.
    ///
    /// The parsed document never outlives this call, which keeps the
    /// session `Send` across awaits.
    fn with_matches<T>(
        &self,
        locator: &Locator,
        f: impl FnOnce(Vec<ElementRef<'_>>) -> T,
    ) -> Result<T> {
        let selector = Self::parse_selector(&locator.css)?;
        let document = Html::parse_document(&self.html);
        let matches = document
            .select(&selector)
            .filter(|el| match &locator.has_text {
                Some(text) => Self::element_text(el).contains(text.as_str()),
                None => true,
            })
            .collect();
        Ok(f(matches))
    }

    fn stale(handle: &ElementHandle) -> AppError {
        AppError::session(format!(
            "element #{} of '{}' is no longer on the page",
            handle.index, handle.locator
        ))
    }
}

#[async_trait]
impl PageSession for HttpSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        let target = Url::parse(url)?;
        let response = self
            .client
            .get(target.clone())
            .send()
            .await?
            .error_for_status()?;
        self.html = response.text().await?;
        self.current = Some(target);
        Ok(())
    }

    async fn query_all(&mut self, locator: &Locator) -> Result<Vec<ElementHandle>> {
        self.with_matches(locator, |matches| {
            (0..matches.len())
                .map(|i| ElementHandle::new(locator, i))
                .collect()
        })
    }

    async fn attribute(&mut self, handle: &ElementHandle, name: &str) -> Result<Option<String>> {
        self.with_matches(&handle.locator, |matches| {
            matches
                .get(handle.index)
                .map(|el| el.value().attr(name).map(str::to_string))
        })?
        .ok_or_else(|| Self::stale(handle))
    }

    async fn text(&mut self, handle: &ElementHandle) -> Result<String> {
        self.with_matches(&handle.locator, |matches| {
            matches.get(handle.index).map(Self::element_text)
        })?
        .ok_or_else(|| Self::stale(handle))
    }

    async fn click(&mut self, handle: &ElementHandle) -> Result<()> {
        let (tag, href) = self
            .with_matches(&handle.locator, |matches| {
                matches.get(handle.index).map(|el| {
                    (
                        el.value().name().to_string(),
                        el.value().attr("href").map(str::to_string),
                    )
                })
            })?
            .ok_or_else(|| Self::stale(handle))?;

        let base = self
            .current
            .clone()
            .ok_or_else(|| AppError::session("no page loaded"))?;

        match href {
            Some(href) if tag == "a" => {
                let target = resolve_url(&base, &href);
                self.navigate(&target).await
            }
            _ => Err(AppError::session(format!(
                "static session cannot click <{tag}>"
            ))),
        }
    }

    async fn fill_text(&mut self, handle: &ElementHandle, _text: &str) -> Result<()> {
        Err(AppError::session(format!(
            "static session cannot fill '{}'",
            handle.locator
        )))
    }

    async fn scroll_to_bottom(&mut self) -> Result<()> {
        log::debug!("Static page; scrolling loads nothing");
        Ok(())
    }
}
