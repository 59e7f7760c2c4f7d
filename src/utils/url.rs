// src/utils/url.rs

//! Detail page URL handling.

use regex::Regex;
use url::Url;

use crate::error::{AppError, Result};

/// Canonical form of a detail link: resolved against `origin`, with query
/// and fragment removed.
///
/// # Examples
/// ```
/// use outreach::utils::url::canonical_url;
/// use url::Url;
///
/// let origin = Url::parse("https://example.com").unwrap();
/// assert_eq!(
///     canonical_url(&origin, "/profiles/7?ref=list#top"),
///     Some("https://example.com/profiles/7".to_string())
/// );
/// ```
pub fn canonical_url(origin: &Url, href: &str) -> Option<String> {
    let mut url = origin.join(href.trim()).ok()?;
    url.set_query(None);
    url.set_fragment(None);
    Some(url.to_string())
}

/// Extracts the profile identifier that follows a path marker
/// such as `/profiles/`.
#[derive(Debug, Clone)]
pub struct ProfileIdPattern {
    regex: Regex,
}

impl ProfileIdPattern {
    pub fn new(marker: &str) -> Result<Self> {
        let pattern = format!("{}([^/?#]+)", regex::escape(marker));
        let regex = Regex::new(&pattern)
            .map_err(|e| AppError::config(format!("Invalid profile path '{marker}': {e}")))?;
        Ok(Self { regex })
    }

    /// Whether the URL points at a detail page.
    pub fn matches(&self, url: &str) -> bool {
        self.regex.is_match(url)
    }

    /// Identifier of the last marker occurrence in the URL.
    pub fn extract(&self, url: &str) -> Option<String> {
        self.regex
            .captures_iter(url)
            .last()
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }
}
