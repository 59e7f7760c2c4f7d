// src/models/selectors.rs

//! Element locators for the listing, detail and action surfaces.

use serde::{Deserialize, Serialize};

/// A CSS selector with an optional text filter.
///
/// `has_text` keeps only elements whose text contains the given string,
/// which covers controls that are identified by their label rather than
/// by markup (e.g. a "Send request" button).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Locator {
    /// CSS selector
    pub css: String,

    /// Substring the element text must contain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_text: Option<String>,
}

impl Locator {
    /// Locator matching a plain CSS selector.
    pub fn css(css: impl Into<String>) -> Self {
        Self {
            css: css.into(),
            has_text: None,
        }
    }

    /// Restrict this locator to elements containing `text`.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.has_text = Some(text.into());
        self
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.has_text {
            Some(text) => write!(f, "{} (text: {:?})", self.css, text),
            None => write!(f, "{}", self.css),
        }
    }
}

/// Locators used on the listing and detail pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSelectors {
    /// Links to detail pages on the listing surface
    #[serde(default = "defaults::profile_link")]
    pub profile_link: Locator,

    /// Indicator shown while more listing content is loading
    #[serde(default = "defaults::loading_indicator")]
    pub loading_indicator: Locator,

    /// Main content region of a detail page
    #[serde(default = "defaults::main_region")]
    pub main_region: Locator,

    /// Labelled region listing the groups a profile belongs to
    #[serde(default = "defaults::groups_region")]
    pub groups_region: Locator,
}

impl Default for PageSelectors {
    fn default() -> Self {
        Self {
            profile_link: defaults::profile_link(),
            loading_indicator: defaults::loading_indicator(),
            main_region: defaults::main_region(),
            groups_region: defaults::groups_region(),
        }
    }
}

/// Locators for the multi-step action dialog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSelectors {
    /// Control that opens the action dialog
    #[serde(default = "defaults::trigger")]
    pub trigger: Locator,

    /// Attribute on a disabled trigger explaining why it is disabled
    #[serde(default = "defaults::disabled_reason_attr")]
    pub disabled_reason_attr: String,

    /// The dialog itself
    #[serde(default = "defaults::dialog")]
    pub dialog: Locator,

    /// Location options, tried in order; the first match is clicked
    #[serde(default = "defaults::location_options")]
    pub location_options: Vec<Locator>,

    /// Time slot options, tried in order; the first match is clicked
    #[serde(default = "defaults::slot_options")]
    pub slot_options: Vec<Locator>,

    /// Free-text message input
    #[serde(default = "defaults::message_input")]
    pub message_input: Locator,

    /// Final submit control
    #[serde(default = "defaults::submit")]
    pub submit: Locator,
}

impl Default for ActionSelectors {
    fn default() -> Self {
        Self {
            trigger: defaults::trigger(),
            disabled_reason_attr: defaults::disabled_reason_attr(),
            dialog: defaults::dialog(),
            location_options: defaults::location_options(),
            slot_options: defaults::slot_options(),
            message_input: defaults::message_input(),
            submit: defaults::submit(),
        }
    }
}

mod defaults {
    use super::Locator;

    pub fn profile_link() -> Locator {
        Locator::css(r#"a[href*="/profiles/"]"#)
    }
    pub fn loading_indicator() -> Locator {
        Locator::css("div, span, p").with_text("Loading...")
    }
    pub fn main_region() -> Locator {
        Locator::css("main")
    }
    pub fn groups_region() -> Locator {
        Locator::css(r#"[aria-label="Communities"]"#)
    }

    pub fn trigger() -> Locator {
        Locator::css("button").with_text("Request Meeting")
    }
    pub fn disabled_reason_attr() -> String {
        "data-bs-original-title".into()
    }
    pub fn dialog() -> Locator {
        Locator::css(r#"[role="dialog"]"#)
    }
    pub fn location_options() -> Vec<Locator> {
        vec![
            Locator::css(r#"label[for^="location_"]:not([for^="location_time_slot_"])"#),
            Locator::css(r#"a[href*="load_location_slots"]"#),
        ]
    }
    pub fn slot_options() -> Vec<Locator> {
        vec![
            Locator::css(".slot-card"),
            Locator::css(r#"label[for^="location_time_slot_"]"#),
        ]
    }
    pub fn message_input() -> Locator {
        Locator::css(r#"textarea[name="description"]"#)
    }
    pub fn submit() -> Locator {
        Locator::css("button").with_text("Send request")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_display() {
        assert_eq!(Locator::css("main").to_string(), "main");
        assert_eq!(
            Locator::css("button").with_text("Go").to_string(),
            "button (text: \"Go\")"
        );
    }

    #[test]
    fn test_locator_from_toml() {
        let locator: Locator = toml::from_str(
            r#"
            css = "button"
            has_text = "Send request"
            "#,
        )
        .unwrap();
        assert_eq!(locator, Locator::css("button").with_text("Send request"));
    }
}
