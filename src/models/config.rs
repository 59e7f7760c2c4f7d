//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{ActionSelectors, PageSelectors};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Session and HTTP settings
    #[serde(default)]
    pub browser: BrowserConfig,

    /// Listing traversal settings
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Worker pool and pacing
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Action dialog settings
    #[serde(default)]
    pub action: ActionConfig,

    /// Message personalization
    #[serde(default)]
    pub personalizer: PersonalizerConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.browser.listing_url)
            .map_err(|e| AppError::validation(format!("browser.listing_url: {e}")))?;
        url::Url::parse(&self.browser.origin)
            .map_err(|e| AppError::validation(format!("browser.origin: {e}")))?;
        if self.browser.timeout_secs == 0 {
            return Err(AppError::validation("browser.timeout_secs must be > 0"));
        }
        if self.discovery.profile_path.trim().is_empty() {
            return Err(AppError::validation("discovery.profile_path is empty"));
        }
        if self.discovery.stall_limit == 0 {
            return Err(AppError::validation("discovery.stall_limit must be > 0"));
        }
        if self.worker.workers == 0 {
            return Err(AppError::validation("worker.workers must be > 0"));
        }
        if self.worker.batch_size == 0 {
            return Err(AppError::validation("worker.batch_size must be > 0"));
        }
        if self.action.wait_timeout_ms == 0 {
            return Err(AppError::validation("action.wait_timeout_ms must be > 0"));
        }
        if !self.personalizer.template.contains("{second_line}") {
            return Err(AppError::validation(
                "personalizer.template must contain {second_line}",
            ));
        }
        if self.personalizer.default_references.is_empty() {
            return Err(AppError::validation(
                "personalizer.default_references is empty",
            ));
        }
        Ok(())
    }

    /// Resolve the cookies file against the storage directory.
    pub fn cookies_path(&self, storage_dir: &Path) -> PathBuf {
        storage_dir.join(&self.browser.cookies_file)
    }
}

/// Whether the pipeline only collects records or also performs the action.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    #[default]
    DiscoverOnly,
    FullAction,
}

/// How identifiers are distributed over workers.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStrategy {
    /// Every worker runs its own discovery pass
    #[default]
    Duplicated,
    /// One discovery pass, split into contiguous chunks
    Partitioned,
}

impl std::str::FromStr for DispatchStrategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "duplicated" => Ok(Self::Duplicated),
            "partitioned" => Ok(Self::Partitioned),
            other => Err(AppError::config(format!("unknown strategy '{other}'"))),
        }
    }
}

/// How pages are loaded and driven.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BrowserBackend {
    /// Chromium over the DevTools protocol
    #[default]
    Chrome,
    /// Static HTML over HTTP; no scripts, clicks on links only
    Http,
}

impl BrowserBackend {
    /// Whether sessions can click buttons and fill text inputs.
    pub fn can_act(&self) -> bool {
        matches!(self, Self::Chrome)
    }

    /// Whether this build ships the backend.
    pub fn is_available(&self) -> bool {
        match self {
            Self::Chrome => cfg!(feature = "chrome"),
            Self::Http => true,
        }
    }
}

impl std::str::FromStr for BrowserBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "chrome" => Ok(Self::Chrome),
            "http" => Ok(Self::Http),
            other => Err(AppError::config(format!("unknown backend '{other}'"))),
        }
    }
}

/// Browsing session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Listing page that discovery starts from
    #[serde(default = "defaults::listing_url")]
    pub listing_url: String,

    /// Origin used to resolve relative links
    #[serde(default = "defaults::origin")]
    pub origin: String,

    /// User-Agent header for page requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Session backend
    #[serde(default)]
    pub backend: BrowserBackend,

    /// Run sessions without a visible window
    #[serde(default = "defaults::headless")]
    pub headless: bool,

    /// Cookie export, relative to the storage directory
    #[serde(default = "defaults::cookies_file")]
    pub cookies_file: String,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            listing_url: defaults::listing_url(),
            origin: defaults::origin(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            backend: BrowserBackend::default(),
            headless: defaults::headless(),
            cookies_file: defaults::cookies_file(),
        }
    }
}

/// Listing traversal settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Path marker that identifies detail page URLs
    #[serde(default = "defaults::profile_path")]
    pub profile_path: String,

    /// Delay after each scroll in milliseconds
    #[serde(default = "defaults::scroll_settle")]
    pub scroll_settle_ms: u64,

    /// Passes without growth before giving up
    #[serde(default = "defaults::stall_limit")]
    pub stall_limit: usize,

    /// Listing and detail page locators
    #[serde(default)]
    pub selectors: PageSelectors,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            profile_path: defaults::profile_path(),
            scroll_settle_ms: defaults::scroll_settle(),
            stall_limit: defaults::stall_limit(),
            selectors: PageSelectors::default(),
        }
    }
}

/// Worker pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of concurrent workers
    #[serde(default = "defaults::workers")]
    pub workers: usize,

    #[serde(default)]
    pub strategy: DispatchStrategy,

    #[serde(default)]
    pub mode: RunMode,

    /// Report store stats every N processed items
    #[serde(default = "defaults::batch_size")]
    pub batch_size: u64,

    /// Delay after each processed item in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Delay after navigating to a detail page in milliseconds
    #[serde(default = "defaults::page_settle")]
    pub page_settle_ms: u64,

    /// Delay after opening the listing page in milliseconds
    #[serde(default = "defaults::listing_settle")]
    pub listing_settle_ms: u64,

    /// Stop all workers once the action limit is reported
    #[serde(default = "defaults::stop_on_limit")]
    pub stop_on_limit: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workers: defaults::workers(),
            strategy: DispatchStrategy::default(),
            mode: RunMode::default(),
            batch_size: defaults::batch_size(),
            request_delay_ms: defaults::request_delay(),
            page_settle_ms: defaults::page_settle(),
            listing_settle_ms: defaults::listing_settle(),
            stop_on_limit: defaults::stop_on_limit(),
        }
    }
}

/// Action dialog settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionConfig {
    #[serde(default)]
    pub selectors: ActionSelectors,

    /// Delay between dialog steps in milliseconds
    #[serde(default = "defaults::step_settle")]
    pub step_settle_ms: u64,

    /// Upper bound for waiting on the dialog in milliseconds
    #[serde(default = "defaults::wait_timeout")]
    pub wait_timeout_ms: u64,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            selectors: ActionSelectors::default(),
            step_settle_ms: defaults::step_settle(),
            wait_timeout_ms: defaults::wait_timeout(),
        }
    }
}

/// Profile field scanned by a reference group.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchField {
    Category,
    Title,
    Bio,
}

/// Keywords that select a set of reference clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceGroup {
    pub name: String,

    /// Lowercase keywords matched by substring
    pub keywords: Vec<String>,

    /// Profile fields the keywords are matched against
    pub fields: Vec<MatchField>,

    /// Clients referenced when the group matches
    pub clients: Vec<String>,
}

/// A second-line pattern offered to the generator.
///
/// `{title}` and `{company}` are filled from the profile before the prompt
/// is sent. Bracketed placeholders such as `[RELEVANT_CLIENT]` are left for
/// the generator to fill.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineTemplate {
    pub name: String,

    /// When the generator should pick this pattern
    pub when: String,

    pub text: String,
}

/// Message personalization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalizerConfig {
    /// Message body; `{name}` and `{second_line}` are substituted
    #[serde(default = "defaults::template")]
    pub template: String,

    #[serde(default = "defaults::reference_groups")]
    pub references: Vec<ReferenceGroup>,

    /// Clients used when no group matches
    #[serde(default = "defaults::default_references")]
    pub default_references: Vec<String>,

    /// Second-line patterns the generator chooses from
    #[serde(default = "defaults::line_templates")]
    pub line_templates: Vec<LineTemplate>,

    /// Chat completion model
    #[serde(default = "defaults::model")]
    pub model: String,

    /// OpenAI-compatible API base URL
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Environment variable holding the API key
    #[serde(default = "defaults::api_key_env")]
    pub api_key_env: String,
}

impl Default for PersonalizerConfig {
    fn default() -> Self {
        Self {
            template: defaults::template(),
            references: defaults::reference_groups(),
            default_references: defaults::default_references(),
            line_templates: defaults::line_templates(),
            model: defaults::model(),
            base_url: defaults::base_url(),
            api_key_env: defaults::api_key_env(),
        }
    }
}

mod defaults {
    use super::{LineTemplate, MatchField, ReferenceGroup};

    // Browser defaults
    pub fn listing_url() -> String {
        "https://attend.websummit.com/lis25/discovery?active_tab=attendances".into()
    }
    pub fn origin() -> String {
        "https://attend.websummit.com".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; outreach/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn headless() -> bool {
        false
    }
    pub fn cookies_file() -> String {
        "cookies.json".into()
    }

    // Discovery defaults
    pub fn profile_path() -> String {
        "/profiles/".into()
    }
    pub fn scroll_settle() -> u64 {
        2000
    }
    pub fn stall_limit() -> usize {
        3
    }

    // Worker defaults
    pub fn workers() -> usize {
        5
    }
    pub fn batch_size() -> u64 {
        10
    }
    pub fn request_delay() -> u64 {
        3000
    }
    pub fn page_settle() -> u64 {
        1000
    }
    pub fn listing_settle() -> u64 {
        3000
    }
    pub fn stop_on_limit() -> bool {
        true
    }

    // Action defaults
    pub fn step_settle() -> u64 {
        1000
    }
    pub fn wait_timeout() -> u64 {
        5000
    }

    // Personalizer defaults
    pub fn template() -> String {
        "Dear {name}\n\n{second_line}\n\nWould be great to connect while we're both at the event.\n\nBest regards"
            .into()
    }
    pub fn model() -> String {
        "gpt-5-mini".into()
    }
    pub fn base_url() -> String {
        "https://api.openai.com/v1".into()
    }
    pub fn api_key_env() -> String {
        "OPENAI_API_KEY".into()
    }
    pub fn default_references() -> Vec<String> {
        vec![
            "Volkswagen Group".into(),
            "Siemens".into(),
            "Veolia".into(),
        ]
    }

    fn line(name: &str, when: &str, text: &str) -> LineTemplate {
        LineTemplate {
            name: name.to_string(),
            when: when.to_string(),
            text: text.to_string(),
        }
    }

    pub fn line_templates() -> Vec<LineTemplate> {
        vec![
            line(
                "ai_role",
                "their title is about AI, data or technology",
                "Saw you're {title} at {company}, the operational AI challenges you're likely \
                 facing are exactly what we've been solving for companies like [RELEVANT_CLIENT].",
            ),
            line(
                "specific_focus",
                "their bio names a concrete project or focus",
                "I see you're focused on [SPECIFIC_THING_FROM_PROFILE], that's fascinating \
                 because we just wrapped a project doing exactly that for [RELEVANT_CLIENT].",
            ),
            line(
                "industry",
                "their industry matches one of the clients",
                "Your work in [INDUSTRY] at {company} caught my eye, we've been doing similar \
                 AI integration work with [RELEVANT_CLIENT].",
            ),
            line(
                "browsing",
                "nothing more specific applies",
                "I was browsing the attendee list and noticed your work at {company}, we've \
                 been helping similar companies like [RELEVANT_CLIENT] with their AI transformation.",
            ),
        ]
    }

    fn group(
        name: &str,
        keywords: &[&str],
        fields: &[MatchField],
        clients: &[&str],
    ) -> ReferenceGroup {
        ReferenceGroup {
            name: name.to_string(),
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            fields: fields.to_vec(),
            clients: clients.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn reference_groups() -> Vec<ReferenceGroup> {
        use MatchField::{Bio, Category, Title};
        vec![
            group(
                "automotive",
                &["automotive", "car", "vehicle", "auto"],
                &[Category, Bio],
                &["Volkswagen Group", "Tata Motors", "Volvo Group"],
            ),
            group(
                "energy",
                &["energy", "oil", "gas", "petroleum", "renewable"],
                &[Category, Bio],
                &["Siemens", "Baker Hughes", "Halliburton"],
            ),
            group(
                "chemicals",
                &["chemical", "pharma", "pharmaceutical"],
                &[Category, Bio],
                &["BASF SE", "Croda International", "Avantor", "AstraZeneca"],
            ),
            group(
                "logistics",
                &["logistics", "supply chain", "shipping", "port"],
                &[Category, Bio],
                &["DB Schenker", "DSV", "Kuehne + Nagel", "DP World"],
            ),
            group(
                "water_environmental",
                &["water", "waste", "environmental", "sustainability"],
                &[Category, Bio],
                &["Veolia", "ACCIONA"],
            ),
            group(
                "infrastructure",
                &["infrastructure", "construction", "engineering"],
                &[Category, Bio],
                &["Ferrovial", "ACCIONA"],
            ),
            group(
                "consulting",
                &["consultant", "consulting", "advisory"],
                &[Title, Bio],
                &[
                    "McKinsey & Company",
                    "Bain & Company",
                    "The Boston Consulting Group",
                ],
            ),
            group(
                "tech_industrial",
                &["industrial", "manufacturing", "tech"],
                &[Category, Bio],
                &["Siemens", "ABB"],
            ),
            group(
                "software",
                &["software", "saas", "tech"],
                &[Category, Bio],
                &["Sage"],
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_workers() {
        let mut config = Config::default();
        config.worker.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_listing_url() {
        let mut config = Config::default();
        config.browser.listing_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_template_without_second_line() {
        let mut config = Config::default();
        config.personalizer.template = "Hello {name}".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [worker]
            workers = 2
            strategy = "partitioned"
            mode = "full_action"
            "#,
        )
        .unwrap();
        assert_eq!(config.worker.workers, 2);
        assert_eq!(config.worker.strategy, DispatchStrategy::Partitioned);
        assert_eq!(config.worker.mode, RunMode::FullAction);
        assert_eq!(config.worker.batch_size, 10);
        assert_eq!(config.discovery.stall_limit, 3);
        assert!(!config.personalizer.references.is_empty());
    }

    #[test]
    fn custom_line_templates_replace_defaults() {
        let config: Config = toml::from_str(
            r#"
            [[personalizer.line_templates]]
            name = "short"
            when = "always"
            text = "Hello from {company}."
            "#,
        )
        .unwrap();
        assert_eq!(config.personalizer.line_templates.len(), 1);
        assert_eq!(config.personalizer.line_templates[0].name, "short");
        assert_eq!(PersonalizerConfig::default().line_templates.len(), 4);
    }

    #[test]
    fn backend_defaults_to_chrome() {
        let config = Config::default();
        assert_eq!(config.browser.backend, BrowserBackend::Chrome);
        assert!(config.browser.backend.can_act());
        assert!(!BrowserBackend::Http.can_act());
        assert!(BrowserBackend::Http.is_available());
        assert_eq!(
            "HTTP".parse::<BrowserBackend>().unwrap(),
            BrowserBackend::Http
        );
        assert!("firefox".parse::<BrowserBackend>().is_err());
    }

    #[test]
    fn strategy_from_str() {
        assert_eq!(
            "Partitioned".parse::<DispatchStrategy>().unwrap(),
            DispatchStrategy::Partitioned
        );
        assert!("round_robin".parse::<DispatchStrategy>().is_err());
    }
}
