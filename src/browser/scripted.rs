//! In-memory site used by tests.
//!
//! The listing reveals one batch of links per scroll. Detail pages and the
//! action dialog are described by `ScriptedProfile`. Every submitted action
//! is recorded so tests can assert at-most-once behaviour.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::browser::{ElementHandle, PageSession, SessionLauncher};
use crate::error::{AppError, Result};
use crate::models::{ActionSelectors, Config, Locator, PageSelectors};

pub const ORIGIN: &str = "https://attend.example.com";

/// Config pointing at the scripted site with all delays removed.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.browser.listing_url = format!("{ORIGIN}/lis25/discovery");
    config.browser.origin = ORIGIN.to_string();
    config.discovery.scroll_settle_ms = 0;
    config.worker.request_delay_ms = 0;
    config.worker.page_settle_ms = 0;
    config.worker.listing_settle_ms = 0;
    config.action.step_settle_ms = 0;
    config.action.wait_timeout_ms = 20;
    config
}

/// Canonical detail URL for a scripted id.
pub fn profile_url(id: u32) -> String {
    format!("{ORIGIN}/lis25/profiles/{id}")
}

/// Relative link as it appears on the listing.
pub fn profile_href(id: u32) -> String {
    format!("/lis25/profiles/{id}?from=discovery")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Absent,
    Enabled,
    Disabled(String),
}

/// A detail page and its action dialog.
#[derive(Debug, Clone)]
pub struct ScriptedProfile {
    pub lines: Vec<String>,
    pub groups: Vec<String>,
    pub trigger: Trigger,
    pub dialog: bool,
    pub locations: usize,
    pub slots: usize,
    pub message_input: bool,
    pub submit: bool,
}

impl ScriptedProfile {
    pub fn new(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(|s| s.to_string()).collect(),
            groups: Vec::new(),
            trigger: Trigger::Enabled,
            dialog: true,
            locations: 2,
            slots: 3,
            message_input: true,
            submit: true,
        }
    }

    /// A complete profile named after its id.
    pub fn sample(id: u32) -> Self {
        let name = format!("Person {id}");
        let org = format!("Org {id}");
        Self::new(&[
            "Attendee",
            &name,
            "Head of Data",
            &org,
            "Working on logistics software",
            "Lisbon",
            "Logistics",
        ])
    }

    pub fn with_groups(mut self, groups: &[&str]) -> Self {
        self.groups = groups.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn without_submit(mut self) -> Self {
        self.submit = false;
        self
    }

    pub fn without_dialog(mut self) -> Self {
        self.dialog = false;
        self
    }
}

/// An action that reached the submit control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub url: String,
    pub message: Option<String>,
    pub location_selected: bool,
    pub slot_selected: bool,
}

#[derive(Debug, Default)]
struct SiteLog {
    scrolls: usize,
    sessions: usize,
    navigations: Vec<String>,
    submissions: Vec<Submission>,
}

pub struct ScriptedSite {
    listing_url: String,
    page: PageSelectors,
    action: ActionSelectors,
    batches: Vec<Vec<String>>,
    /// Indicator stays visible while a session has scrolled fewer times;
    /// `None` keeps it visible forever.
    loading_passes: Option<usize>,
    profiles: HashMap<String, ScriptedProfile>,
    unreachable: HashSet<String>,
    failing_workers: HashSet<usize>,
    log: Mutex<SiteLog>,
}

impl ScriptedSite {
    pub fn new(config: &Config) -> Self {
        Self {
            listing_url: config.browser.listing_url.clone(),
            page: config.discovery.selectors.clone(),
            action: config.action.selectors.clone(),
            batches: Vec::new(),
            loading_passes: None,
            profiles: HashMap::new(),
            unreachable: HashSet::new(),
            failing_workers: HashSet::new(),
            log: Mutex::new(SiteLog::default()),
        }
    }

    pub fn with_batches(mut self, batches: Vec<Vec<String>>) -> Self {
        self.batches = batches;
        self
    }

    pub fn with_loading_passes(mut self, passes: usize) -> Self {
        self.loading_passes = Some(passes);
        self
    }

    pub fn with_stuck_loading(mut self) -> Self {
        self.loading_passes = None;
        self
    }

    /// Listing with one batch per id group; the indicator disappears on the
    /// scroll after the last batch is shown.
    pub fn with_listing(self, batches: &[&[u32]]) -> Self {
        let passes = batches.len();
        self.with_batches(
            batches
                .iter()
                .map(|ids| ids.iter().map(|id| profile_href(*id)).collect())
                .collect(),
        )
        .with_loading_passes(passes)
    }

    pub fn with_profile(mut self, id: u32, profile: ScriptedProfile) -> Self {
        self.profiles.insert(profile_url(id), profile);
        self
    }

    pub fn with_unreachable(mut self, id: u32) -> Self {
        self.unreachable.insert(profile_url(id));
        self
    }

    pub fn with_failing_worker(mut self, worker_id: usize) -> Self {
        self.failing_workers.insert(worker_id);
        self
    }

    pub fn launcher(self: &Arc<Self>) -> ScriptedLauncher {
        ScriptedLauncher {
            site: Arc::clone(self),
        }
    }

    pub fn scrolls(&self) -> usize {
        self.log.lock().unwrap().scrolls
    }

    pub fn sessions_opened(&self) -> usize {
        self.log.lock().unwrap().sessions
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.log.lock().unwrap().submissions.clone()
    }

    pub fn navigations_to(&self, url: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .navigations
            .iter()
            .filter(|n| n.as_str() == url)
            .count()
    }
}

pub struct ScriptedLauncher {
    site: Arc<ScriptedSite>,
}

#[async_trait]
impl SessionLauncher for ScriptedLauncher {
    async fn open(&self, worker_id: usize) -> Result<Box<dyn PageSession>> {
        if self.site.failing_workers.contains(&worker_id) {
            return Err(AppError::session(format!(
                "cannot open tab for worker {worker_id}"
            )));
        }
        self.site.log.lock().unwrap().sessions += 1;
        Ok(Box::new(ScriptedSession {
            site: Arc::clone(&self.site),
            current: None,
            scrolls: 0,
            dialog_open: false,
            location_selected: false,
            slot_selected: false,
            filled: None,
        }))
    }
}

pub struct ScriptedSession {
    site: Arc<ScriptedSite>,
    current: Option<String>,
    scrolls: usize,
    dialog_open: bool,
    location_selected: bool,
    slot_selected: bool,
    filled: Option<String>,
}

impl ScriptedSession {
    fn on_listing(&self) -> bool {
        self.current.as_deref() == Some(self.site.listing_url.as_str())
    }

    fn current_profile(&self) -> Option<&ScriptedProfile> {
        self.current
            .as_ref()
            .and_then(|url| self.site.profiles.get(url))
    }

    fn visible_links(&self) -> Vec<String> {
        let shown = (self.scrolls + 1).min(self.site.batches.len());
        self.site.batches[..shown].concat()
    }

    fn loading_visible(&self) -> bool {
        self.site
            .loading_passes
            .is_none_or(|passes| self.scrolls < passes)
    }

    fn is_first_location(&self, locator: &Locator) -> bool {
        self.site.action.location_options.first() == Some(locator)
    }

    fn is_first_slot(&self, locator: &Locator) -> bool {
        self.site.action.slot_options.first() == Some(locator)
    }

    fn count(&self, locator: &Locator) -> usize {
        let page = &self.site.page;
        let action = &self.site.action;

        if self.on_listing() {
            if *locator == page.profile_link {
                return self.visible_links().len();
            }
            if *locator == page.loading_indicator {
                return usize::from(self.loading_visible());
            }
            return 0;
        }

        let Some(profile) = self.current_profile() else {
            return 0;
        };
        let open = self.dialog_open;

        if *locator == page.main_region {
            usize::from(!profile.lines.is_empty())
        } else if *locator == page.groups_region {
            usize::from(!profile.groups.is_empty())
        } else if *locator == action.trigger {
            usize::from(profile.trigger != Trigger::Absent)
        } else if *locator == action.dialog {
            usize::from(open)
        } else if self.is_first_location(locator) {
            if open { profile.locations } else { 0 }
        } else if self.is_first_slot(locator) {
            if open { profile.slots } else { 0 }
        } else if *locator == action.message_input {
            usize::from(open && profile.message_input)
        } else if *locator == action.submit {
            usize::from(open && profile.submit)
        } else {
            0
        }
    }

    fn check(&self, handle: &ElementHandle) -> Result<()> {
        if handle.index < self.count(&handle.locator) {
            Ok(())
        } else {
            Err(AppError::session(format!("stale handle {}", handle.locator)))
        }
    }
}

#[async_trait]
impl PageSession for ScriptedSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.site.log.lock().unwrap().navigations.push(url.to_string());
        if self.site.unreachable.contains(url) {
            return Err(AppError::session(format!("net::ERR_CONNECTION_RESET at {url}")));
        }
        self.current = Some(url.to_string());
        self.dialog_open = false;
        self.location_selected = false;
        self.slot_selected = false;
        self.filled = None;
        if self.on_listing() {
            self.scrolls = 0;
        }
        Ok(())
    }

    async fn query_all(&mut self, locator: &Locator) -> Result<Vec<ElementHandle>> {
        Ok((0..self.count(locator))
            .map(|i| ElementHandle::new(locator, i))
            .collect())
    }

    async fn attribute(&mut self, handle: &ElementHandle, name: &str) -> Result<Option<String>> {
        self.check(handle)?;
        if self.on_listing() && handle.locator == self.site.page.profile_link {
            return Ok(if name == "href" {
                self.visible_links().get(handle.index).cloned()
            } else {
                None
            });
        }
        if handle.locator == self.site.action.trigger {
            if let Some(Trigger::Disabled(reason)) = self.current_profile().map(|p| &p.trigger) {
                if name == "disabled" {
                    return Ok(Some(String::new()));
                }
                if name == self.site.action.disabled_reason_attr {
                    return Ok(Some(reason.clone()));
                }
            }
        }
        Ok(None)
    }

    async fn text(&mut self, handle: &ElementHandle) -> Result<String> {
        self.check(handle)?;
        let Some(profile) = self.current_profile() else {
            return Ok(String::new());
        };
        if handle.locator == self.site.page.main_region {
            // Blank lines and padding like real rendered text.
            return Ok(format!("\n   {}  \n\n", profile.lines.join("\n\n  ")));
        }
        if handle.locator == self.site.page.groups_region {
            return Ok(profile.groups.join("\n"));
        }
        Ok(String::new())
    }

    async fn click(&mut self, handle: &ElementHandle) -> Result<()> {
        self.check(handle)?;
        let action = self.site.action.clone();
        let Some(profile) = self.current_profile().cloned() else {
            return Ok(());
        };

        if handle.locator == action.trigger {
            if matches!(profile.trigger, Trigger::Disabled(_)) {
                return Err(AppError::session("trigger is disabled"));
            }
            self.dialog_open = profile.dialog;
        } else if self.is_first_location(&handle.locator) {
            self.location_selected = true;
        } else if self.is_first_slot(&handle.locator) {
            self.slot_selected = true;
        } else if handle.locator == action.submit {
            let submission = Submission {
                url: self.current.clone().unwrap_or_default(),
                message: self.filled.clone(),
                location_selected: self.location_selected,
                slot_selected: self.slot_selected,
            };
            self.site.log.lock().unwrap().submissions.push(submission);
            self.dialog_open = false;
        }
        Ok(())
    }

    async fn fill_text(&mut self, handle: &ElementHandle, text: &str) -> Result<()> {
        self.check(handle)?;
        if handle.locator == self.site.action.message_input {
            self.filled = Some(text.to_string());
        }
        Ok(())
    }

    async fn scroll_to_bottom(&mut self) -> Result<()> {
        self.scrolls += 1;
        self.site.log.lock().unwrap().scrolls += 1;
        Ok(())
    }
}
