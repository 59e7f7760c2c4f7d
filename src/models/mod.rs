// src/models/mod.rs

//! Domain models for the outreach pipeline.

mod config;
mod record;
mod selectors;

// Re-export all public types
pub use config::{
    ActionConfig, BrowserBackend, BrowserConfig, Config, DiscoveryConfig, DispatchStrategy,
    LineTemplate, MatchField, PersonalizerConfig, ReferenceGroup, RunMode, WorkerConfig,
};
pub use record::{ActionStatus, Profile, Record, StoreStats};
pub use selectors::{ActionSelectors, Locator, PageSelectors};
