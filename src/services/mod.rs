//! Service layer for the outreach pipeline.
//!
//! This module contains the business logic for:
//! - Listing discovery (`DiscoveryEngine`)
//! - Detail page extraction (`ProfileExtractor`)
//! - The request dialog (`ActionRunner`)
//! - Message personalization (`Personalizer`)
//! - The per-record workflow (`ItemProcessor`)

pub mod action;
pub mod discovery;
pub mod extract;
pub mod personalizer;
pub mod processor;

pub use action::{ActionRunner, StepOutcome};
pub use discovery::DiscoveryEngine;
pub use extract::ProfileExtractor;
pub use personalizer::{ChatCompletionGenerator, LineGenerator, Personalizer};
pub use processor::{ItemProcessor, ProcessOutcome};
