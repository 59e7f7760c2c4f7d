//! Storage abstractions for record persistence.
//!
//! Every record is keyed by its profile id. Implementations must make the
//! existence check and the insert a single atomic step, since several
//! workers may extract the same profile at the same time.
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── config.toml           # Pipeline configuration
//! ├── cookies.json          # Session cookies
//! └── records.db            # SQLite records table, UNIQUE profile id
//! ```

pub mod local;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Profile, Record, StoreStats};

// Re-export for convenience
pub use local::LocalStore;

/// Row id assigned by the store on insert.
pub type StoreId = u64;

/// Trait for record storage backends.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Check whether a record with this id exists.
    async fn exists(&self, id: &str) -> Result<bool>;

    /// Insert a new pending record.
    ///
    /// Fails with `AppError::DuplicateKey` when the id is already present.
    async fn insert(&self, profile: &Profile) -> Result<StoreId>;

    /// Fetch a record, failing with `AppError::NotFound` when absent.
    async fn get(&self, id: &str) -> Result<Record>;

    /// Record a successful action. No-op when the id is absent.
    async fn mark_sent(&self, id: &str) -> Result<()>;

    /// Record a failed action. No-op when the id is absent or already sent.
    async fn mark_failed(&self, id: &str, message: &str) -> Result<()>;

    /// Aggregate counts taken from a single snapshot.
    async fn stats(&self) -> Result<StoreStats>;

    /// Records with no recorded action attempt, oldest first.
    async fn pending(&self, limit: Option<usize>) -> Result<Vec<Record>>;
}
