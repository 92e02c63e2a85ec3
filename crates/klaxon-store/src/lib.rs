//! Persistence contract for alert records.
//!
//! The relational store backing a production deployment is an external
//! collaborator; this crate defines the interface the engine programs
//! against, plus [`memory::MemoryAlertStore`] used by tests and the
//! bundled daemon.

pub mod memory;

use async_trait::async_trait;
use klaxon_common::types::{Alert, AlertFilter, AlertStats};

/// Errors that can occur within the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No alert exists with the given identifier.
    #[error("Store: alert not found (id={0})")]
    NotFound(String),

    /// An alert with the given identifier already exists.
    #[error("Store: alert already exists (id={0})")]
    Conflict(String),

    /// The backing store could not be reached.
    #[error("Store: backend unavailable: {0}")]
    Unavailable(String),
}

/// Convenience `Result` alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Persistence backend for alert records, keyed by alert identifier.
///
/// Implementations must be safe to share across tasks because the store
/// is hit concurrently by ingestion and the periodic sweep; the engine
/// accepts last-write-wins semantics here.
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Persists a new alert. Fails with [`StoreError::Conflict`] when the
    /// identifier is already taken.
    async fn create(&self, alert: &Alert) -> Result<()>;

    /// Fetches one alert by identifier.
    async fn get(&self, id: &str) -> Result<Option<Alert>>;

    /// Replaces the stored alert. Fails with [`StoreError::NotFound`]
    /// when the identifier is unknown.
    async fn update(&self, alert: &Alert) -> Result<()>;

    /// Filtered, paginated listing (newest trigger first) plus the total
    /// matching count. `page` is 1-based.
    async fn find(&self, filter: &AlertFilter, page: usize, limit: usize)
        -> Result<(Vec<Alert>, u64)>;

    /// Aggregate counts over the filtered set.
    async fn stats(&self, filter: &AlertFilter) -> Result<AlertStats>;

    /// Every open (non-resolved) alert. The periodic sweep iterates this.
    async fn active_alerts(&self) -> Result<Vec<Alert>>;
}
