//! Alert lifecycle orchestration.
//!
//! [`controller::AlertController`] is the write path: it deduplicates
//! inbound events, attaches recommended actions to risk alerts, persists
//! through the store seam, and fans out initial notifications.
//! [`sweep::EscalationSweep`] is the time path: a fixed-interval task that
//! re-evaluates every open alert for escalation and auto-resolution.
//! Auxiliary failures (recommendations, notification delivery, dedup
//! registration) degrade the result but never abort alert creation.

pub mod controller;
pub mod sweep;

#[cfg(test)]
mod tests;

use klaxon_store::StoreError;

/// Errors surfaced to callers of the lifecycle API.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The request is missing required fields or carries invalid values.
    /// Rejected before any side effect.
    #[error("Engine: validation failed: {0}")]
    Validation(String),

    /// No alert exists with the given identifier.
    #[error("Engine: alert not found (id={0})")]
    NotFound(String),

    /// The persistence collaborator failed on the primary path.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Convenience `Result` alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
