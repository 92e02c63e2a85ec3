//! Alert deduplication: similarity matching over a window of recently
//! created alerts.
//!
//! Each category can carry a [`DedupRule`] describing which criteria make
//! two alerts "the same incident" (shared source, equal severity, physical
//! proximity, similar message text) and how far apart in time they may
//! arrive. The [`Deduplicator`] composes the rule table, the
//! [`cache::DedupStore`] and the pure matcher in [`matcher`]; a category
//! with no rule is never deduplicated. Store failures are surfaced as
//! [`DedupError`] so the lifecycle engine can choose availability over
//! precision (it treats them as "not a duplicate").

pub mod cache;
pub mod matcher;


use chrono::{DateTime, Utc};
use klaxon_common::types::{Alert, AlertCategory, CreateAlertRequest};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use cache::DedupStore;
use matcher::{Candidate, MatchResult};

/// Per-category deduplication configuration.
///
/// Static configuration, mutable only through an explicit administrative
/// update; injected into the [`Deduplicator`] at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupRule {
    /// Maximum distance in minutes between the two trigger timestamps.
    pub time_window_minutes: i64,
    /// When set, candidate and existing locations must lie within this
    /// many meters of each other for the location criterion to count.
    #[serde(default)]
    pub location_radius_m: Option<f64>,
    #[serde(default)]
    pub require_same_source: bool,
    #[serde(default)]
    pub require_same_severity: bool,
    /// Jaccard word-set similarity floor for the message criterion.
    #[serde(default)]
    pub message_similarity_threshold: Option<f64>,
}

/// Errors from the deduplication store.
#[derive(Debug, thiserror::Error)]
pub enum DedupError {
    /// The backing store could not be read or written.
    #[error("Dedup: store unavailable: {0}")]
    Store(String),
}

/// Composes rule lookup, the recent-alert store and the similarity matcher.
pub struct Deduplicator {
    rules: HashMap<AlertCategory, DedupRule>,
    store: Arc<dyn DedupStore>,
}

impl Deduplicator {
    pub fn new(rules: HashMap<AlertCategory, DedupRule>, store: Arc<dyn DedupStore>) -> Self {
        Self { rules, store }
    }

    /// Checks an incoming request against recent alerts of the same
    /// category. `Ok(None)` means no match; a category without a rule is
    /// never a duplicate. Store errors are surfaced so the caller can
    /// decide how to degrade.
    pub async fn is_duplicate(
        &self,
        request: &CreateAlertRequest,
        now: DateTime<Utc>,
    ) -> Result<Option<MatchResult>, DedupError> {
        let Some(rule) = self.rules.get(&request.category) else {
            return Ok(None);
        };

        let recent = self
            .store
            .recent_alerts(request.category, rule.time_window_minutes, now)
            .await?;

        let candidate = Candidate::from_request(request, now);
        Ok(recent
            .iter()
            .find_map(|existing| matcher::matches(&candidate, existing, rule)))
    }

    /// Registers a freshly created alert in the recent-alert store.
    pub async fn register(&self, alert: &Alert) -> Result<(), DedupError> {
        self.store.register(alert).await
    }

    /// Administrative cache flush, either one category or everything.
    pub async fn clear(&self, category: Option<AlertCategory>) -> Result<(), DedupError> {
        self.store.clear(category).await
    }

    pub fn rule(&self, category: AlertCategory) -> Option<&DedupRule> {
        self.rules.get(&category)
    }
}
