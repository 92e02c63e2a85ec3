use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use klaxon_common::types::{Alert, AlertCategory};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::DedupError;

/// Maximum entries retained per category bucket.
const MAX_BUCKET: usize = 1000;
/// Absolute lifetime of a whole bucket before it is reset.
const BUCKET_TTL_HOURS: i64 = 24;

/// Store of recently created alerts, bucketed by category.
///
/// The reference implementation is [`MemoryDedupStore`]; deployments that
/// want the window to survive restarts can back this with an external
/// cache instead.
#[async_trait]
pub trait DedupStore: Send + Sync {
    /// Alerts of the category whose trigger time falls inside the last
    /// `window_minutes`, most recent first.
    async fn recent_alerts(
        &self,
        category: AlertCategory,
        window_minutes: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<Alert>, DedupError>;

    /// Adds a freshly created alert to its category bucket.
    async fn register(&self, alert: &Alert) -> Result<(), DedupError>;

    /// Drops one category's bucket, or every bucket when `category` is
    /// `None`.
    async fn clear(&self, category: Option<AlertCategory>) -> Result<(), DedupError>;
}

struct Bucket {
    /// Most recent first.
    entries: VecDeque<Alert>,
    created_at: DateTime<Utc>,
}

/// In-process dedup store: per-category capped deque with a whole-bucket
/// 24-hour expiry.
pub struct MemoryDedupStore {
    buckets: Mutex<HashMap<AlertCategory, Bucket>>,
}

impl MemoryDedupStore {
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryDedupStore {
    fn default() -> Self {
        Self::new()
    }
}

fn bucket_expired(bucket: &Bucket, now: DateTime<Utc>) -> bool {
    now - bucket.created_at > Duration::hours(BUCKET_TTL_HOURS)
}

#[async_trait]
impl DedupStore for MemoryDedupStore {
    async fn recent_alerts(
        &self,
        category: AlertCategory,
        window_minutes: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<Alert>, DedupError> {
        let mut buckets = self
            .buckets
            .lock()
            .map_err(|e| DedupError::Store(e.to_string()))?;

        let Some(bucket) = buckets.get_mut(&category) else {
            return Ok(Vec::new());
        };
        if bucket_expired(bucket, now) {
            buckets.remove(&category);
            return Ok(Vec::new());
        }

        let cutoff = now - Duration::minutes(window_minutes);
        Ok(bucket
            .entries
            .iter()
            .filter(|a| a.triggered_at >= cutoff)
            .cloned()
            .collect())
    }

    async fn register(&self, alert: &Alert) -> Result<(), DedupError> {
        let mut buckets = self
            .buckets
            .lock()
            .map_err(|e| DedupError::Store(e.to_string()))?;

        let now = alert.created_at;
        let bucket = buckets.entry(alert.category).or_insert_with(|| Bucket {
            entries: VecDeque::new(),
            created_at: now,
        });
        if bucket_expired(bucket, now) {
            bucket.entries.clear();
            bucket.created_at = now;
        }

        bucket.entries.push_front(alert.clone());
        bucket.entries.truncate(MAX_BUCKET);
        Ok(())
    }

    async fn clear(&self, category: Option<AlertCategory>) -> Result<(), DedupError> {
        let mut buckets = self
            .buckets
            .lock()
            .map_err(|e| DedupError::Store(e.to_string()))?;
        match category {
            Some(cat) => {
                buckets.remove(&cat);
            }
            None => buckets.clear(),
        }
        Ok(())
    }
}
