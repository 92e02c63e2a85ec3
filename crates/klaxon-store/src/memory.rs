use async_trait::async_trait;
use klaxon_common::types::{Alert, AlertFilter, AlertStats};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::{AlertStore, Result, StoreError};

/// In-process alert store backed by a `HashMap` behind an async lock.
pub struct MemoryAlertStore {
    alerts: RwLock<HashMap<String, Alert>>,
}

impl MemoryAlertStore {
    pub fn new() -> Self {
        Self {
            alerts: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryAlertStore {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_filter(alert: &Alert, filter: &AlertFilter) -> bool {
    if filter.category.is_some_and(|c| c != alert.category) {
        return false;
    }
    if filter.severity.is_some_and(|s| s != alert.severity) {
        return false;
    }
    if filter.state.is_some_and(|s| s != alert.state) {
        return false;
    }
    if let Some(source_id) = &filter.source_id {
        if alert.source_id.as_deref() != Some(source_id.as_str()) {
            return false;
        }
    }
    if let Some(tag) = &filter.tag {
        if !alert.has_tag(tag) {
            return false;
        }
    }
    if filter
        .triggered_after
        .is_some_and(|t| alert.triggered_at < t)
    {
        return false;
    }
    if filter
        .triggered_before
        .is_some_and(|t| alert.triggered_at > t)
    {
        return false;
    }
    true
}

#[async_trait]
impl AlertStore for MemoryAlertStore {
    async fn create(&self, alert: &Alert) -> Result<()> {
        let mut alerts = self.alerts.write().await;
        if alerts.contains_key(&alert.id) {
            return Err(StoreError::Conflict(alert.id.clone()));
        }
        alerts.insert(alert.id.clone(), alert.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Alert>> {
        Ok(self.alerts.read().await.get(id).cloned())
    }

    async fn update(&self, alert: &Alert) -> Result<()> {
        let mut alerts = self.alerts.write().await;
        if !alerts.contains_key(&alert.id) {
            return Err(StoreError::NotFound(alert.id.clone()));
        }
        alerts.insert(alert.id.clone(), alert.clone());
        Ok(())
    }

    async fn find(
        &self,
        filter: &AlertFilter,
        page: usize,
        limit: usize,
    ) -> Result<(Vec<Alert>, u64)> {
        let alerts = self.alerts.read().await;
        let mut matched: Vec<Alert> = alerts
            .values()
            .filter(|a| matches_filter(a, filter))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));

        let total = matched.len() as u64;
        let page = page.max(1);
        let items = matched
            .into_iter()
            .skip((page - 1) * limit)
            .take(limit)
            .collect();
        Ok((items, total))
    }

    async fn stats(&self, filter: &AlertFilter) -> Result<AlertStats> {
        let alerts = self.alerts.read().await;
        let mut stats = AlertStats::default();
        for alert in alerts.values().filter(|a| matches_filter(a, filter)) {
            stats.total += 1;
            if alert.state.is_open() {
                stats.active_count += 1;
            }
            *stats
                .by_severity
                .entry(alert.severity.to_string())
                .or_insert(0) += 1;
            *stats
                .by_category
                .entry(alert.category.to_string())
                .or_insert(0) += 1;
            *stats.by_state.entry(alert.state.to_string()).or_insert(0) += 1;
        }
        Ok(stats)
    }

    async fn active_alerts(&self) -> Result<Vec<Alert>> {
        let alerts = self.alerts.read().await;
        let mut open: Vec<Alert> = alerts
            .values()
            .filter(|a| a.state.is_open())
            .cloned()
            .collect();
        open.sort_by(|a, b| a.triggered_at.cmp(&b.triggered_at));
        Ok(open)
    }
}
