use chrono::{DateTime, Utc};
use klaxon_common::clock::Clock;
use klaxon_common::types::{Alert, AlertState, EscalationRecord, NotificationStatus};
use klaxon_notify::dispatcher::Dispatcher;
use klaxon_policy::PolicyEngine;
use klaxon_store::AlertStore;
use std::sync::Arc;
use tokio::time::{interval, Duration};

use crate::Result;

/// Periodic sweep over open alerts.
///
/// Every tick runs two passes: escalation for active, unacknowledged
/// alerts (an alert whose suppression window has lapsed counts as active
/// again) and auto-resolution for active-or-acknowledged alerts whose
/// timeout has elapsed. A failure while processing one alert is logged
/// and the sweep continues with the rest.
///
/// `tick` is public so tests drive a single pass synchronously instead of
/// waiting on the interval.
pub struct EscalationSweep {
    store: Arc<dyn AlertStore>,
    policy: Arc<PolicyEngine>,
    dispatcher: Arc<Dispatcher>,
    clock: Arc<dyn Clock>,
    interval_secs: u64,
}

impl EscalationSweep {
    pub fn new(
        store: Arc<dyn AlertStore>,
        policy: Arc<PolicyEngine>,
        dispatcher: Arc<Dispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let interval_secs = policy.settings().check_interval_secs;
        Self {
            store,
            policy,
            dispatcher,
            clock,
            interval_secs,
        }
    }

    pub async fn run(&self) {
        tracing::info!(
            interval_secs = self.interval_secs,
            "Escalation sweep started"
        );
        let mut tick = interval(Duration::from_secs(self.interval_secs));
        loop {
            tick.tick().await;
            self.tick(self.clock.now()).await;
        }
    }

    /// One sweep pass at the given instant.
    pub async fn tick(&self, now: DateTime<Utc>) {
        let alerts = match self.store.active_alerts().await {
            Ok(alerts) => alerts,
            Err(e) => {
                tracing::error!(error = %e, "Sweep could not list open alerts");
                return;
            }
        };

        for alert in &alerts {
            if let Err(e) = self.check_escalation(alert, now).await {
                tracing::error!(alert_id = %alert.id, error = %e, "Escalation check failed");
            }
        }
        for alert in &alerts {
            if let Err(e) = self.check_auto_resolve(alert, now).await {
                tracing::error!(alert_id = %alert.id, error = %e, "Auto-resolve check failed");
            }
        }
    }

    async fn check_escalation(&self, alert: &Alert, now: DateTime<Utc>) -> Result<()> {
        // Escalation applies to unacknowledged alerts only; an intact
        // suppression window also holds it back.
        if alert.acknowledged_at.is_some() || alert.state == AlertState::Acknowledged {
            return Ok(());
        }
        if alert.is_suppressed(now) {
            return Ok(());
        }

        let Some(rule) = self.policy.next_pending_rule(alert, now) else {
            return Ok(());
        };
        // next_pending_rule already skips recorded levels; the audit trail
        // check stays as the idempotency guard against concurrent sweeps.
        if alert.has_escalated(rule.level) {
            return Ok(());
        }
        if !self.policy.should_escalate(alert, rule, now) {
            return Ok(());
        }

        let age_minutes = alert.age_minutes(now);
        let records = self.dispatcher.send_escalation(alert, rule, age_minutes).await;
        let delivered = records
            .iter()
            .any(|r| r.status == NotificationStatus::Sent);

        tracing::info!(
            alert_id = %alert.id,
            level = rule.level,
            age_minutes,
            delivered,
            "Alert escalated"
        );

        let mut updated = alert.clone();
        updated.escalations.push(EscalationRecord {
            alert_id: alert.id.clone(),
            level: rule.level,
            escalated_at: now,
            recipients: rule.recipients.clone(),
            channels: rule.channels.clone(),
            success: delivered,
        });
        updated.notifications.extend(records);
        updated.updated_at = now;
        self.store.update(&updated).await?;
        Ok(())
    }

    async fn check_auto_resolve(&self, alert: &Alert, now: DateTime<Utc>) -> Result<()> {
        if !alert.auto_resolve {
            return Ok(());
        }
        let Some(timeout_minutes) = alert.auto_resolve_after_minutes else {
            return Ok(());
        };
        let eligible = matches!(
            alert.state,
            AlertState::Active | AlertState::Acknowledged
        ) || (alert.state == AlertState::Suppressed && !alert.is_suppressed(now));
        if !eligible {
            return Ok(());
        }
        if alert.age_minutes(now) < timeout_minutes {
            return Ok(());
        }

        let mut updated = alert.clone();
        updated.state = AlertState::Resolved;
        if updated.resolved_at.is_none() {
            updated.resolved_at = Some(now);
            updated.resolved_by = Some("auto-resolve".to_string());
        }
        updated.metadata.insert(
            "resolution_note".to_string(),
            serde_json::json!(format!(
                "auto-resolved after {timeout_minutes} minutes without manual intervention"
            )),
        );
        updated.updated_at = now;
        self.store.update(&updated).await?;
        tracing::info!(
            alert_id = %alert.id,
            timeout_minutes,
            "Alert auto-resolved"
        );
        Ok(())
    }
}
