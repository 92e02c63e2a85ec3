use chrono::Utc;
use klaxon_common::types::{
    Alert, ChannelKind, EscalationRule, NotificationRecord, NotificationStatus, Severity,
};
use serde::Deserialize;
use std::collections::HashMap;

use crate::error::NotifyError;
use crate::template::{RenderedNotification, TemplateSet};
use crate::NotificationChannel;

/// A named contact with per-channel addresses. A contact missing the
/// address for some channel is skipped on that channel, not failed.
#[derive(Debug, Clone, Deserialize)]
pub struct Contact {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub push_token: Option<String>,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl Contact {
    fn address_for(&self, kind: ChannelKind) -> Option<&str> {
        match kind {
            ChannelKind::Email => self.email.as_deref(),
            ChannelKind::Sms => self.phone.as_deref(),
            ChannelKind::Push => self.push_token.as_deref(),
            ChannelKind::Webhook => self.webhook_url.as_deref(),
        }
    }
}

/// Severity-keyed channel fan-out table.
#[derive(Debug, Clone, Deserialize)]
pub struct FanoutPolicy {
    #[serde(default = "default_emergency_fanout")]
    pub emergency: Vec<ChannelKind>,
    #[serde(default = "default_critical_fanout")]
    pub critical: Vec<ChannelKind>,
    #[serde(default = "default_warning_fanout")]
    pub warning: Vec<ChannelKind>,
    #[serde(default = "default_info_fanout")]
    pub info: Vec<ChannelKind>,
}

fn default_emergency_fanout() -> Vec<ChannelKind> {
    vec![
        ChannelKind::Sms,
        ChannelKind::Email,
        ChannelKind::Push,
        ChannelKind::Webhook,
    ]
}

fn default_critical_fanout() -> Vec<ChannelKind> {
    vec![ChannelKind::Sms, ChannelKind::Email, ChannelKind::Push]
}

fn default_warning_fanout() -> Vec<ChannelKind> {
    vec![ChannelKind::Email, ChannelKind::Push]
}

fn default_info_fanout() -> Vec<ChannelKind> {
    vec![ChannelKind::Email]
}

impl Default for FanoutPolicy {
    fn default() -> Self {
        Self {
            emergency: default_emergency_fanout(),
            critical: default_critical_fanout(),
            warning: default_warning_fanout(),
            info: default_info_fanout(),
        }
    }
}

impl FanoutPolicy {
    pub fn channels_for(&self, severity: Severity) -> &[ChannelKind] {
        match severity {
            Severity::Emergency => &self.emergency,
            Severity::Critical => &self.critical,
            Severity::Warning => &self.warning,
            Severity::Info => &self.info,
        }
    }
}

/// Dispatcher-level settings (channel provider settings live in
/// [`crate::channels::ChannelSettings`]).
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchSettings {
    #[serde(default)]
    pub contacts: Vec<Contact>,
    /// Contact names notified on every alert.
    #[serde(default)]
    pub default_recipients: Vec<String>,
    /// Contact names additionally notified for emergency severity.
    #[serde(default)]
    pub emergency_contacts: Vec<String>,
    /// Ceiling on per-record delivery attempts across retry passes.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub fanout: FanoutPolicy,
}

fn default_max_retries() -> u32 {
    3
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            contacts: Vec::new(),
            default_recipients: Vec::new(),
            emergency_contacts: Vec::new(),
            max_retries: default_max_retries(),
            fanout: FanoutPolicy::default(),
        }
    }
}

/// Fans rendered notifications out across channels and recipients,
/// collecting one [`NotificationRecord`] per pair. No channel's send
/// blocks another; a failed pair never aborts the rest.
pub struct Dispatcher {
    channels: HashMap<ChannelKind, Box<dyn NotificationChannel>>,
    templates: TemplateSet,
    contacts: HashMap<String, Contact>,
    default_recipients: Vec<String>,
    emergency_contacts: Vec<String>,
    max_retries: u32,
    fanout: FanoutPolicy,
}

impl Dispatcher {
    pub fn new(
        channels: Vec<Box<dyn NotificationChannel>>,
        templates: TemplateSet,
        settings: DispatchSettings,
    ) -> Self {
        let channels = channels.into_iter().map(|c| (c.kind(), c)).collect();
        let contacts = settings
            .contacts
            .into_iter()
            .map(|c| (c.name.clone(), c))
            .collect();
        Self {
            channels,
            templates,
            contacts,
            default_recipients: settings.default_recipients,
            emergency_contacts: settings.emergency_contacts,
            max_retries: settings.max_retries,
            fanout: settings.fanout,
        }
    }

    pub fn templates(&self) -> &TemplateSet {
        &self.templates
    }

    /// Sends one rendered notification to one named contact through one
    /// channel kind and returns the attempt record. An unconfigured
    /// channel fails fast; a contact without an address for the kind is
    /// recorded as skipped.
    pub async fn send(
        &self,
        kind: ChannelKind,
        recipient: &str,
        rendered: &RenderedNotification,
        alert: &Alert,
    ) -> NotificationRecord {
        let (status, error) = self.deliver(kind, recipient, rendered, alert).await;
        if let Some(err) = &error {
            tracing::warn!(
                alert_id = %alert.id,
                channel = %kind,
                recipient = %recipient,
                error = %err,
                "Notification delivery failed"
            );
        }
        NotificationRecord {
            id: klaxon_common::id::next_id(),
            channel: kind,
            recipient: recipient.to_string(),
            status,
            error,
            attempts: 1,
            last_attempt_at: Utc::now(),
        }
    }

    async fn deliver(
        &self,
        kind: ChannelKind,
        recipient: &str,
        rendered: &RenderedNotification,
        alert: &Alert,
    ) -> (NotificationStatus, Option<String>) {
        let Some(channel) = self.channels.get(&kind) else {
            return (
                NotificationStatus::Failed,
                Some(NotifyError::ChannelNotConfigured(kind).to_string()),
            );
        };

        let Some(contact) = self.contacts.get(recipient) else {
            return (
                NotificationStatus::Failed,
                Some(format!("unknown recipient '{recipient}'")),
            );
        };
        let Some(address) = contact.address_for(kind) else {
            return (
                NotificationStatus::Skipped,
                Some(format!("contact '{recipient}' has no {kind} address")),
            );
        };

        match channel.send(alert, rendered, address).await {
            Ok(()) => (NotificationStatus::Sent, None),
            Err(e) => (NotificationStatus::Failed, Some(e.to_string())),
        }
    }

    /// Fans out over every (recipient × channel) pair concurrently,
    /// collecting a record per pair. Pairs are independent: a slow or
    /// failing channel never blocks the others.
    pub async fn dispatch(
        &self,
        alert: &Alert,
        kinds: &[ChannelKind],
        recipients: &[String],
        rendered: &RenderedNotification,
    ) -> Vec<NotificationRecord> {
        let sends = recipients.iter().flat_map(|recipient| {
            kinds
                .iter()
                .map(move |kind| self.send(*kind, recipient, rendered, alert))
        });
        futures::future::join_all(sends).await
    }

    /// Initial fan-out for a freshly created alert, driven by the
    /// severity table. Emergency severity adds the emergency contact
    /// list on top of the default recipients.
    pub async fn send_initial_notifications(&self, alert: &Alert) -> Vec<NotificationRecord> {
        let kinds = self.fanout.channels_for(alert.severity);
        let mut recipients = self.default_recipients.clone();
        if alert.severity == Severity::Emergency {
            for name in &self.emergency_contacts {
                if !recipients.contains(name) {
                    recipients.push(name.clone());
                }
            }
        }

        let rendered = self.templates.render(alert);
        let records = self.dispatch(alert, kinds, &recipients, &rendered).await;
        tracing::info!(
            alert_id = %alert.id,
            severity = %alert.severity,
            total = records.len(),
            failed = records
                .iter()
                .filter(|r| r.status == NotificationStatus::Failed)
                .count(),
            "Initial notification fan-out complete"
        );
        records
    }

    /// Re-attempts failed records below the retry ceiling; exhausted ones
    /// are skipped and logged. Returns the full updated record list.
    pub async fn retry_failed_notifications(&self, alert: &Alert) -> Vec<NotificationRecord> {
        let rendered = self.templates.render(alert);
        let mut updated = Vec::with_capacity(alert.notifications.len());

        for record in &alert.notifications {
            if record.status != NotificationStatus::Failed {
                updated.push(record.clone());
                continue;
            }
            if record.attempts >= self.max_retries {
                tracing::info!(
                    alert_id = %alert.id,
                    channel = %record.channel,
                    recipient = %record.recipient,
                    attempts = record.attempts,
                    "Notification retries exhausted, skipping"
                );
                updated.push(record.clone());
                continue;
            }

            let (status, error) = self
                .deliver(record.channel, &record.recipient, &rendered, alert)
                .await;
            updated.push(NotificationRecord {
                id: record.id.clone(),
                channel: record.channel,
                recipient: record.recipient.clone(),
                status,
                error,
                attempts: record.attempts + 1,
                last_attempt_at: Utc::now(),
            });
        }
        updated
    }

    /// Escalation fan-out: the rule names its own recipients and
    /// channels, and the template carries the alert's age and level.
    pub async fn send_escalation(
        &self,
        alert: &Alert,
        rule: &EscalationRule,
        age_minutes: i64,
    ) -> Vec<NotificationRecord> {
        let rendered = self
            .templates
            .render_escalation(alert, rule.level, age_minutes);
        self.dispatch(alert, &rule.channels, &rule.recipients, &rendered)
            .await
    }
}
