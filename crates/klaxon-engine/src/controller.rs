use chrono::Duration;
use klaxon_actions::RecommendationEngine;
use klaxon_common::clock::Clock;
use klaxon_common::types::{
    Alert, AlertCategory, AlertFilter, AlertState, AlertStats, ChannelKind, CreateAlertRequest,
    EscalationRule, RiskAssessment, RiskLevel, SensorHealthEvent, Severity,
};
use klaxon_dedup::Deduplicator;
use klaxon_notify::dispatcher::Dispatcher;
use klaxon_store::AlertStore;
use serde::Deserialize;
use std::sync::Arc;

use crate::{EngineError, Result};

/// Delays for the two standard escalation levels generated on risk alerts.
const RISK_LEVEL1_DELAY_MINUTES: i64 = 15;
const RISK_LEVEL2_DELAY_MINUTES: i64 = 30;

/// Probability at or above which an assessment alerts regardless of level.
const RISK_PROBABILITY_FLOOR: f64 = 0.7;

/// Controller-level settings for generated escalation ladders.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    /// Contact names placed on escalation rules generated for risk alerts.
    #[serde(default)]
    pub risk_escalation_recipients: Vec<String>,
    #[serde(default = "default_risk_escalation_channels")]
    pub risk_escalation_channels: Vec<ChannelKind>,
}

fn default_risk_escalation_channels() -> Vec<ChannelKind> {
    vec![ChannelKind::Email, ChannelKind::Sms]
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            risk_escalation_recipients: Vec::new(),
            risk_escalation_channels: default_risk_escalation_channels(),
        }
    }
}

/// Result of an alert-creation call. When the input matched a recent
/// alert, `deduplicated` is true and `alert` is the existing record.
#[derive(Debug, Clone)]
pub struct CreateOutcome {
    pub alert: Alert,
    pub deduplicated: bool,
}

/// Orchestrates the alert write path and lifecycle transitions.
pub struct AlertController {
    store: Arc<dyn AlertStore>,
    dedup: Arc<Deduplicator>,
    recommender: Arc<RecommendationEngine>,
    dispatcher: Arc<Dispatcher>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
}

impl AlertController {
    pub fn new(
        store: Arc<dyn AlertStore>,
        dedup: Arc<Deduplicator>,
        recommender: Arc<RecommendationEngine>,
        dispatcher: Arc<Dispatcher>,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            dedup,
            recommender,
            dispatcher,
            clock,
            settings,
        }
    }

    /// Creates an alert from a validated request, unless it duplicates a
    /// recent one — then the existing alert is returned instead.
    ///
    /// Recommendation generation, notification fan-out and dedup
    /// registration are auxiliary: their failures are logged and the
    /// created alert is still returned.
    pub async fn create_alert(&self, request: CreateAlertRequest) -> Result<CreateOutcome> {
        validate(&request)?;
        let now = self.clock.now();

        match self.dedup.is_duplicate(&request, now).await {
            Ok(Some(matched)) => match self.store.get(&matched.alert_id).await {
                Ok(Some(existing)) => {
                    tracing::info!(
                        alert_id = %existing.id,
                        category = %request.category,
                        score = matched.score,
                        time_delta_minutes = matched.time_delta_minutes,
                        "Duplicate event folded into existing alert"
                    );
                    return Ok(CreateOutcome {
                        alert: existing,
                        deduplicated: true,
                    });
                }
                Ok(None) => {
                    tracing::warn!(
                        alert_id = %matched.alert_id,
                        "Dedup cache pointed at a missing alert, creating anew"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        alert_id = %matched.alert_id,
                        error = %e,
                        "Failed to load deduplicated alert, creating anew"
                    );
                }
            },
            Ok(None) => {}
            // Availability over precision: a broken dedup store must not
            // stop alert creation.
            Err(e) => {
                tracing::warn!(
                    category = %request.category,
                    error = %e,
                    "Dedup check failed, treating as not duplicate"
                );
            }
        }

        let mut alert = Alert {
            id: request
                .id
                .clone()
                .unwrap_or_else(klaxon_common::id::next_id),
            category: request.category,
            severity: request.severity,
            state: AlertState::Active,
            title: request.title.clone(),
            message: request.message.clone(),
            location: request.location,
            source_id: request.source_id.clone(),
            escalation_rules: request.escalation_rules.clone(),
            escalations: Vec::new(),
            notifications: Vec::new(),
            metadata: request.metadata.clone(),
            tags: request.tags.clone(),
            priority: request
                .priority
                .unwrap_or_else(|| default_priority(request.severity)),
            auto_resolve: request.auto_resolve,
            auto_resolve_after_minutes: request.auto_resolve_after_minutes,
            created_at: now,
            triggered_at: request.triggered_at.unwrap_or(now),
            acknowledged_at: None,
            acknowledged_by: None,
            resolved_at: None,
            resolved_by: None,
            suppressed_until: None,
            updated_at: now,
        };

        if request.category == AlertCategory::Risk && request.source_id.is_some() {
            match self.recommender.recommend(&request) {
                Ok(actions) => {
                    alert.metadata.insert(
                        "recommended_actions".to_string(),
                        serde_json::json!(actions),
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        alert_id = %alert.id,
                        error = %e,
                        "Recommendation generation failed, creating alert without actions"
                    );
                }
            }
        }

        self.store.create(&alert).await?;
        tracing::info!(
            alert_id = %alert.id,
            category = %alert.category,
            severity = %alert.severity,
            priority = alert.priority,
            "Alert created"
        );

        alert.notifications = self.dispatcher.send_initial_notifications(&alert).await;
        if !alert.notifications.is_empty() {
            if let Err(e) = self.store.update(&alert).await {
                tracing::warn!(alert_id = %alert.id, error = %e, "Failed to persist notification records");
            }
        }

        if let Err(e) = self.dedup.register(&alert).await {
            tracing::warn!(alert_id = %alert.id, error = %e, "Dedup registration failed");
        }

        Ok(CreateOutcome {
            alert,
            deduplicated: false,
        })
    }

    /// Decides whether a derived risk assessment warrants an alert and,
    /// if so, builds a risk alert with a generated escalation ladder.
    pub async fn process_risk_assessment(
        &self,
        assessment: RiskAssessment,
    ) -> Result<Option<CreateOutcome>> {
        let should_alert = assessment.risk_level > RiskLevel::Low
            || assessment.risk_probability >= RISK_PROBABILITY_FLOOR;
        if !should_alert {
            tracing::debug!(
                assessment_id = %assessment.id,
                risk_level = ?assessment.risk_level,
                probability = assessment.risk_probability,
                "Risk assessment below alerting threshold"
            );
            return Ok(None);
        }

        let severity = match assessment.risk_level {
            RiskLevel::Critical => Severity::Emergency,
            RiskLevel::High => Severity::Critical,
            _ => Severity::Warning,
        };

        let mut rules = vec![
            EscalationRule {
                level: 1,
                delay_minutes: RISK_LEVEL1_DELAY_MINUTES,
                recipients: self.settings.risk_escalation_recipients.clone(),
                channels: self.settings.risk_escalation_channels.clone(),
                conditions: Vec::new(),
            },
            EscalationRule {
                level: 2,
                delay_minutes: RISK_LEVEL2_DELAY_MINUTES,
                recipients: self.settings.risk_escalation_recipients.clone(),
                channels: self.settings.risk_escalation_channels.clone(),
                conditions: Vec::new(),
            },
        ];
        if assessment.risk_level == RiskLevel::Critical {
            rules.insert(
                0,
                EscalationRule {
                    level: 0,
                    delay_minutes: 0,
                    recipients: self.settings.risk_escalation_recipients.clone(),
                    channels: self.settings.risk_escalation_channels.clone(),
                    conditions: Vec::new(),
                },
            );
        }

        let mut metadata = std::collections::HashMap::new();
        metadata.insert("assessment_id".into(), serde_json::json!(assessment.id));
        metadata.insert(
            "risk_level".into(),
            serde_json::json!(assessment.risk_level),
        );
        metadata.insert(
            "risk_probability".into(),
            serde_json::json!(assessment.risk_probability),
        );
        if let Some(ttf) = assessment.time_to_failure_hours {
            metadata.insert("time_to_failure_hours".into(), serde_json::json!(ttf));
        }
        if !assessment.contributing_factors.is_empty() {
            metadata.insert(
                "contributing_factors".into(),
                serde_json::json!(assessment.contributing_factors),
            );
        }
        if !assessment.affected_infrastructure.is_empty() {
            metadata.insert(
                "affected_infrastructure".into(),
                serde_json::json!(assessment.affected_infrastructure),
            );
        }
        if let Some(cost) = assessment.estimated_cost {
            metadata.insert("estimated_cost".into(), serde_json::json!(cost));
        }

        let message = if assessment.contributing_factors.is_empty() {
            format!(
                "Assessed failure probability {:.0}% for {}",
                assessment.risk_probability * 100.0,
                assessment.source_id
            )
        } else {
            format!(
                "Assessed failure probability {:.0}% for {}. Contributing factors: {}",
                assessment.risk_probability * 100.0,
                assessment.source_id,
                assessment.contributing_factors.join(", ")
            )
        };

        let level_str = match assessment.risk_level {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        };
        let request = CreateAlertRequest {
            id: None,
            category: AlertCategory::Risk,
            severity,
            title: format!("{level_str} risk on {}", assessment.source_id),
            message,
            location: assessment.location,
            source_id: Some(assessment.source_id.clone()),
            escalation_rules: rules,
            metadata,
            tags: Vec::new(),
            priority: Some((assessment.risk_probability * 100.0).round() as u32),
            auto_resolve: false,
            auto_resolve_after_minutes: None,
            triggered_at: Some(assessment.assessed_at),
        };

        self.create_alert(request).await.map(Some)
    }

    /// Maps a sensor-health event onto an alert category; unmapped event
    /// types are dropped without an alert.
    pub async fn process_sensor_event(
        &self,
        event: SensorHealthEvent,
    ) -> Result<Option<CreateOutcome>> {
        let Some(category) = map_sensor_event_type(&event.event_type) else {
            tracing::debug!(
                sensor_id = %event.sensor_id,
                event_type = %event.event_type,
                "Unmapped sensor event type, dropping"
            );
            return Ok(None);
        };

        let severity = event.severity.unwrap_or(default_sensor_severity(category));
        let request = CreateAlertRequest {
            id: None,
            category,
            severity,
            title: format!(
                "{} on {}",
                category.as_str().replace('_', " "),
                event.sensor_id
            ),
            message: event
                .message
                .clone()
                .unwrap_or_else(|| format!("Sensor {} reported {}", event.sensor_id, event.event_type)),
            location: event.location,
            source_id: Some(event.sensor_id.clone()),
            escalation_rules: Vec::new(),
            metadata: std::collections::HashMap::new(),
            tags: Vec::new(),
            priority: None,
            auto_resolve: false,
            auto_resolve_after_minutes: None,
            triggered_at: Some(event.occurred_at),
        };

        self.create_alert(request).await.map(Some)
    }

    /// Marks an alert acknowledged. Idempotent: acknowledging an already
    /// acknowledged or resolved alert is a no-op.
    pub async fn acknowledge_alert(&self, id: &str, by: &str) -> Result<Alert> {
        if by.trim().is_empty() {
            return Err(EngineError::Validation("acknowledging actor is required".into()));
        }
        let mut alert = self.load(id).await?;
        match alert.state {
            AlertState::Acknowledged | AlertState::Resolved => return Ok(alert),
            AlertState::Active | AlertState::Suppressed => {}
        }

        let now = self.clock.now();
        alert.state = AlertState::Acknowledged;
        if alert.acknowledged_at.is_none() {
            alert.acknowledged_at = Some(now);
            alert.acknowledged_by = Some(by.to_string());
        }
        alert.updated_at = now;
        self.store.update(&alert).await?;
        tracing::info!(alert_id = %alert.id, by = %by, "Alert acknowledged");
        Ok(alert)
    }

    /// Resolves an alert, capturing an optional resolution note in
    /// metadata. Idempotent on already-resolved alerts.
    pub async fn resolve_alert(&self, id: &str, by: &str, note: Option<&str>) -> Result<Alert> {
        if by.trim().is_empty() {
            return Err(EngineError::Validation("resolving actor is required".into()));
        }
        let mut alert = self.load(id).await?;
        if alert.state == AlertState::Resolved {
            return Ok(alert);
        }

        let now = self.clock.now();
        alert.state = AlertState::Resolved;
        if alert.resolved_at.is_none() {
            alert.resolved_at = Some(now);
            alert.resolved_by = Some(by.to_string());
        }
        if let Some(note) = note {
            alert
                .metadata
                .insert("resolution_note".to_string(), serde_json::json!(note));
        }
        alert.updated_at = now;
        self.store.update(&alert).await?;
        tracing::info!(alert_id = %alert.id, by = %by, "Alert resolved");
        Ok(alert)
    }

    /// Suppresses an alert for a bounded window, recording who and why.
    /// Resolved and acknowledged alerts are left unchanged.
    pub async fn suppress_alert(
        &self,
        id: &str,
        by: &str,
        minutes: i64,
        reason: Option<&str>,
    ) -> Result<Alert> {
        if by.trim().is_empty() {
            return Err(EngineError::Validation("suppressing actor is required".into()));
        }
        if minutes <= 0 {
            return Err(EngineError::Validation(
                "suppression window must be positive".into(),
            ));
        }
        let mut alert = self.load(id).await?;
        match alert.state {
            AlertState::Resolved | AlertState::Acknowledged => {
                tracing::debug!(alert_id = %alert.id, state = %alert.state, "Suppress is a no-op in this state");
                return Ok(alert);
            }
            AlertState::Active | AlertState::Suppressed => {}
        }

        let now = self.clock.now();
        alert.state = AlertState::Suppressed;
        alert.suppressed_until = Some(now + Duration::minutes(minutes));
        alert
            .metadata
            .insert("suppressed_by".to_string(), serde_json::json!(by));
        if let Some(reason) = reason {
            alert
                .metadata
                .insert("suppression_reason".to_string(), serde_json::json!(reason));
        }
        alert.updated_at = now;
        self.store.update(&alert).await?;
        tracing::info!(alert_id = %alert.id, by = %by, minutes, "Alert suppressed");
        Ok(alert)
    }

    /// Filtered, paginated alert listing.
    pub async fn get_alerts(
        &self,
        filter: &AlertFilter,
        page: usize,
        limit: usize,
    ) -> Result<(Vec<Alert>, u64)> {
        Ok(self.store.find(filter, page, limit).await?)
    }

    /// Aggregate counts over the filtered set.
    pub async fn get_alert_stats(&self, filter: &AlertFilter) -> Result<AlertStats> {
        Ok(self.store.stats(filter).await?)
    }

    /// Every open (non-resolved) alert.
    pub async fn get_active_alerts(&self) -> Result<Vec<Alert>> {
        Ok(self.store.active_alerts().await?)
    }

    async fn load(&self, id: &str) -> Result<Alert> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(id.to_string()))
    }
}

fn validate(request: &CreateAlertRequest) -> Result<()> {
    if request.title.trim().is_empty() {
        return Err(EngineError::Validation("alert title is required".into()));
    }
    if request.message.trim().is_empty() {
        return Err(EngineError::Validation("alert message is required".into()));
    }
    if request.id.as_deref().is_some_and(|id| id.trim().is_empty()) {
        return Err(EngineError::Validation(
            "alert id, when supplied, must be non-empty".into(),
        ));
    }
    Ok(())
}

fn default_priority(severity: Severity) -> u32 {
    match severity {
        Severity::Info => 25,
        Severity::Warning => 50,
        Severity::Critical => 75,
        Severity::Emergency => 95,
    }
}

fn map_sensor_event_type(event_type: &str) -> Option<AlertCategory> {
    match event_type {
        "failure" => Some(AlertCategory::SensorFailure),
        "battery_low" => Some(AlertCategory::BatteryLow),
        "communication_loss" => Some(AlertCategory::CommunicationLoss),
        "calibration_due" => Some(AlertCategory::CalibrationDue),
        "maintenance_required" => Some(AlertCategory::MaintenanceRequired),
        _ => None,
    }
}

fn default_sensor_severity(category: AlertCategory) -> Severity {
    match category {
        AlertCategory::SensorFailure => Severity::Critical,
        AlertCategory::CalibrationDue => Severity::Info,
        _ => Severity::Warning,
    }
}
