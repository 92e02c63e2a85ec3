use crate::controller::{AlertController, EngineSettings};
use crate::sweep::EscalationSweep;
use crate::EngineError;
use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use klaxon_actions::templates::{self, ActionTemplate};
use klaxon_actions::{CostModel, RecommendationEngine};
use klaxon_common::clock::{Clock, ManualClock};
use klaxon_common::types::{
    Alert, AlertCategory, AlertState, ChannelKind, CreateAlertRequest, EscalationRule,
    NotificationStatus, RiskAssessment, RiskLevel, SensorHealthEvent, Severity,
};
use klaxon_dedup::cache::MemoryDedupStore;
use klaxon_dedup::{DedupRule, Deduplicator};
use klaxon_notify::dispatcher::{Contact, DispatchSettings, Dispatcher};
use klaxon_notify::error::NotifyError;
use klaxon_notify::template::{RenderedNotification, TemplateSet};
use klaxon_notify::NotificationChannel;
use klaxon_policy::{EscalationSettings, PolicyEngine};
use klaxon_store::memory::MemoryAlertStore;
use klaxon_store::AlertStore;
use std::collections::HashMap;
use std::sync::Arc;

struct OkChannel(ChannelKind);

#[async_trait]
impl NotificationChannel for OkChannel {
    async fn send(
        &self,
        _alert: &Alert,
        _rendered: &RenderedNotification,
        _recipient: &str,
    ) -> Result<(), NotifyError> {
        Ok(())
    }

    fn kind(&self) -> ChannelKind {
        self.0
    }
}

struct Harness {
    controller: AlertController,
    sweep: EscalationSweep,
    store: Arc<MemoryAlertStore>,
    clock: Arc<ManualClock>,
    controller_dispatcher: Arc<Dispatcher>,
}

fn harness() -> Harness {
    harness_with_templates(templates::builtin_templates())
}

fn harness_with_templates(action_templates: HashMap<String, Vec<ActionTemplate>>) -> Harness {
    // Tuesday 10:00 UTC: weekday, inside business hours, day shift
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 6, 3, 10, 0, 0).unwrap(),
    ));
    let store = Arc::new(MemoryAlertStore::new());

    let mut dedup_rules = HashMap::new();
    dedup_rules.insert(
        AlertCategory::CommunicationLoss,
        DedupRule {
            time_window_minutes: 30,
            location_radius_m: None,
            require_same_source: true,
            require_same_severity: true,
            message_similarity_threshold: None,
        },
    );
    let dedup = Arc::new(Deduplicator::new(
        dedup_rules,
        Arc::new(MemoryDedupStore::new()),
    ));

    let recommender = Arc::new(RecommendationEngine::new(
        action_templates,
        CostModel::default(),
        clock.clone(),
    ));
    let policy = Arc::new(PolicyEngine::new(EscalationSettings::default()));

    let channels: Vec<Box<dyn NotificationChannel>> = vec![
        Box::new(OkChannel(ChannelKind::Email)),
        Box::new(OkChannel(ChannelKind::Sms)),
    ];
    let dispatcher = Arc::new(Dispatcher::new(
        channels,
        TemplateSet::builtin(),
        DispatchSettings {
            contacts: vec![Contact {
                name: "ops".into(),
                email: Some("ops@site.example".into()),
                phone: Some("+15550100".into()),
                push_token: None,
                webhook_url: None,
            }],
            default_recipients: vec!["ops".into()],
            emergency_contacts: Vec::new(),
            max_retries: 3,
            fanout: Default::default(),
        },
    ));

    let controller = AlertController::new(
        store.clone(),
        dedup,
        recommender,
        dispatcher.clone(),
        clock.clone(),
        EngineSettings {
            risk_escalation_recipients: vec!["ops".into()],
            risk_escalation_channels: vec![ChannelKind::Email],
        },
    );
    let sweep = EscalationSweep::new(store.clone(), policy, dispatcher.clone(), clock.clone());

    Harness {
        controller,
        sweep,
        store,
        clock,
        controller_dispatcher: dispatcher,
    }
}

fn basic_request(category: AlertCategory, severity: Severity) -> CreateAlertRequest {
    CreateAlertRequest {
        id: None,
        category,
        severity,
        title: "relay 4 unreachable".into(),
        message: "no heartbeat from relay 4".into(),
        location: None,
        source_id: Some("relay-4".into()),
        escalation_rules: Vec::new(),
        metadata: HashMap::new(),
        tags: Vec::new(),
        priority: None,
        auto_resolve: false,
        auto_resolve_after_minutes: None,
        triggered_at: None,
    }
}

// ── Creation & deduplication ──

#[tokio::test]
async fn create_persists_and_notifies() {
    let h = harness();
    let outcome = h
        .controller
        .create_alert(basic_request(
            AlertCategory::SensorFailure,
            Severity::Warning,
        ))
        .await
        .unwrap();

    assert!(!outcome.deduplicated);
    assert_eq!(outcome.alert.state, AlertState::Active);
    assert_eq!(outcome.alert.priority, 50);
    // Warning fans out to email + push for the one contact; push is not
    // configured so that pair fails fast, email delivers.
    assert_eq!(outcome.alert.notifications.len(), 2);
    assert!(outcome
        .alert
        .notifications
        .iter()
        .any(|n| n.channel == ChannelKind::Email && n.status == NotificationStatus::Sent));

    let stored = h.store.get(&outcome.alert.id).await.unwrap().unwrap();
    assert_eq!(stored.notifications.len(), 2);
}

#[tokio::test]
async fn duplicate_event_returns_existing_alert() {
    let h = harness();
    let first = h
        .controller
        .create_alert(basic_request(
            AlertCategory::CommunicationLoss,
            Severity::Warning,
        ))
        .await
        .unwrap();

    h.clock.advance(Duration::minutes(10));
    let second = h
        .controller
        .create_alert(basic_request(
            AlertCategory::CommunicationLoss,
            Severity::Warning,
        ))
        .await
        .unwrap();

    assert!(second.deduplicated);
    assert_eq!(second.alert.id, first.alert.id);

    let (_, total) = h
        .controller
        .get_alerts(&Default::default(), 1, 10)
        .await
        .unwrap();
    assert_eq!(total, 1);
}

struct FailingDedupStore;

#[async_trait]
impl klaxon_dedup::cache::DedupStore for FailingDedupStore {
    async fn recent_alerts(
        &self,
        _category: AlertCategory,
        _window_minutes: i64,
        _now: chrono::DateTime<Utc>,
    ) -> Result<Vec<Alert>, klaxon_dedup::DedupError> {
        Err(klaxon_dedup::DedupError::Store("cache offline".into()))
    }

    async fn register(&self, _alert: &Alert) -> Result<(), klaxon_dedup::DedupError> {
        Err(klaxon_dedup::DedupError::Store("cache offline".into()))
    }

    async fn clear(
        &self,
        _category: Option<AlertCategory>,
    ) -> Result<(), klaxon_dedup::DedupError> {
        Err(klaxon_dedup::DedupError::Store("cache offline".into()))
    }
}

#[tokio::test]
async fn broken_dedup_store_degrades_to_not_duplicate() {
    let mut h = harness();
    let mut rules = HashMap::new();
    rules.insert(
        AlertCategory::CommunicationLoss,
        DedupRule {
            time_window_minutes: 30,
            location_radius_m: None,
            require_same_source: true,
            require_same_severity: true,
            message_similarity_threshold: None,
        },
    );
    // Swap in a controller whose dedup store always fails.
    h.controller = AlertController::new(
        h.store.clone(),
        Arc::new(Deduplicator::new(rules, Arc::new(FailingDedupStore))),
        Arc::new(RecommendationEngine::new(
            templates::builtin_templates(),
            CostModel::default(),
            h.clock.clone(),
        )),
        h.controller_dispatcher.clone(),
        h.clock.clone(),
        EngineSettings::default(),
    );

    let outcome = h
        .controller
        .create_alert(basic_request(
            AlertCategory::CommunicationLoss,
            Severity::Warning,
        ))
        .await
        .expect("availability over precision");
    assert!(!outcome.deduplicated);
}

#[tokio::test]
async fn validation_rejects_empty_title() {
    let h = harness();
    let mut request = basic_request(AlertCategory::SystemError, Severity::Info);
    request.title = "  ".into();
    let err = h.controller.create_alert(request).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

// ── Lifecycle transitions ──

#[tokio::test]
async fn acknowledge_is_idempotent() {
    let h = harness();
    let alert = h
        .controller
        .create_alert(basic_request(
            AlertCategory::SensorFailure,
            Severity::Critical,
        ))
        .await
        .unwrap()
        .alert;

    let first = h
        .controller
        .acknowledge_alert(&alert.id, "inspector-kim")
        .await
        .unwrap();
    assert_eq!(first.state, AlertState::Acknowledged);
    let first_at = first.acknowledged_at.unwrap();

    h.clock.advance(Duration::minutes(5));
    let second = h
        .controller
        .acknowledge_alert(&alert.id, "someone-else")
        .await
        .unwrap();
    assert_eq!(second.state, AlertState::Acknowledged);
    assert_eq!(second.acknowledged_at.unwrap(), first_at);
    assert_eq!(second.acknowledged_by.as_deref(), Some("inspector-kim"));
}

#[tokio::test]
async fn resolve_is_idempotent_and_captures_note() {
    let h = harness();
    let alert = h
        .controller
        .create_alert(basic_request(
            AlertCategory::SensorFailure,
            Severity::Critical,
        ))
        .await
        .unwrap()
        .alert;

    let resolved = h
        .controller
        .resolve_alert(&alert.id, "inspector-kim", Some("replaced sensor head"))
        .await
        .unwrap();
    assert_eq!(resolved.state, AlertState::Resolved);
    assert_eq!(
        resolved.metadata["resolution_note"],
        "replaced sensor head"
    );
    let resolved_at = resolved.resolved_at.unwrap();

    h.clock.advance(Duration::minutes(5));
    let again = h
        .controller
        .resolve_alert(&alert.id, "other", None)
        .await
        .unwrap();
    assert_eq!(again.resolved_at.unwrap(), resolved_at);
    assert_eq!(again.resolved_by.as_deref(), Some("inspector-kim"));
}

#[tokio::test]
async fn operations_require_an_actor_and_an_existing_alert() {
    let h = harness();
    let err = h.controller.acknowledge_alert("a-1", " ").await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let err = h
        .controller
        .acknowledge_alert("no-such-alert", "kim")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn suppress_sets_window_and_records_actor() {
    let h = harness();
    let alert = h
        .controller
        .create_alert(basic_request(AlertCategory::WeatherWarning, Severity::Info))
        .await
        .unwrap()
        .alert;

    let suppressed = h
        .controller
        .suppress_alert(&alert.id, "dispatcher-lee", 45, Some("known storm window"))
        .await
        .unwrap();
    assert_eq!(suppressed.state, AlertState::Suppressed);
    let until = suppressed.suppressed_until.unwrap();
    assert_eq!(until, h.clock.now() + Duration::minutes(45));
    assert_eq!(suppressed.metadata["suppressed_by"], "dispatcher-lee");
    assert_eq!(
        suppressed.metadata["suppression_reason"],
        "known storm window"
    );

    // Terminal state wins: suppressing a resolved alert is a no-op
    h.controller
        .resolve_alert(&alert.id, "dispatcher-lee", None)
        .await
        .unwrap();
    let after = h
        .controller
        .suppress_alert(&alert.id, "dispatcher-lee", 10, None)
        .await
        .unwrap();
    assert_eq!(after.state, AlertState::Resolved);
}

// ── Risk assessments ──

fn assessment(level: RiskLevel, probability: f64) -> RiskAssessment {
    RiskAssessment {
        id: "ra-100".into(),
        source_id: "conveyor-2".into(),
        risk_level: level,
        risk_probability: probability,
        time_to_failure_hours: Some(18.0),
        contributing_factors: vec!["bearing wear".into(), "load imbalance".into()],
        affected_infrastructure: vec!["conveyor-2".into(), "transfer-station-b".into()],
        estimated_cost: Some(120_000.0),
        location: None,
        assessed_at: Utc.with_ymd_and_hms(2025, 6, 3, 10, 0, 0).unwrap(),
    }
}

#[tokio::test]
async fn low_risk_below_probability_floor_is_ignored() {
    let h = harness();
    let outcome = h
        .controller
        .process_risk_assessment(assessment(RiskLevel::Low, 0.5))
        .await
        .unwrap();
    assert!(outcome.is_none());
}

#[tokio::test]
async fn low_risk_with_high_probability_alerts() {
    let h = harness();
    let outcome = h
        .controller
        .process_risk_assessment(assessment(RiskLevel::Low, 0.75))
        .await
        .unwrap()
        .expect("probability >= 0.7 alerts regardless of level");
    assert_eq!(outcome.alert.severity, Severity::Warning);
    assert_eq!(outcome.alert.priority, 75);
}

#[tokio::test]
async fn critical_risk_gets_level_zero_rule_and_recommendations() {
    let h = harness();
    let outcome = h
        .controller
        .process_risk_assessment(assessment(RiskLevel::Critical, 0.9))
        .await
        .unwrap()
        .expect("critical risk must alert");
    let alert = &outcome.alert;

    assert_eq!(alert.severity, Severity::Emergency);
    assert_eq!(alert.escalation_rules.len(), 3);
    let level0 = &alert.escalation_rules[0];
    assert_eq!(level0.level, 0);
    assert_eq!(level0.delay_minutes, 0);
    assert_eq!(alert.escalation_rules[1].delay_minutes, 15);
    assert_eq!(alert.escalation_rules[2].delay_minutes, 30);

    assert!(alert.metadata.contains_key("recommended_actions"));
    assert_eq!(alert.metadata["time_to_failure_hours"], serde_json::json!(18.0));
    assert!(alert.metadata.contains_key("contributing_factors"));
    assert!(alert.metadata.contains_key("estimated_cost"));
}

#[tokio::test]
async fn recommendation_failure_does_not_block_creation() {
    // An empty configured template set makes the recommender fail.
    let mut broken = HashMap::new();
    broken.insert("risk_emergency".to_string(), Vec::new());
    let h = harness_with_templates(broken);

    let outcome = h
        .controller
        .process_risk_assessment(assessment(RiskLevel::Critical, 0.9))
        .await
        .unwrap()
        .expect("alert is still created");
    assert!(!outcome.alert.metadata.contains_key("recommended_actions"));
}

// ── Sensor events ──

#[tokio::test]
async fn sensor_event_types_map_to_categories() {
    let h = harness();
    let cases = [
        ("failure", AlertCategory::SensorFailure, Severity::Critical),
        ("battery_low", AlertCategory::BatteryLow, Severity::Warning),
        (
            "communication_loss",
            AlertCategory::CommunicationLoss,
            Severity::Warning,
        ),
        (
            "calibration_due",
            AlertCategory::CalibrationDue,
            Severity::Info,
        ),
        (
            "maintenance_required",
            AlertCategory::MaintenanceRequired,
            Severity::Warning,
        ),
    ];

    for (i, (event_type, category, severity)) in cases.into_iter().enumerate() {
        let outcome = h
            .controller
            .process_sensor_event(SensorHealthEvent {
                sensor_id: format!("sensor-{i}"),
                event_type: event_type.into(),
                message: None,
                severity: None,
                location: None,
                occurred_at: h.clock.now(),
            })
            .await
            .unwrap()
            .expect("mapped event type creates an alert");
        assert_eq!(outcome.alert.category, category);
        assert_eq!(outcome.alert.severity, severity);
    }
}

#[tokio::test]
async fn unmapped_sensor_event_is_dropped() {
    let h = harness();
    let outcome = h
        .controller
        .process_sensor_event(SensorHealthEvent {
            sensor_id: "sensor-9".into(),
            event_type: "firmware_update".into(),
            message: None,
            severity: None,
            location: None,
            occurred_at: h.clock.now(),
        })
        .await
        .unwrap();
    assert!(outcome.is_none());

    let (_, total) = h
        .controller
        .get_alerts(&Default::default(), 1, 10)
        .await
        .unwrap();
    assert_eq!(total, 0);
}

// ── Sweep: escalation ──

fn escalating_request() -> CreateAlertRequest {
    let mut request = basic_request(AlertCategory::SensorFailure, Severity::Critical);
    request.escalation_rules = vec![
        EscalationRule {
            level: 1,
            delay_minutes: 15,
            recipients: vec!["ops".into()],
            channels: vec![ChannelKind::Email],
            conditions: Vec::new(),
        },
        EscalationRule {
            level: 2,
            delay_minutes: 30,
            recipients: vec!["ops".into()],
            channels: vec![ChannelKind::Email],
            conditions: Vec::new(),
        },
    ];
    request
}

#[tokio::test]
async fn sweep_escalates_each_level_exactly_once() {
    let h = harness();
    let alert = h
        .controller
        .create_alert(escalating_request())
        .await
        .unwrap()
        .alert;

    // Before the first delay nothing fires.
    h.sweep.tick(h.clock.now() + Duration::minutes(5)).await;
    let stored = h.store.get(&alert.id).await.unwrap().unwrap();
    assert!(stored.escalations.is_empty());

    // After 20 minutes level 1 fires, and repeated ticks stay idempotent.
    let t20 = h.clock.now() + Duration::minutes(20);
    for _ in 0..4 {
        h.sweep.tick(t20).await;
    }
    let stored = h.store.get(&alert.id).await.unwrap().unwrap();
    assert_eq!(stored.escalations.len(), 1);
    assert_eq!(stored.escalations[0].level, 1);
    assert!(stored.escalations[0].success);

    // After 35 minutes level 2 fires once as well.
    let t35 = h.clock.now() + Duration::minutes(35);
    for _ in 0..3 {
        h.sweep.tick(t35).await;
    }
    let stored = h.store.get(&alert.id).await.unwrap().unwrap();
    assert_eq!(stored.escalations.len(), 2);
    assert_eq!(stored.escalations[1].level, 2);
}

#[tokio::test]
async fn acknowledged_alerts_do_not_escalate() {
    let h = harness();
    let alert = h
        .controller
        .create_alert(escalating_request())
        .await
        .unwrap()
        .alert;
    h.controller
        .acknowledge_alert(&alert.id, "inspector-kim")
        .await
        .unwrap();

    h.sweep.tick(h.clock.now() + Duration::minutes(40)).await;
    let stored = h.store.get(&alert.id).await.unwrap().unwrap();
    assert!(stored.escalations.is_empty());
}

#[tokio::test]
async fn suppression_holds_escalation_until_it_lapses() {
    let h = harness();
    let alert = h
        .controller
        .create_alert(escalating_request())
        .await
        .unwrap()
        .alert;
    h.controller
        .suppress_alert(&alert.id, "dispatcher-lee", 60, None)
        .await
        .unwrap();

    // Inside the suppression window: both levels are due but held back.
    h.sweep.tick(h.clock.now() + Duration::minutes(40)).await;
    let stored = h.store.get(&alert.id).await.unwrap().unwrap();
    assert!(stored.escalations.is_empty());

    // Once the window lapses the pending level fires on the next tick.
    h.sweep.tick(h.clock.now() + Duration::minutes(70)).await;
    let stored = h.store.get(&alert.id).await.unwrap().unwrap();
    assert_eq!(stored.escalations.len(), 1);
}

#[tokio::test]
async fn resolved_alerts_are_left_alone() {
    let h = harness();
    let alert = h
        .controller
        .create_alert(escalating_request())
        .await
        .unwrap()
        .alert;
    h.controller
        .resolve_alert(&alert.id, "inspector-kim", None)
        .await
        .unwrap();

    h.sweep.tick(h.clock.now() + Duration::minutes(40)).await;
    let stored = h.store.get(&alert.id).await.unwrap().unwrap();
    assert!(stored.escalations.is_empty());
    assert_eq!(stored.state, AlertState::Resolved);
}

// ── Sweep: auto-resolve ──

#[tokio::test]
async fn auto_resolve_fires_only_after_timeout_with_flag() {
    let h = harness();
    let mut request = basic_request(AlertCategory::CommunicationLoss, Severity::Warning);
    request.auto_resolve = true;
    request.auto_resolve_after_minutes = Some(60);
    let alert = h.controller.create_alert(request).await.unwrap().alert;

    h.sweep.tick(h.clock.now() + Duration::minutes(59)).await;
    let stored = h.store.get(&alert.id).await.unwrap().unwrap();
    assert_eq!(stored.state, AlertState::Active);

    h.sweep.tick(h.clock.now() + Duration::minutes(61)).await;
    let stored = h.store.get(&alert.id).await.unwrap().unwrap();
    assert_eq!(stored.state, AlertState::Resolved);
    assert_eq!(stored.resolved_by.as_deref(), Some("auto-resolve"));
}

#[tokio::test]
async fn auto_resolve_never_fires_without_the_flag() {
    let h = harness();
    let mut request = basic_request(AlertCategory::CommunicationLoss, Severity::Warning);
    request.auto_resolve = false;
    request.auto_resolve_after_minutes = Some(60);
    let alert = h.controller.create_alert(request).await.unwrap().alert;

    h.sweep.tick(h.clock.now() + Duration::hours(24)).await;
    let stored = h.store.get(&alert.id).await.unwrap().unwrap();
    assert_eq!(stored.state, AlertState::Active);
}

#[tokio::test]
async fn auto_resolve_applies_to_acknowledged_alerts() {
    let h = harness();
    let mut request = basic_request(AlertCategory::CommunicationLoss, Severity::Warning);
    request.auto_resolve = true;
    request.auto_resolve_after_minutes = Some(30);
    let alert = h.controller.create_alert(request).await.unwrap().alert;
    h.controller
        .acknowledge_alert(&alert.id, "inspector-kim")
        .await
        .unwrap();

    h.sweep.tick(h.clock.now() + Duration::minutes(31)).await;
    let stored = h.store.get(&alert.id).await.unwrap().unwrap();
    assert_eq!(stored.state, AlertState::Resolved);
}
