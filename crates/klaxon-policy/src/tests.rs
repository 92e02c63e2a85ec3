use crate::{EscalationSettings, PolicyEngine};
use chrono::{DateTime, Duration, TimeZone, Utc};
use klaxon_common::types::{
    Alert, AlertCategory, AlertState, ChannelKind, EscalationRecord, EscalationRule, Severity,
};
use std::collections::HashMap;

fn make_alert(triggered_at: DateTime<Utc>, rules: Vec<EscalationRule>) -> Alert {
    Alert {
        id: "a-1".into(),
        category: AlertCategory::Risk,
        severity: Severity::Critical,
        state: AlertState::Active,
        title: "pump overheating".into(),
        message: "bearing temperature rising".into(),
        location: None,
        source_id: Some("pump-7".into()),
        escalation_rules: rules,
        escalations: Vec::new(),
        notifications: Vec::new(),
        metadata: HashMap::new(),
        tags: Vec::new(),
        priority: 80,
        auto_resolve: false,
        auto_resolve_after_minutes: None,
        created_at: triggered_at,
        triggered_at,
        acknowledged_at: None,
        acknowledged_by: None,
        resolved_at: None,
        resolved_by: None,
        suppressed_until: None,
        updated_at: triggered_at,
    }
}

fn rule(level: u32, delay_minutes: i64) -> EscalationRule {
    EscalationRule {
        level,
        delay_minutes,
        recipients: vec!["ops@site.example".into()],
        channels: vec![ChannelKind::Email],
        conditions: Vec::new(),
    }
}

fn record(alert_id: &str, level: u32, at: DateTime<Utc>) -> EscalationRecord {
    EscalationRecord {
        alert_id: alert_id.into(),
        level,
        escalated_at: at,
        recipients: Vec::new(),
        channels: Vec::new(),
        success: true,
    }
}

/// A weekday late morning, far from business-hours and weekend edges.
fn tuesday_10am() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 3, 10, 0, 0).unwrap()
}

#[test]
fn next_pending_rule_picks_lowest_elapsed_level() {
    let now = tuesday_10am();
    let alert = make_alert(
        now - Duration::minutes(20),
        vec![rule(2, 30), rule(1, 15)],
    );
    let engine = PolicyEngine::new(EscalationSettings::default());

    let next = engine.next_pending_rule(&alert, now).expect("level 1 due");
    assert_eq!(next.level, 1);
}

#[test]
fn next_pending_rule_skips_recorded_levels() {
    let now = tuesday_10am();
    let mut alert = make_alert(
        now - Duration::minutes(45),
        vec![rule(1, 15), rule(2, 30)],
    );
    alert
        .escalations
        .push(record("a-1", 1, now - Duration::minutes(30)));
    let engine = PolicyEngine::new(EscalationSettings::default());

    let next = engine.next_pending_rule(&alert, now).expect("level 2 due");
    assert_eq!(next.level, 2);
}

#[test]
fn next_pending_rule_none_before_delay() {
    let now = tuesday_10am();
    let alert = make_alert(now - Duration::minutes(5), vec![rule(1, 15)]);
    let engine = PolicyEngine::new(EscalationSettings::default());
    assert!(engine.next_pending_rule(&alert, now).is_none());
}

#[test]
fn global_switch_blocks_escalation() {
    let now = tuesday_10am();
    let alert = make_alert(now - Duration::minutes(20), vec![rule(1, 15)]);
    let engine = PolicyEngine::new(EscalationSettings {
        enabled: false,
        ..EscalationSettings::default()
    });
    assert!(!engine.should_escalate(&alert, &alert.escalation_rules[0], now));
}

#[test]
fn resolved_alert_never_escalates() {
    let now = tuesday_10am();
    let mut alert = make_alert(now - Duration::minutes(20), vec![rule(1, 15)]);
    alert.state = AlertState::Resolved;
    let engine = PolicyEngine::new(EscalationSettings::default());
    assert!(!engine.should_escalate(&alert, &alert.escalation_rules[0], now));
}

#[test]
fn delay_must_have_elapsed() {
    let now = tuesday_10am();
    let alert = make_alert(now - Duration::minutes(10), vec![rule(1, 15)]);
    let engine = PolicyEngine::new(EscalationSettings::default());
    assert!(!engine.should_escalate(&alert, &alert.escalation_rules[0], now));
    assert!(engine.should_escalate(
        &alert,
        &alert.escalation_rules[0],
        now + Duration::minutes(5)
    ));
}

#[test]
fn business_hours_gate() {
    let engine = PolicyEngine::new(EscalationSettings {
        business_hours_only: true,
        business_hours_start: 8,
        business_hours_end: 18,
        ..EscalationSettings::default()
    });

    let in_hours = tuesday_10am();
    let alert = make_alert(in_hours - Duration::minutes(30), vec![rule(1, 15)]);
    assert!(engine.should_escalate(&alert, &alert.escalation_rules[0], in_hours));

    let after_hours = Utc.with_ymd_and_hms(2025, 6, 3, 21, 0, 0).unwrap();
    assert!(!engine.should_escalate(&alert, &alert.escalation_rules[0], after_hours));
}

#[test]
fn weekend_gate() {
    let engine = PolicyEngine::new(EscalationSettings {
        escalate_on_weekends: false,
        ..EscalationSettings::default()
    });

    let saturday = Utc.with_ymd_and_hms(2025, 6, 7, 10, 0, 0).unwrap();
    let alert = make_alert(saturday - Duration::minutes(30), vec![rule(1, 15)]);
    assert!(!engine.should_escalate(&alert, &alert.escalation_rules[0], saturday));

    let monday = Utc.with_ymd_and_hms(2025, 6, 9, 10, 0, 0).unwrap();
    let alert = make_alert(monday - Duration::minutes(30), vec![rule(1, 15)]);
    assert!(engine.should_escalate(&alert, &alert.escalation_rules[0], monday));
}

#[test]
fn level_ceiling() {
    let now = tuesday_10am();
    let alert = make_alert(now - Duration::minutes(120), vec![rule(5, 15)]);
    let engine = PolicyEngine::new(EscalationSettings {
        max_level: 3,
        ..EscalationSettings::default()
    });
    assert!(!engine.should_escalate(&alert, &alert.escalation_rules[0], now));
}

#[test]
fn named_conditions() {
    let now = tuesday_10am();
    let engine = PolicyEngine::new(EscalationSettings::default());

    let mut gated = rule(1, 15);
    gated.conditions = vec!["not_acknowledged".into()];

    let mut alert = make_alert(now - Duration::minutes(30), vec![gated.clone()]);
    assert!(engine.should_escalate(&alert, &gated, now));

    alert.acknowledged_at = Some(now - Duration::minutes(1));
    alert.state = AlertState::Acknowledged;
    assert!(!engine.should_escalate(&alert, &gated, now));

    let mut severity_gated = rule(1, 15);
    severity_gated.conditions = vec!["critical_severity".into()];
    let mut alert = make_alert(now - Duration::minutes(30), vec![severity_gated.clone()]);
    alert.severity = Severity::Warning;
    assert!(!engine.should_escalate(&alert, &severity_gated, now));
    alert.severity = Severity::Emergency;
    assert!(engine.should_escalate(&alert, &severity_gated, now));

    let mut priority_gated = rule(1, 15);
    priority_gated.conditions = vec!["high_priority".into()];
    let mut alert = make_alert(now - Duration::minutes(30), vec![priority_gated.clone()]);
    alert.priority = 69;
    assert!(!engine.should_escalate(&alert, &priority_gated, now));
    alert.priority = 70;
    assert!(engine.should_escalate(&alert, &priority_gated, now));

    let mut tag_gated = rule(1, 15);
    tag_gated.conditions = vec!["multiple_failures".into()];
    let mut alert = make_alert(now - Duration::minutes(30), vec![tag_gated.clone()]);
    assert!(!engine.should_escalate(&alert, &tag_gated, now));
    alert.tags.push("multiple_failures".into());
    assert!(engine.should_escalate(&alert, &tag_gated, now));
}

#[test]
fn unknown_condition_fails_open() {
    let now = tuesday_10am();
    let engine = PolicyEngine::new(EscalationSettings::default());

    let mut odd = rule(1, 15);
    odd.conditions = vec!["lunar_phase_full".into()];
    let alert = make_alert(now - Duration::minutes(30), vec![odd.clone()]);
    assert!(engine.should_escalate(&alert, &odd, now));
}
