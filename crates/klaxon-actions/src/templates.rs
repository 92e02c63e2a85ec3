use klaxon_common::types::{ActionKind, ActionPriority, Severity};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Uncustomized action blueprint, selected by `{category}_{severity}` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionTemplate {
    pub kind: ActionKind,
    pub priority: ActionPriority,
    pub description: String,
    pub estimated_cost: f64,
    pub estimated_duration_hours: f64,
    #[serde(default)]
    pub required_personnel: Vec<String>,
    #[serde(default)]
    pub required_equipment: Vec<String>,
    #[serde(default)]
    pub safety_requirements: Vec<String>,
    pub expected_risk_reduction: f64,
    #[serde(default)]
    pub fleet_directives: Vec<String>,
}

/// Severity-only fallback used when no `{category}_{severity}` set is
/// configured. Exactly one generic action per severity.
pub fn generic_template(severity: Severity) -> ActionTemplate {
    match severity {
        Severity::Info => ActionTemplate {
            kind: ActionKind::Monitoring,
            priority: ActionPriority::Low,
            description: "Log the condition and watch the source on the next inspection round"
                .into(),
            estimated_cost: 200.0,
            estimated_duration_hours: 1.0,
            required_personnel: vec!["control room operator".into()],
            required_equipment: Vec::new(),
            safety_requirements: Vec::new(),
            expected_risk_reduction: 0.1,
            fleet_directives: Vec::new(),
        },
        Severity::Warning => ActionTemplate {
            kind: ActionKind::Preventive,
            priority: ActionPriority::Medium,
            description: "Schedule a field inspection of the affected equipment within the shift"
                .into(),
            estimated_cost: 1_500.0,
            estimated_duration_hours: 2.0,
            required_personnel: vec!["field technician".into()],
            required_equipment: vec!["portable diagnostics kit".into()],
            safety_requirements: Vec::new(),
            expected_risk_reduction: 0.3,
            fleet_directives: Vec::new(),
        },
        Severity::Critical => ActionTemplate {
            kind: ActionKind::Immediate,
            priority: ActionPriority::High,
            description: "Dispatch a maintenance crew and take the affected unit out of service"
                .into(),
            estimated_cost: 12_000.0,
            estimated_duration_hours: 4.0,
            required_personnel: vec!["maintenance crew".into(), "shift supervisor".into()],
            required_equipment: vec!["lockout-tagout kit".into()],
            safety_requirements: vec!["isolate energy sources before work".into()],
            expected_risk_reduction: 0.6,
            fleet_directives: Vec::new(),
        },
        Severity::Emergency => ActionTemplate {
            kind: ActionKind::Immediate,
            priority: ActionPriority::Critical,
            description: "Evacuate the affected zone and activate the emergency response plan"
                .into(),
            estimated_cost: 50_000.0,
            estimated_duration_hours: 6.0,
            required_personnel: vec![
                "emergency response team".into(),
                "site safety officer".into(),
            ],
            required_equipment: vec!["barrier tape".into(), "gas detectors".into()],
            safety_requirements: vec!["no entry until the zone is cleared".into()],
            expected_risk_reduction: 0.8,
            fleet_directives: vec!["halt all vehicle movement through the zone".into()],
        },
    }
}

/// Built-in template table for risk-category alerts. Deployments replace
/// or extend this through configuration.
pub fn builtin_templates() -> HashMap<String, Vec<ActionTemplate>> {
    let mut map = HashMap::new();

    map.insert(
        "risk_critical".to_string(),
        vec![
            ActionTemplate {
                kind: ActionKind::Immediate,
                priority: ActionPriority::Critical,
                description: "Shut down the affected equipment and isolate the hazard zone".into(),
                estimated_cost: 25_000.0,
                estimated_duration_hours: 8.0,
                required_personnel: vec!["maintenance crew".into(), "safety officer".into()],
                required_equipment: vec!["lockout-tagout kit".into(), "thermal camera".into()],
                safety_requirements: vec!["full PPE".into(), "permit to work".into()],
                expected_risk_reduction: 0.7,
                fleet_directives: vec!["reroute haul traffic away from the sector".into()],
            },
            ActionTemplate {
                kind: ActionKind::Monitoring,
                priority: ActionPriority::High,
                description: "Install continuous vibration and temperature monitoring on the asset"
                    .into(),
                estimated_cost: 6_000.0,
                estimated_duration_hours: 3.0,
                required_personnel: vec!["instrumentation technician".into()],
                required_equipment: vec!["wireless sensor kit".into()],
                safety_requirements: Vec::new(),
                expected_risk_reduction: 0.35,
                fleet_directives: Vec::new(),
            },
        ],
    );

    map.insert(
        "risk_emergency".to_string(),
        vec![
            ActionTemplate {
                kind: ActionKind::Immediate,
                priority: ActionPriority::Critical,
                description: "Evacuate personnel from the affected infrastructure immediately"
                    .into(),
                estimated_cost: 80_000.0,
                estimated_duration_hours: 4.0,
                required_personnel: vec![
                    "emergency response team".into(),
                    "site safety officer".into(),
                ],
                required_equipment: vec!["emergency lighting".into(), "gas detectors".into()],
                safety_requirements: vec!["account for all personnel at muster points".into()],
                expected_risk_reduction: 0.9,
                fleet_directives: vec!["stop all fleet operations site-wide".into()],
            },
            ActionTemplate {
                kind: ActionKind::Immediate,
                priority: ActionPriority::Critical,
                description: "Cut power and process feed to the failing infrastructure".into(),
                estimated_cost: 30_000.0,
                estimated_duration_hours: 2.0,
                required_personnel: vec!["electrical crew".into()],
                required_equipment: vec!["switching orders".into()],
                safety_requirements: vec!["verify de-energization before approach".into()],
                expected_risk_reduction: 0.75,
                fleet_directives: Vec::new(),
            },
        ],
    );

    map.insert(
        "risk_warning".to_string(),
        vec![ActionTemplate {
            kind: ActionKind::Preventive,
            priority: ActionPriority::Medium,
            description: "Bring the next scheduled maintenance window forward for the asset".into(),
            estimated_cost: 4_000.0,
            estimated_duration_hours: 3.0,
            required_personnel: vec!["planner".into(), "field technician".into()],
            required_equipment: Vec::new(),
            safety_requirements: Vec::new(),
            expected_risk_reduction: 0.4,
            fleet_directives: Vec::new(),
        }],
    );

    map
}
