use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Alert severity level, ordered from lowest to highest.
///
/// # Examples
///
/// ```
/// use klaxon_common::types::Severity;
///
/// let sev: Severity = "critical".parse().unwrap();
/// assert_eq!(sev, Severity::Critical);
/// assert_eq!(sev.to_string(), "critical");
/// assert!(Severity::Emergency > Severity::Warning);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
    Emergency,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
            Severity::Emergency => write!(f, "emergency"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            "emergency" => Ok(Severity::Emergency),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

/// Alert category. Risk alerts originate from derived risk assessments;
/// the sensor-health categories map from sensor event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    Risk,
    SensorFailure,
    CommunicationLoss,
    BatteryLow,
    CalibrationDue,
    MaintenanceRequired,
    WeatherWarning,
    SystemError,
}

impl AlertCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertCategory::Risk => "risk",
            AlertCategory::SensorFailure => "sensor_failure",
            AlertCategory::CommunicationLoss => "communication_loss",
            AlertCategory::BatteryLow => "battery_low",
            AlertCategory::CalibrationDue => "calibration_due",
            AlertCategory::MaintenanceRequired => "maintenance_required",
            AlertCategory::WeatherWarning => "weather_warning",
            AlertCategory::SystemError => "system_error",
        }
    }
}

impl std::fmt::Display for AlertCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AlertCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "risk" => Ok(AlertCategory::Risk),
            "sensor_failure" => Ok(AlertCategory::SensorFailure),
            "communication_loss" => Ok(AlertCategory::CommunicationLoss),
            "battery_low" => Ok(AlertCategory::BatteryLow),
            "calibration_due" => Ok(AlertCategory::CalibrationDue),
            "maintenance_required" => Ok(AlertCategory::MaintenanceRequired),
            "weather_warning" => Ok(AlertCategory::WeatherWarning),
            "system_error" => Ok(AlertCategory::SystemError),
            _ => Err(format!("unknown alert category: {s}")),
        }
    }
}

/// Alert lifecycle state. `Resolved` is terminal; suppression is
/// time-bounded and the alert re-enters escalation once it lapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertState {
    Active,
    Acknowledged,
    Resolved,
    Suppressed,
}

impl AlertState {
    /// An open alert is anything not yet resolved.
    pub fn is_open(&self) -> bool {
        !matches!(self, AlertState::Resolved)
    }
}

impl std::fmt::Display for AlertState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertState::Active => write!(f, "active"),
            AlertState::Acknowledged => write!(f, "acknowledged"),
            AlertState::Resolved => write!(f, "resolved"),
            AlertState::Suppressed => write!(f, "suppressed"),
        }
    }
}

/// Notification delivery channel kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Sms,
    Email,
    Webhook,
    Push,
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelKind::Sms => write!(f, "sms"),
            ChannelKind::Email => write!(f, "email"),
            ChannelKind::Webhook => write!(f, "webhook"),
            ChannelKind::Push => write!(f, "push"),
        }
    }
}

/// Geographic position of the condition that raised an alert.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation_m: Option<f64>,
}

/// One step in an alert's escalation ladder.
///
/// Levels within one alert's rule list are strictly increasing; a level-0
/// rule escalates immediately after the alert triggers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationRule {
    pub level: u32,
    pub delay_minutes: i64,
    pub recipients: Vec<String>,
    pub channels: Vec<ChannelKind>,
    #[serde(default)]
    pub conditions: Vec<String>,
}

/// Append-only audit record of one executed escalation.
///
/// At most one record exists per (alert, level) pair; the sweep checks this
/// before dispatching so repeated ticks never escalate the same level twice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationRecord {
    pub alert_id: String,
    pub level: u32,
    pub escalated_at: DateTime<Utc>,
    pub recipients: Vec<String>,
    pub channels: Vec<ChannelKind>,
    pub success: bool,
}

/// Delivery outcome for one (recipient, channel) notification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Sent,
    Failed,
    Skipped,
}

/// One notification attempt record kept on the alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: String,
    pub channel: ChannelKind,
    pub recipient: String,
    pub status: NotificationStatus,
    pub error: Option<String>,
    pub attempts: u32,
    pub last_attempt_at: DateTime<Utc>,
}

/// Recommended action kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Immediate,
    Preventive,
    Monitoring,
    Maintenance,
}

/// Recommended action priority, ordered from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionPriority {
    Low,
    Medium,
    High,
    Critical,
}

/// Cost-benefit verdict for a recommended action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionVerdict {
    Defer,
    Modify,
    Implement,
}

/// Financial evaluation of one recommended action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostBenefit {
    pub action_cost: f64,
    pub operational_impact_cost: f64,
    pub safety_risk_cost: f64,
    pub expected_savings: f64,
    pub total_cost: f64,
    pub roi_percent: f64,
    pub payback_hours: Option<f64>,
    pub verdict: ActionVerdict,
}

/// A templated, cost-evaluated mitigation suggestion attached to a
/// risk-category alert. Never persisted on its own; it rides inside the
/// alert's metadata map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendedAction {
    pub id: String,
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
    /// Expected risk-reduction fraction in [0, 1].
    pub expected_risk_reduction: f64,
    /// Secondary fleet-control directives (e.g. reroute vehicles away from
    /// the affected zone).
    #[serde(default)]
    pub fleet_directives: Vec<String>,
    pub cost_benefit: Option<CostBenefit>,
}

/// The central alert record.
///
/// Owned by the persistence collaborator; the engine holds it only
/// transiently while processing. Acknowledged/resolved/suppressed timestamps
/// are set at most once each and lifecycle state only moves forward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub category: AlertCategory,
    pub severity: Severity,
    pub state: AlertState,
    pub title: String,
    pub message: String,
    pub location: Option<GeoLocation>,
    pub source_id: Option<String>,
    #[serde(default)]
    pub escalation_rules: Vec<EscalationRule>,
    #[serde(default)]
    pub escalations: Vec<EscalationRecord>,
    #[serde(default)]
    pub notifications: Vec<NotificationRecord>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Numeric priority score in [0, 100]; feeds the `high_priority`
    /// escalation condition.
    pub priority: u32,
    pub auto_resolve: bool,
    pub auto_resolve_after_minutes: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub triggered_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub suppressed_until: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Alert {
    /// Minutes elapsed since the alert triggered. Clamped at zero for
    /// clock skew between producer and engine.
    pub fn age_minutes(&self, now: DateTime<Utc>) -> i64 {
        (now - self.triggered_at).num_minutes().max(0)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Whether the alert is currently inside a suppression window.
    pub fn is_suppressed(&self, now: DateTime<Utc>) -> bool {
        self.state == AlertState::Suppressed
            && self.suppressed_until.is_some_and(|until| until > now)
    }

    /// Whether the given escalation level has already been executed.
    pub fn has_escalated(&self, level: u32) -> bool {
        self.escalations.iter().any(|r| r.level == level)
    }
}

/// Validated input for alert creation. The identifier is caller-supplied
/// when the producer already has a globally unique one; otherwise the
/// engine assigns a snowflake ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAlertRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub category: AlertCategory,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub location: Option<GeoLocation>,
    #[serde(default)]
    pub source_id: Option<String>,
    #[serde(default)]
    pub escalation_rules: Vec<EscalationRule>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub priority: Option<u32>,
    #[serde(default)]
    pub auto_resolve: bool,
    #[serde(default)]
    pub auto_resolve_after_minutes: Option<i64>,
    /// When the condition was observed. Defaults to the engine clock.
    #[serde(default)]
    pub triggered_at: Option<DateTime<Utc>>,
}

/// Query filter for alert listing and statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertFilter {
    pub category: Option<AlertCategory>,
    pub severity: Option<Severity>,
    pub state: Option<AlertState>,
    pub source_id: Option<String>,
    pub tag: Option<String>,
    pub triggered_after: Option<DateTime<Utc>>,
    pub triggered_before: Option<DateTime<Utc>>,
}

/// Aggregate alert counts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AlertStats {
    pub total: u64,
    pub active_count: u64,
    pub by_severity: HashMap<String, u64>,
    pub by_category: HashMap<String, u64>,
    pub by_state: HashMap<String, u64>,
}

/// Risk level carried by a derived risk assessment, ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// Inbound payload from the risk-assessment topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub id: String,
    pub source_id: String,
    pub risk_level: RiskLevel,
    /// Probability of the assessed failure in [0, 1].
    pub risk_probability: f64,
    #[serde(default)]
    pub time_to_failure_hours: Option<f64>,
    #[serde(default)]
    pub contributing_factors: Vec<String>,
    #[serde(default)]
    pub affected_infrastructure: Vec<String>,
    #[serde(default)]
    pub estimated_cost: Option<f64>,
    #[serde(default)]
    pub location: Option<GeoLocation>,
    pub assessed_at: DateTime<Utc>,
}

/// Inbound payload from the sensor-health topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorHealthEvent {
    pub sensor_id: String,
    /// Raw event type string; unmapped types are dropped by the engine.
    pub event_type: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub location: Option<GeoLocation>,
    pub occurred_at: DateTime<Utc>,
}
