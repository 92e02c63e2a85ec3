//! Escalation policy: decides whether an open alert's next escalation rule
//! may fire right now.
//!
//! Rule selection (the lowest unexecuted level whose delay has elapsed) is
//! separate from gate evaluation so the sweep can log why a rule was held
//! back. Named rule conditions form a closed vocabulary; unknown names
//! fail open toward escalating — a misconfigured rule should page someone
//! rather than go silent.

#[cfg(test)]
mod tests;

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use klaxon_common::types::{Alert, EscalationRule, Severity};
use serde::{Deserialize, Serialize};

/// Priority score at or above which the `high_priority` condition holds.
const HIGH_PRIORITY_FLOOR: u32 = 70;

/// Deployment-wide escalation settings, injected at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationSettings {
    /// Global auto-escalation switch.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Rules with a level above this never fire.
    #[serde(default = "default_max_level")]
    pub max_level: u32,
    #[serde(default)]
    pub business_hours_only: bool,
    #[serde(default = "default_business_hours_start")]
    pub business_hours_start: u32,
    #[serde(default = "default_business_hours_end")]
    pub business_hours_end: u32,
    #[serde(default = "default_escalate_on_weekends")]
    pub escalate_on_weekends: bool,
    /// Sweep interval for the periodic escalation check.
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_max_level() -> u32 {
    3
}

fn default_business_hours_start() -> u32 {
    8
}

fn default_business_hours_end() -> u32 {
    18
}

fn default_escalate_on_weekends() -> bool {
    true
}

fn default_check_interval_secs() -> u64 {
    60
}

impl Default for EscalationSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_level: default_max_level(),
            business_hours_only: false,
            business_hours_start: default_business_hours_start(),
            business_hours_end: default_business_hours_end(),
            escalate_on_weekends: default_escalate_on_weekends(),
            check_interval_secs: default_check_interval_secs(),
        }
    }
}

/// Gate evaluator over an alert's escalation ladder.
pub struct PolicyEngine {
    settings: EscalationSettings,
}

impl PolicyEngine {
    pub fn new(settings: EscalationSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &EscalationSettings {
        &self.settings
    }

    /// The lowest-level rule not yet in the alert's escalation records
    /// whose delay from trigger has elapsed.
    pub fn next_pending_rule<'a>(
        &self,
        alert: &'a Alert,
        now: DateTime<Utc>,
    ) -> Option<&'a EscalationRule> {
        let age = alert.age_minutes(now);
        let mut rules: Vec<&EscalationRule> = alert.escalation_rules.iter().collect();
        rules.sort_by_key(|r| r.level);
        rules
            .into_iter()
            .find(|r| !alert.has_escalated(r.level) && age >= r.delay_minutes)
    }

    /// Evaluates every gate for one rule. All must pass:
    /// global switch, open (non-resolved) state, elapsed delay,
    /// business-hours and weekend windows, level ceiling, and every named
    /// condition on the rule.
    pub fn should_escalate(&self, alert: &Alert, rule: &EscalationRule, now: DateTime<Utc>) -> bool {
        if !self.settings.enabled {
            return false;
        }
        if !alert.state.is_open() {
            return false;
        }
        if alert.age_minutes(now) < rule.delay_minutes {
            return false;
        }
        if self.settings.business_hours_only {
            let hour = now.hour();
            if hour < self.settings.business_hours_start || hour >= self.settings.business_hours_end
            {
                return false;
            }
        }
        if !self.settings.escalate_on_weekends
            && matches!(now.weekday(), Weekday::Sat | Weekday::Sun)
        {
            return false;
        }
        if rule.level > self.settings.max_level {
            return false;
        }

        rule.conditions
            .iter()
            .all(|name| self.evaluate_condition(alert, name))
    }

    /// Closed condition vocabulary. Unknown names default to true so a
    /// typo escalates instead of silencing the ladder (fail-open).
    fn evaluate_condition(&self, alert: &Alert, name: &str) -> bool {
        match name {
            "not_acknowledged" => alert.acknowledged_at.is_none(),
            "critical_severity" => alert.severity >= Severity::Critical,
            "high_priority" => alert.priority >= HIGH_PRIORITY_FLOOR,
            "location_sensitive" => alert.has_tag("location_sensitive"),
            "multiple_failures" => alert.has_tag("multiple_failures"),
            other => {
                tracing::warn!(
                    alert_id = %alert.id,
                    condition = other,
                    "Unknown escalation condition, defaulting to escalate"
                );
                true
            }
        }
    }
}
