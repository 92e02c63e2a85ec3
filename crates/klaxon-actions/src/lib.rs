//! Recommended-action generation for risk-category alerts.
//!
//! Templates are selected by `{category}_{severity}` key with a
//! severity-only generic fallback, customized for site conditions (remote
//! location, night shift), evaluated financially, and ranked. The ranking
//! is deterministic: priority first, then expected risk reduction (ties
//! within 0.1 ignored), then ROI.

pub mod templates;


use chrono::Timelike;
use klaxon_common::clock::Clock;
use klaxon_common::types::{
    ActionVerdict, CostBenefit, CreateAlertRequest, RecommendedAction,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use templates::ActionTemplate;

/// Cost multiplier applied when the alert carries a geolocation
/// (remote-site penalty).
const REMOTE_COST_FACTOR: f64 = 1.2;
const REMOTE_DURATION_FACTOR: f64 = 1.5;
/// Cost multiplier outside the [6, 18] day-shift window.
const NIGHT_COST_FACTOR: f64 = 1.3;
const DAY_SHIFT_START: u32 = 6;
const DAY_SHIFT_END: u32 = 18;

/// Risk probability assumed when the alert metadata does not carry one.
const DEFAULT_RISK_PROBABILITY: f64 = 0.5;

/// Financial parameters of the cost-benefit analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostModel {
    /// Cost per hour of degraded operations while an action runs.
    #[serde(default = "default_hourly_operational_cost")]
    pub hourly_operational_cost: f64,
    /// Multiplier converting hourly cost into the exposure of an
    /// unmitigated safety incident.
    #[serde(default = "default_safety_multiplier")]
    pub safety_multiplier: f64,
}

fn default_hourly_operational_cost() -> f64 {
    10_000.0
}

fn default_safety_multiplier() -> f64 {
    100.0
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            hourly_operational_cost: default_hourly_operational_cost(),
            safety_multiplier: default_safety_multiplier(),
        }
    }
}

/// Errors from recommendation generation.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// A configured template key mapped to an empty list.
    #[error("Actions: template set for '{0}' is empty")]
    EmptyTemplateSet(String),
}

/// Generates ranked, cost-evaluated recommended actions.
pub struct RecommendationEngine {
    templates: HashMap<String, Vec<ActionTemplate>>,
    cost_model: CostModel,
    clock: Arc<dyn Clock>,
}

impl RecommendationEngine {
    pub fn new(
        templates: HashMap<String, Vec<ActionTemplate>>,
        cost_model: CostModel,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            templates,
            cost_model,
            clock,
        }
    }

    /// Produces the ordered recommended-action list for an alert-creation
    /// request.
    pub fn recommend(
        &self,
        request: &CreateAlertRequest,
    ) -> Result<Vec<RecommendedAction>, ActionError> {
        let key = format!("{}_{}", request.category, request.severity);
        let selected: Vec<ActionTemplate> = match self.templates.get(&key) {
            Some(set) if set.is_empty() => return Err(ActionError::EmptyTemplateSet(key)),
            Some(set) => set.clone(),
            None => vec![templates::generic_template(request.severity)],
        };

        let now = self.clock.now();
        let night_shift = now.hour() < DAY_SHIFT_START || now.hour() > DAY_SHIFT_END;
        let remote_site = request.location.is_some();
        let risk_probability = request
            .metadata
            .get("risk_probability")
            .and_then(|v| v.as_f64())
            .unwrap_or(DEFAULT_RISK_PROBABILITY);

        let mut actions: Vec<RecommendedAction> = selected
            .into_iter()
            .map(|t| self.customize(t, remote_site, night_shift, risk_probability))
            .collect();

        actions.sort_by(rank);
        tracing::debug!(
            key = %key,
            count = actions.len(),
            remote_site,
            night_shift,
            "Generated recommended actions"
        );
        Ok(actions)
    }

    fn customize(
        &self,
        template: ActionTemplate,
        remote_site: bool,
        night_shift: bool,
        risk_probability: f64,
    ) -> RecommendedAction {
        let mut cost = template.estimated_cost;
        let mut duration = template.estimated_duration_hours;
        let mut personnel = template.required_personnel;

        if remote_site {
            cost *= REMOTE_COST_FACTOR;
            duration *= REMOTE_DURATION_FACTOR;
        }
        if night_shift {
            cost *= NIGHT_COST_FACTOR;
            personnel.push("night shift supervisor".to_string());
        }

        let cost_benefit = self.analyze(cost, duration, template.expected_risk_reduction, risk_probability);

        RecommendedAction {
            id: klaxon_common::id::next_id(),
            kind: template.kind,
            priority: template.priority,
            description: template.description,
            estimated_cost: cost,
            estimated_duration_hours: duration,
            required_personnel: personnel,
            required_equipment: template.required_equipment,
            safety_requirements: template.safety_requirements,
            expected_risk_reduction: template.expected_risk_reduction,
            fleet_directives: template.fleet_directives,
            cost_benefit: Some(cost_benefit),
        }
    }

    fn analyze(
        &self,
        action_cost: f64,
        duration_hours: f64,
        risk_reduction: f64,
        risk_probability: f64,
    ) -> CostBenefit {
        let hourly = self.cost_model.hourly_operational_cost;
        let operational_impact_cost = duration_hours * hourly;
        let safety_risk_cost = risk_probability * hourly * self.cost_model.safety_multiplier;
        let expected_savings = risk_reduction * safety_risk_cost;
        let total_cost = action_cost + operational_impact_cost;

        let roi_percent = if total_cost > 0.0 {
            (expected_savings - total_cost) / total_cost * 100.0
        } else {
            0.0
        };
        let payback_hours = if expected_savings > 0.0 && duration_hours > 0.0 {
            Some(total_cost / (expected_savings / duration_hours))
        } else {
            None
        };

        let verdict = if roi_percent < -50.0 {
            ActionVerdict::Defer
        } else if roi_percent < 0.0 {
            ActionVerdict::Modify
        } else {
            ActionVerdict::Implement
        };

        CostBenefit {
            action_cost,
            operational_impact_cost,
            safety_risk_cost,
            expected_savings,
            total_cost,
            roi_percent,
            payback_hours,
            verdict,
        }
    }
}

/// Ranking: priority descending, then expected risk reduction descending
/// when the gap exceeds 0.1, then ROI descending. Stable sort keeps equal
/// inputs deterministic.
fn rank(a: &RecommendedAction, b: &RecommendedAction) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| {
            let gap = b.expected_risk_reduction - a.expected_risk_reduction;
            if gap.abs() > 0.1 {
                gap.partial_cmp(&0.0).unwrap_or(Ordering::Equal)
            } else {
                Ordering::Equal
            }
        })
        .then_with(|| {
            let roi_a = a.cost_benefit.as_ref().map_or(0.0, |c| c.roi_percent);
            let roi_b = b.cost_benefit.as_ref().map_or(0.0, |c| c.roi_percent);
            roi_b.partial_cmp(&roi_a).unwrap_or(Ordering::Equal)
        })
}
