use chrono::{DateTime, Utc};
use klaxon_common::types::{Alert, CreateAlertRequest, GeoLocation, Severity};
use std::collections::HashSet;

/// Normalized score a candidate must reach to count as a duplicate.
const MATCH_THRESHOLD: f64 = 0.6;
/// Minimum number of satisfied criteria for a match.
const MIN_CRITERIA: usize = 2;

const WEIGHT_SOURCE: f64 = 0.3;
const WEIGHT_SEVERITY: f64 = 0.2;
const WEIGHT_LOCATION: f64 = 0.3;
const WEIGHT_MESSAGE: f64 = 0.2;

/// Mean earth radius in meters, for the haversine distance.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Criterion that contributed to a similarity match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchCriterion {
    SourceId,
    Severity,
    Location,
    Message,
}

/// Outcome of a successful similarity comparison.
#[derive(Debug, Clone)]
pub struct MatchResult {
    /// ID of the already-existing alert the candidate duplicates.
    pub alert_id: String,
    /// Normalized similarity score in [0, 1-ish]; already past the gate.
    pub score: f64,
    pub satisfied: Vec<MatchCriterion>,
    pub time_delta_minutes: i64,
    /// Great-circle distance between the two locations, when evaluated.
    pub distance_m: Option<f64>,
}

/// Candidate view of an alert-creation request, with the trigger time
/// resolved against the engine clock.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub severity: Severity,
    pub source_id: Option<String>,
    pub location: Option<GeoLocation>,
    pub text: String,
    pub triggered_at: DateTime<Utc>,
}

impl Candidate {
    pub fn from_request(request: &CreateAlertRequest, now: DateTime<Utc>) -> Self {
        Self {
            severity: request.severity,
            source_id: request.source_id.clone(),
            location: request.location,
            text: format!("{} {}", request.title, request.message),
            triggered_at: request.triggered_at.unwrap_or(now),
        }
    }
}

/// Compares a candidate against one existing alert under a rule.
///
/// A candidate outside the rule's time window is rejected outright. Inside
/// the window, each criterion the rule asks for is evaluated and its weight
/// accumulated when satisfied; the sum is normalized by
/// `evaluated_criteria × 0.3`. A match needs a normalized score of at least
/// 0.6 and at least two satisfied criteria — both fixed constants.
pub fn matches(candidate: &Candidate, existing: &Alert, rule: &super::DedupRule) -> Option<MatchResult> {
    let time_delta_minutes = (candidate.triggered_at - existing.triggered_at)
        .num_minutes()
        .abs();
    if time_delta_minutes > rule.time_window_minutes {
        return None;
    }

    let mut score = 0.0;
    let mut evaluated = 0usize;
    let mut satisfied = Vec::new();
    let mut distance_m = None;

    if rule.require_same_source {
        evaluated += 1;
        let same = match (&candidate.source_id, &existing.source_id) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        };
        if same {
            score += WEIGHT_SOURCE;
            satisfied.push(MatchCriterion::SourceId);
        }
    }

    if rule.require_same_severity {
        evaluated += 1;
        if candidate.severity == existing.severity {
            score += WEIGHT_SEVERITY;
            satisfied.push(MatchCriterion::Severity);
        }
    }

    if let Some(radius_m) = rule.location_radius_m {
        if let (Some(a), Some(b)) = (&candidate.location, &existing.location) {
            evaluated += 1;
            let dist = haversine_m(a, b);
            distance_m = Some(dist);
            if dist <= radius_m {
                score += WEIGHT_LOCATION;
                satisfied.push(MatchCriterion::Location);
            }
        }
    }

    if let Some(threshold) = rule.message_similarity_threshold {
        evaluated += 1;
        let existing_text = format!("{} {}", existing.title, existing.message);
        if jaccard_similarity(&candidate.text, &existing_text) >= threshold {
            score += WEIGHT_MESSAGE;
            satisfied.push(MatchCriterion::Message);
        }
    }

    if evaluated == 0 {
        return None;
    }

    let normalized = score / (evaluated as f64 * 0.3);
    if normalized >= MATCH_THRESHOLD && satisfied.len() >= MIN_CRITERIA {
        Some(MatchResult {
            alert_id: existing.id.clone(),
            score: normalized,
            satisfied,
            time_delta_minutes,
            distance_m,
        })
    } else {
        None
    }
}

/// Great-circle distance between two positions in meters.
pub fn haversine_m(a: &GeoLocation, b: &GeoLocation) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// Jaccard similarity over lower-cased whitespace-tokenized word sets.
///
/// J(A, B) = |A ∩ B| / |A ∪ B|. Returns 0.0 when both sets are empty.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let a_lower = a.to_lowercase();
    let b_lower = b.to_lowercase();
    let set_a: HashSet<&str> = a_lower.split_whitespace().collect();
    let set_b: HashSet<&str> = b_lower.split_whitespace().collect();

    if set_a.is_empty() && set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}
