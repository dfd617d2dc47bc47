//! Synthetic training labels.
//!
//! Nobody records why people leave, so the demo model learns a rule-based
//! risk score. Observed leavers and reviewer feedback take precedence.

use serde::Serialize;

use super::features::FeatureVector;
use crate::model::training_data::Outcome;

pub const RISK_THRESHOLD: f64 = 0.5;

/// Risk points out of 100 at or above which an employee is labelled at risk.
pub const RISK_THRESHOLD_POINTS: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelSource {
    /// A reviewer recorded the actual outcome.
    Feedback,
    /// The employee already resigned or was terminated.
    Observed,
    Heuristic,
}

impl LabelSource {
    pub fn label(&self) -> &'static str {
        match self {
            LabelSource::Feedback => "feedback",
            LabelSource::Observed => "observed",
            LabelSource::Heuristic => "heuristic",
        }
    }
}

/// Rule-based risk in whole points out of 100; integer sums keep the threshold exact.
pub fn risk_points(v: &FeatureVector) -> u32 {
    let mut points = 0;
    if v.satisfaction() < 0.4 {
        points += 30;
    }
    if v.work_life_balance() < 0.5 {
        points += 20;
    }
    // under twelve months of tenure
    if v.tenure() < 0.1 {
        points += 15;
    }
    if !v.recent_bonus() {
        points += 10;
    }
    // under 3 000 a month
    if v.salary() < 0.15 {
        points += 10;
    }
    if !v.full_time() {
        points += 10;
    }
    if v.team_stability() < 0.2 {
        points += 5;
    }
    points.min(100)
}

/// Rule-based risk score in `[0, 1]`.
pub fn heuristic_risk(v: &FeatureVector) -> f64 {
    risk_points(v) as f64 / 100.0
}

/// Picks the training label for one employee, most trustworthy source first.
pub fn resolve_label(
    features: &FeatureVector,
    has_left: bool,
    feedback: Option<Outcome>,
) -> (f64, LabelSource) {
    if let Some(outcome) = feedback {
        return (outcome.as_label(), LabelSource::Feedback);
    }
    if has_left {
        return (1.0, LabelSource::Observed);
    }
    let label = if risk_points(features) >= RISK_THRESHOLD_POINTS { 1.0 } else { 0.0 };
    (label, LabelSource::Heuristic)
}
