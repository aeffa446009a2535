//! TATx efficiency scoring: target turnaround over actual turnaround.

use serde::Serialize;
use std::fmt;

use crate::formatting::{format_score, NOT_AVAILABLE};

/// A target-vs-actual efficiency percentage.
///
/// Values above 100 mean the work finished faster than its target and are
/// reported as-is, without capping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(into = "String")]
pub enum TatxScore {
    Percent(f64),
    NotAvailable,
}

impl TatxScore {
    /// Score `actual` minutes against `target` minutes.
    pub fn new(target: f64, actual: f64) -> Self {
        match score(target, actual) {
            s if s > 0.0 => TatxScore::Percent(s),
            _ => TatxScore::NotAvailable,
        }
    }

    /// Numeric value with `0.0` standing in for "not available".
    pub fn value(&self) -> f64 {
        match self {
            TatxScore::Percent(v) => *v,
            TatxScore::NotAvailable => 0.0,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, TatxScore::Percent(_))
    }
}

impl From<f64> for TatxScore {
    fn from(value: f64) -> Self {
        if value.is_finite() && value > 0.0 {
            TatxScore::Percent(value)
        } else {
            TatxScore::NotAvailable
        }
    }
}

impl fmt::Display for TatxScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TatxScore::Percent(v) => f.write_str(&format_score(*v)),
            TatxScore::NotAvailable => f.write_str(NOT_AVAILABLE),
        }
    }
}

impl From<TatxScore> for String {
    fn from(score: TatxScore) -> Self {
        score.to_string()
    }
}

/// `(target / actual) × 100`, or `0.0` when either input is NaN or not
/// positive.
pub fn score(target: f64, actual: f64) -> f64 {
    if target.is_nan() || actual.is_nan() || target <= 0.0 || actual <= 0.0 {
        return 0.0;
    }
    (target / actual) * 100.0
}

/// Count-weighted mean of subpopulation scores.
///
/// Each part is `(score, sample_count)`. This averages the scores
/// themselves; it does not re-score pooled raw averages. Returns `0.0` when
/// the parts hold no samples.
pub fn weighted_overall(parts: &[(f64, u64)]) -> f64 {
    let (weighted, count) = parts
        .iter()
        .filter(|(_, count)| *count > 0)
        .fold((0.0_f64, 0_u64), |(sum, n), (score, count)| {
            let score = if score.is_finite() { *score } else { 0.0 };
            (sum + score * (*count as f64), n + count)
        });
    if count == 0 {
        return 0.0;
    }
    weighted / count as f64
}
