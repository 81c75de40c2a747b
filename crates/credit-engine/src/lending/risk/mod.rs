mod factors;
mod policy;
mod probability;

pub use factors::{key_factors, score_breakdown, FactorBreakdown, KeyFactor, ScoreFactor};
pub use policy::{LoanLimits, Recommendation, RiskPolicy};
pub use probability::{as_percentage, default_probability};

use serde::{Deserialize, Serialize};

/// Lowest and highest credit score the bureau scale produces.
pub const SCORE_RANGE: (f64, f64) = (300.0, 900.0);

const LOW_RISK_MIN_SCORE: f64 = 700.0;
const MEDIUM_RISK_MIN_SCORE: f64 = 650.0;
const LOW_RISK_MAX_DEFAULT_PERCENT: f64 = 25.0;
const MEDIUM_RISK_MAX_DEFAULT_PERCENT: f64 = 40.0;

/// Coarse risk classification shown to approvers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskBand {
    Low,
    Medium,
    High,
    Unknown,
}

impl RiskBand {
    /// Recognises a band reported by an upstream source; anything else is `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "LOW" => Some(Self::Low),
            "MEDIUM" => Some(Self::Medium),
            "HIGH" => Some(Self::High),
            _ => None,
        }
    }

    pub const fn code(self) -> &'static str {
        match self {
            RiskBand::Low => "LOW",
            RiskBand::Medium => "MEDIUM",
            RiskBand::High => "HIGH",
            RiskBand::Unknown => "UNKNOWN",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            RiskBand::Low => "Low Risk",
            RiskBand::Medium => "Medium Risk",
            RiskBand::High => "High Risk",
            RiskBand::Unknown => "Unknown",
        }
    }

    /// Sorting/alerting weight, higher is more urgent.
    pub const fn priority(self) -> u8 {
        match self {
            RiskBand::High => 3,
            RiskBand::Medium => 2,
            RiskBand::Unknown => 1,
            RiskBand::Low => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub band: RiskBand,
    pub label: &'static str,
    pub priority: u8,
}

impl From<RiskBand> for RiskAssessment {
    fn from(band: RiskBand) -> Self {
        Self {
            band,
            label: band.label(),
            priority: band.priority(),
        }
    }
}

/// Derives the display band from a credit score, falling back to the default probability
/// when the score is missing or off-scale. Never fails.
pub fn classify(score: Option<f64>, default_probability_percent: Option<f64>) -> RiskAssessment {
    let band = score
        .filter(|value| in_score_range(*value))
        .map(band_for_score)
        .or_else(|| {
            default_probability_percent
                .filter(|value| value.is_finite() && (0.0..=100.0).contains(value))
                .map(band_for_default_probability)
        })
        .unwrap_or(RiskBand::Unknown);

    RiskAssessment::from(band)
}

pub fn in_score_range(score: f64) -> bool {
    score.is_finite() && (SCORE_RANGE.0..=SCORE_RANGE.1).contains(&score)
}

fn band_for_score(score: f64) -> RiskBand {
    if score >= LOW_RISK_MIN_SCORE {
        RiskBand::Low
    } else if score >= MEDIUM_RISK_MIN_SCORE {
        RiskBand::Medium
    } else {
        RiskBand::High
    }
}

fn band_for_default_probability(percent: f64) -> RiskBand {
    if percent <= LOW_RISK_MAX_DEFAULT_PERCENT {
        RiskBand::Low
    } else if percent <= MEDIUM_RISK_MAX_DEFAULT_PERCENT {
        RiskBand::Medium
    } else {
        RiskBand::High
    }
}
