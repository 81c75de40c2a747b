use serde::{Deserialize, Serialize};

use super::RiskBand;

/// Approval recommendation carried on an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    Approve,
    Review,
    Reject,
}

impl Recommendation {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "APPROVE" => Some(Self::Approve),
            "REVIEW" => Some(Self::Review),
            "REJECT" => Some(Self::Reject),
            _ => None,
        }
    }

    pub const fn code(self) -> &'static str {
        match self {
            Recommendation::Approve => "APPROVE",
            Recommendation::Review => "REVIEW",
            Recommendation::Reject => "REJECT",
        }
    }
}

/// Lending ceiling offered to an applicant in a given band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanLimits {
    pub max_loan: u64,
    pub max_tenure_months: u32,
    pub interest_apr: f64,
}

/// Band-to-limits table plus the fallback recommendation used when the score source
/// carries none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskPolicy {
    pub low: LoanLimits,
    pub medium: LoanLimits,
    pub high: LoanLimits,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            low: LoanLimits {
                max_loan: 500_000,
                max_tenure_months: 48,
                interest_apr: 12.5,
            },
            medium: LoanLimits {
                max_loan: 250_000,
                max_tenure_months: 30,
                interest_apr: 16.0,
            },
            high: LoanLimits {
                max_loan: 100_000,
                max_tenure_months: 18,
                interest_apr: 22.0,
            },
        }
    }
}

impl RiskPolicy {
    /// Unknown applicants get the most conservative limits.
    pub fn limits_for(&self, band: RiskBand) -> LoanLimits {
        match band {
            RiskBand::Low => self.low,
            RiskBand::Medium => self.medium,
            RiskBand::High | RiskBand::Unknown => self.high,
        }
    }

    pub fn fallback_recommendation(&self, band: RiskBand) -> Recommendation {
        match band {
            RiskBand::Low => Recommendation::Approve,
            RiskBand::Medium | RiskBand::Unknown => Recommendation::Review,
            RiskBand::High => Recommendation::Reject,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_band_falls_back_to_high_risk_limits() {
        let policy = RiskPolicy::default();
        assert_eq!(policy.limits_for(RiskBand::Unknown), policy.limits_for(RiskBand::High));
        assert_eq!(policy.limits_for(RiskBand::Low).max_loan, 500_000);
        assert_eq!(policy.limits_for(RiskBand::Medium).max_tenure_months, 30);
    }

    #[test]
    fn fallback_recommendation_follows_band() {
        let policy = RiskPolicy::default();
        assert_eq!(policy.fallback_recommendation(RiskBand::Low), Recommendation::Approve);
        assert_eq!(policy.fallback_recommendation(RiskBand::Medium), Recommendation::Review);
        assert_eq!(policy.fallback_recommendation(RiskBand::High), Recommendation::Reject);
        assert_eq!(policy.fallback_recommendation(RiskBand::Unknown), Recommendation::Review);
    }

    #[test]
    fn recommendation_parsing_is_lenient_on_case() {
        assert_eq!(Recommendation::parse("approve"), Some(Recommendation::Approve));
        assert_eq!(Recommendation::parse("Decline"), None);
    }
}
