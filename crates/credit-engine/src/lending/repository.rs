use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::domain::{ApplicantId, Identity};

/// Applicant details shown next to an evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicantProfile {
    pub id: ApplicantId,
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub monthly_income: Option<u64>,
    #[serde(default)]
    pub employment_type: Option<String>,
}

impl ApplicantProfile {
    pub fn bare(id: ApplicantId) -> Self {
        Self {
            full_name: id.to_string(),
            id,
            phone: None,
            address: None,
            monthly_income: None,
            employment_type: None,
        }
    }
}

/// Latest output of the external scoring model. Every field is optional because the
/// upstream payload has drifted over time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreAssessment {
    #[serde(default)]
    pub credit_score: Option<f64>,
    #[serde(default, alias = "riskLevel")]
    pub risk_band: Option<String>,
    #[serde(default)]
    pub default_probability_percent: Option<f64>,
    #[serde(default)]
    pub loan_approval_recommendation: Option<String>,
    /// Legacy name for the recommendation. Kept only to detect divergence.
    #[serde(default)]
    pub decision: Option<String>,
    /// Factor ratings (0-100) keyed by factor name, e.g. `payment_history`.
    #[serde(default)]
    pub factors: BTreeMap<String, Value>,
}

/// Read-only collaborator supplying applicant details and scoring-model output.
pub trait ScoreSource: Send + Sync {
    fn applicant(&self, id: &ApplicantId) -> Result<Option<ApplicantProfile>, SourceError>;
    fn assessment(&self, id: &ApplicantId) -> Result<Option<ScoreAssessment>, SourceError>;
    /// Raw score-history records, oldest first.
    fn history(&self, id: &ApplicantId) -> Result<Vec<Value>, SourceError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    #[error("score source unavailable: {0}")]
    Unavailable(String),
}

/// Maps a bearer credential to the caller's identity.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, token: &str) -> Option<Identity>;
}
