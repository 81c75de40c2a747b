//! Read-only views composed from the score source, the ledger and the approval queue.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use super::approvals::{ApprovalRequest, ApprovalWorkflow};
use super::domain::{ApplicantId, LoanSummary, PaymentKind, PaymentRecord, PaymentStatus};
use super::error::LendingError;
use super::ledger::LoanLedger;
use super::repository::{ApplicantProfile, ScoreAssessment, ScoreSource};
use super::risk::{
    self, as_percentage, default_probability, key_factors, score_breakdown, KeyFactor,
    LoanLimits, Recommendation, RiskAssessment, RiskBand, RiskPolicy, ScoreFactor,
};
use super::trend::{self, TrendPoint};

const RECENT_ACTIVITY_LIMIT: usize = 8;
const UTILIZATION_WARN_PCT: f64 = 30.0;
const ON_TIME_GOOD_PCT: f64 = 95.0;

/// Dated score used on the approver's history chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPoint {
    pub date: String,
    pub score: f64,
}

impl From<TrendPoint> for HistoryPoint {
    fn from(point: TrendPoint) -> Self {
        Self {
            date: point.label,
            score: point.score,
        }
    }
}

/// Per-applicant record shown to approvers. Recomputed on every request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub evaluation_id: String,
    pub applicant_id: ApplicantId,
    pub credit_score: Option<f64>,
    pub risk_band: RiskBand,
    pub band_label: &'static str,
    pub priority: u8,
    pub default_probability_percent: f64,
    pub probability_of_default: f64,
    pub approval_recommendation: Recommendation,
    pub limits: LoanLimits,
    pub breakdown: Vec<ScoreFactor>,
    pub positive_factors: Vec<String>,
    pub negative_factors: Vec<String>,
    pub history: Vec<HistoryPoint>,
    pub pending_approvals: Vec<ApprovalRequest>,
    pub active_loans: Vec<LoanSummary>,
    pub data_quality_issues: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub applicant: ApplicantProfile,
    pub evaluation: Evaluation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub credit_score: Option<f64>,
    pub score_band: &'static str,
    pub risk_level: RiskBand,
    pub utilization: f64,
    pub on_time_payments: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Good,
    Warn,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub message: String,
}

/// Borrower home-screen summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub stats: DashboardStats,
    pub score_trend: Vec<TrendPoint>,
    pub recent_activity: Vec<PaymentRecord>,
    pub key_factors: Vec<KeyFactor>,
    pub alerts: Vec<Alert>,
}

pub struct EvaluationAggregator<S> {
    source: Arc<S>,
    ledger: Arc<LoanLedger>,
    workflow: Arc<ApprovalWorkflow>,
    policy: RiskPolicy,
}

impl<S> EvaluationAggregator<S>
where
    S: ScoreSource + 'static,
{
    pub fn new(
        source: Arc<S>,
        ledger: Arc<LoanLedger>,
        workflow: Arc<ApprovalWorkflow>,
        policy: RiskPolicy,
    ) -> Self {
        Self {
            source,
            ledger,
            workflow,
            policy,
        }
    }

    pub fn policy(&self) -> &RiskPolicy {
        &self.policy
    }

    /// Builds the approver view. Only a missing applicant is an error; every other failing
    /// input degrades to its default and is logged.
    pub fn evaluation(
        &self,
        applicant_id: &ApplicantId,
    ) -> Result<EvaluationReport, LendingError> {
        let applicant = match self.source.applicant(applicant_id) {
            Ok(Some(profile)) => profile,
            Ok(None) => return Err(LendingError::not_found("applicant", applicant_id)),
            Err(err) => {
                warn!(applicant = %applicant_id, error = %err, "applicant profile unavailable; using bare profile");
                ApplicantProfile::bare(applicant_id.clone())
            }
        };

        let mut issues = Vec::new();
        let assessment = self.assessment(applicant_id);
        let history = self.history(applicant_id);

        let credit_score = resolve_score(&assessment, &history, &mut issues);
        let utilization = self.utilization(applicant_id);
        let reported_percent = assessment
            .default_probability_percent
            .filter(|value| value.is_finite() && (0.0..=100.0).contains(value));

        let classification = match assessment.risk_band.as_deref().and_then(RiskBand::parse) {
            Some(band) => RiskAssessment::from(band),
            None => risk::classify(credit_score, reported_percent),
        };

        let (probability_of_default, default_probability_percent) = match reported_percent {
            Some(percent) => (percent / 100.0, percent),
            None => {
                let probability = default_probability(
                    credit_score.unwrap_or(risk::SCORE_RANGE.0),
                    classification.band,
                    utilization,
                );
                (probability, as_percentage(probability))
            }
        };

        let approval_recommendation =
            self.recommendation(applicant_id, &assessment, classification.band, &mut issues);
        let factors = score_breakdown(&assessment.factors, utilization.unwrap_or(0.0));

        let active_loans = self
            .ledger
            .open_loans(applicant_id)
            .iter()
            .map(|loan| loan.summary())
            .collect();

        let evaluation = Evaluation {
            evaluation_id: format!("EVAL-{applicant_id}"),
            applicant_id: applicant_id.clone(),
            credit_score,
            risk_band: classification.band,
            band_label: classification.label,
            priority: classification.priority,
            default_probability_percent,
            probability_of_default,
            approval_recommendation,
            limits: self.policy.limits_for(classification.band),
            breakdown: factors.factors,
            positive_factors: factors.positive_factors,
            negative_factors: factors.negative_factors,
            history: history.into_iter().map(HistoryPoint::from).collect(),
            pending_approvals: self.workflow.list_pending(applicant_id),
            active_loans,
            data_quality_issues: issues,
        };

        Ok(EvaluationReport {
            applicant,
            evaluation,
        })
    }

    /// Builds the borrower dashboard. Never fails; unavailable inputs show as empty.
    pub fn dashboard(&self, applicant_id: &ApplicantId) -> DashboardSummary {
        let mut issues = Vec::new();
        let assessment = self.assessment(applicant_id);
        let score_trend = self.history(applicant_id);
        let credit_score = resolve_score(&assessment, &score_trend, &mut issues);

        let risk_level = assessment
            .risk_band
            .as_deref()
            .and_then(RiskBand::parse)
            .unwrap_or_else(|| {
                risk::classify(credit_score, assessment.default_probability_percent).band
            });

        let raw_utilization = self.utilization(applicant_id).unwrap_or(0.0);
        let utilization = round_tenth(raw_utilization);
        let history = self.ledger.history(applicant_id);
        let on_time_payments = on_time_rate(&history);

        let mut recent_activity = history;
        recent_activity.reverse();
        recent_activity.truncate(RECENT_ACTIVITY_LIMIT);

        let stats = DashboardStats {
            credit_score,
            score_band: score_band(credit_score),
            risk_level,
            utilization,
            on_time_payments,
        };

        DashboardSummary {
            alerts: alerts(&stats),
            key_factors: key_factors(&assessment.factors, raw_utilization),
            stats,
            score_trend,
            recent_activity,
        }
    }

    fn assessment(&self, applicant_id: &ApplicantId) -> ScoreAssessment {
        match self.source.assessment(applicant_id) {
            Ok(Some(assessment)) => assessment,
            Ok(None) => ScoreAssessment::default(),
            Err(err) => {
                warn!(applicant = %applicant_id, error = %err, "score assessment unavailable; classifying without it");
                ScoreAssessment::default()
            }
        }
    }

    fn history(&self, applicant_id: &ApplicantId) -> Vec<TrendPoint> {
        match self.source.history(applicant_id) {
            Ok(records) => normalize_history(&records),
            Err(err) => {
                warn!(applicant = %applicant_id, error = %err, "score history unavailable; using empty history");
                Vec::new()
            }
        }
    }

    fn utilization(&self, applicant_id: &ApplicantId) -> Option<f64> {
        let exposure = self.ledger.exposure(applicant_id);
        (exposure.total_principal > 0).then(|| exposure.utilization_pct())
    }

    fn recommendation(
        &self,
        applicant_id: &ApplicantId,
        assessment: &ScoreAssessment,
        band: RiskBand,
        issues: &mut Vec<String>,
    ) -> Recommendation {
        let current = parse_recommendation(
            "loanApprovalRecommendation",
            assessment.loan_approval_recommendation.as_deref(),
            issues,
        );
        let legacy = parse_recommendation("decision", assessment.decision.as_deref(), issues);

        match (current, legacy) {
            (Some(current), Some(legacy)) if current != legacy => {
                warn!(
                    applicant = %applicant_id,
                    recommendation = current.code(),
                    decision = legacy.code(),
                    "score source recommendation diverges from legacy decision"
                );
                issues.push(format!(
                    "loanApprovalRecommendation {} differs from legacy decision {}",
                    current.code(),
                    legacy.code()
                ));
                current
            }
            (Some(current), _) => current,
            (None, Some(legacy)) => legacy,
            (None, None) => self.policy.fallback_recommendation(band),
        }
    }
}

/// A source may hand back a whole report payload instead of bare points; unwrap its series.
fn normalize_history(records: &[Value]) -> Vec<TrendPoint> {
    match records {
        [payload]
            if trend::SERIES_FIELDS
                .iter()
                .any(|field| payload.get(*field).is_some()) =>
        {
            trend::extract_series(payload)
        }
        _ => trend::normalize_points(records),
    }
}

fn resolve_score(
    assessment: &ScoreAssessment,
    history: &[TrendPoint],
    issues: &mut Vec<String>,
) -> Option<f64> {
    let candidate = assessment
        .credit_score
        .or_else(|| history.last().map(|point| point.score))?;

    if risk::in_score_range(candidate) {
        Some(candidate)
    } else {
        issues.push(format!(
            "credit score {candidate} is outside {}-{} and was ignored",
            risk::SCORE_RANGE.0,
            risk::SCORE_RANGE.1
        ));
        None
    }
}

fn parse_recommendation(
    field: &str,
    raw: Option<&str>,
    issues: &mut Vec<String>,
) -> Option<Recommendation> {
    let raw = raw.filter(|value| !value.trim().is_empty())?;
    let parsed = Recommendation::parse(raw);
    if parsed.is_none() {
        issues.push(format!("{field} '{raw}' is not a recognised recommendation"));
    }
    parsed
}

fn on_time_rate(history: &[PaymentRecord]) -> Option<f64> {
    let settlements: Vec<&PaymentRecord> = history
        .iter()
        .filter(|record| record.kind == PaymentKind::Settlement)
        .collect();
    if settlements.is_empty() {
        return None;
    }
    let on_time = settlements
        .iter()
        .filter(|record| record.status == PaymentStatus::OnTime)
        .count();
    Some(round_tenth(on_time as f64 / settlements.len() as f64 * 100.0))
}

fn score_band(score: Option<f64>) -> &'static str {
    match score {
        Some(score) if score >= 700.0 => "Good",
        Some(score) if score >= 650.0 => "Fair",
        Some(_) => "Needs work",
        None => "Unknown",
    }
}

fn alerts(stats: &DashboardStats) -> Vec<Alert> {
    let mut alerts = Vec::new();
    if stats.utilization >= UTILIZATION_WARN_PCT {
        alerts.push(Alert {
            level: AlertLevel::Warn,
            message: format!(
                "Credit utilization is at {}%. Keeping it under 30% helps your score.",
                stats.utilization
            ),
        });
    }
    if let Some(rate) = stats.on_time_payments.filter(|rate| *rate >= ON_TIME_GOOD_PCT) {
        alerts.push(Alert {
            level: AlertLevel::Good,
            message: format!("{rate}% of your payments were on time."),
        });
    }
    if alerts.is_empty() {
        alerts.push(Alert {
            level: AlertLevel::Warn,
            message: "Add payment records to get personalised insights.".to_string(),
        });
    }
    alerts
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn score_bands_follow_dashboard_thresholds() {
        assert_eq!(score_band(Some(720.0)), "Good");
        assert_eq!(score_band(Some(650.0)), "Fair");
        assert_eq!(score_band(Some(640.0)), "Needs work");
        assert_eq!(score_band(None), "Unknown");
    }

    #[test]
    fn report_payloads_are_unwrapped() {
        let wrapped = vec![json!({"score_trend": [{"month": "Jan", "score": 690}]})];
        let points = normalize_history(&wrapped);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].label, "Jan");

        let bare = vec![json!({"month": "Jan", "score": 690}), json!({"value": 700})];
        assert_eq!(normalize_history(&bare).len(), 2);
    }

    #[test]
    fn out_of_range_scores_are_reported_and_dropped() {
        let mut issues = Vec::new();
        let assessment = ScoreAssessment {
            credit_score: Some(1_250.0),
            ..ScoreAssessment::default()
        };
        assert_eq!(resolve_score(&assessment, &[], &mut issues), None);
        assert_eq!(issues.len(), 1);

        let history = vec![TrendPoint {
            label: "Feb".to_string(),
            score: 688.0,
        }];
        let mut issues = Vec::new();
        assert_eq!(
            resolve_score(&ScoreAssessment::default(), &history, &mut issues),
            Some(688.0)
        );
        assert!(issues.is_empty());
    }

    #[test]
    fn alerts_fall_back_to_a_prompt() {
        let mut stats = DashboardStats {
            credit_score: Some(700.0),
            score_band: "Good",
            risk_level: RiskBand::Low,
            utilization: 12.0,
            on_time_payments: None,
        };
        let prompt = alerts(&stats);
        assert_eq!(prompt.len(), 1);
        assert_eq!(prompt[0].level, AlertLevel::Warn);

        stats.utilization = 45.0;
        stats.on_time_payments = Some(100.0);
        let levels: Vec<_> = alerts(&stats).iter().map(|alert| alert.level).collect();
        assert_eq!(levels, vec![AlertLevel::Warn, AlertLevel::Good]);
    }
}
