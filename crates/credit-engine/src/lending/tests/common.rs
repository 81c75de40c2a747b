use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::http::StatusCode;
use axum::response::Response;
use chrono::NaiveDate;
use serde_json::{json, Value};

use crate::lending::domain::{ApplicantId, Identity, TakeLoanRequest};
use crate::lending::repository::{
    ApplicantProfile, IdentityResolver, ScoreAssessment, ScoreSource, SourceError,
};
use crate::lending::{lending_router, CreditEngine, LendingPolicy};

pub(super) const ADMIN_TOKEN: &str = "admin-token";
pub(super) const BORROWER_TOKEN: &str = "borrower-token";
pub(super) const OTHER_BORROWER_TOKEN: &str = "other-borrower-token";

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 4, 1).expect("valid date")
}

pub(super) fn borrower() -> Identity {
    Identity {
        applicant_id: ApplicantId::canonical("1"),
        is_admin: false,
    }
}

pub(super) fn other_borrower() -> Identity {
    Identity {
        applicant_id: ApplicantId::canonical("2"),
        is_admin: false,
    }
}

pub(super) fn admin() -> Identity {
    Identity {
        applicant_id: ApplicantId("ops-admin".to_string()),
        is_admin: true,
    }
}

pub(super) fn loan_request(amount: i64) -> TakeLoanRequest {
    TakeLoanRequest {
        category: "general".to_string(),
        amount,
        tenure_months: Some(12),
        purpose: "Home repairs".to_string(),
        employment_type: "salaried".to_string(),
        income: 90_000,
    }
}

pub(super) fn immediate_settlement() -> LendingPolicy {
    LendingPolicy {
        settlement_requires_approval: false,
        ..LendingPolicy::default()
    }
}

pub(super) fn profile(id: &ApplicantId) -> ApplicantProfile {
    ApplicantProfile {
        id: id.clone(),
        full_name: "Asha Verma".to_string(),
        phone: Some("+91 98200 00000".to_string()),
        address: Some("12 MG Road, Pune".to_string()),
        monthly_income: Some(90_000),
        employment_type: Some("salaried".to_string()),
    }
}

pub(super) fn scored_source(assessment: ScoreAssessment) -> MemoryScoreSource {
    let applicant = borrower().applicant_id;
    let source = MemoryScoreSource::default();
    source.insert_profile(profile(&applicant));
    source.insert_assessment(&applicant, assessment);
    source.insert_history(
        &applicant,
        vec![
            json!({"month": "Jan", "credit_score": 702}),
            json!({"month": "Feb", "score": "715"}),
            json!({"value": 0}),
            json!({"period": "Mar", "value": 721}),
        ],
    );
    source
}

pub(super) fn build_engine(
    source: MemoryScoreSource,
    policy: LendingPolicy,
) -> Arc<CreditEngine<MemoryScoreSource>> {
    Arc::new(CreditEngine::new(Arc::new(source), policy))
}

pub(super) fn router_for(engine: Arc<CreditEngine<MemoryScoreSource>>) -> axum::Router {
    lending_router(engine, Arc::new(StaticIdentities::standard()))
}

#[derive(Default, Clone)]
pub(super) struct MemoryScoreSource {
    profiles: Arc<Mutex<HashMap<ApplicantId, ApplicantProfile>>>,
    assessments: Arc<Mutex<HashMap<ApplicantId, ScoreAssessment>>>,
    history: Arc<Mutex<HashMap<ApplicantId, Vec<Value>>>>,
}

impl MemoryScoreSource {
    pub(super) fn insert_profile(&self, profile: ApplicantProfile) {
        self.profiles
            .lock()
            .expect("profile mutex poisoned")
            .insert(profile.id.clone(), profile);
    }

    pub(super) fn insert_assessment(&self, id: &ApplicantId, assessment: ScoreAssessment) {
        self.assessments
            .lock()
            .expect("assessment mutex poisoned")
            .insert(id.clone(), assessment);
    }

    pub(super) fn insert_history(&self, id: &ApplicantId, records: Vec<Value>) {
        self.history
            .lock()
            .expect("history mutex poisoned")
            .insert(id.clone(), records);
    }
}

impl ScoreSource for MemoryScoreSource {
    fn applicant(&self, id: &ApplicantId) -> Result<Option<ApplicantProfile>, SourceError> {
        let guard = self.profiles.lock().expect("profile mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn assessment(&self, id: &ApplicantId) -> Result<Option<ScoreAssessment>, SourceError> {
        let guard = self.assessments.lock().expect("assessment mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn history(&self, id: &ApplicantId) -> Result<Vec<Value>, SourceError> {
        let guard = self.history.lock().expect("history mutex poisoned");
        Ok(guard.get(id).cloned().unwrap_or_default())
    }
}

/// Knows the applicant but cannot reach the scoring model.
pub(super) struct DegradedScoreSource {
    pub(super) profile: ApplicantProfile,
}

impl ScoreSource for DegradedScoreSource {
    fn applicant(&self, _id: &ApplicantId) -> Result<Option<ApplicantProfile>, SourceError> {
        Ok(Some(self.profile.clone()))
    }

    fn assessment(&self, _id: &ApplicantId) -> Result<Option<ScoreAssessment>, SourceError> {
        Err(SourceError::Unavailable("scoring model offline".to_string()))
    }

    fn history(&self, _id: &ApplicantId) -> Result<Vec<Value>, SourceError> {
        Err(SourceError::Unavailable("history store offline".to_string()))
    }
}

pub(super) struct StaticIdentities {
    identities: HashMap<String, Identity>,
}

impl StaticIdentities {
    pub(super) fn standard() -> Self {
        let mut identities = HashMap::new();
        identities.insert(ADMIN_TOKEN.to_string(), admin());
        identities.insert(BORROWER_TOKEN.to_string(), borrower());
        identities.insert(OTHER_BORROWER_TOKEN.to_string(), other_borrower());
        Self { identities }
    }
}

impl IdentityResolver for StaticIdentities {
    fn resolve(&self, token: &str) -> Option<Identity> {
        self.identities.get(token).cloned()
    }
}

pub(super) fn json_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Value,
) -> axum::http::Request<axum::body::Body> {
    raw_request(
        method,
        uri,
        token,
        serde_json::to_vec(&body).expect("serialize body"),
    )
}

pub(super) fn raw_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: impl Into<axum::body::Body>,
) -> axum::http::Request<axum::body::Body> {
    let mut builder = axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .header(axum::http::header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(
            axum::http::header::AUTHORIZATION,
            format!("Bearer {token}"),
        );
    }
    builder.body(body.into()).expect("request builds")
}

pub(super) fn get_request(
    uri: &str,
    token: Option<&str>,
) -> axum::http::Request<axum::body::Body> {
    let mut builder = axum::http::Request::get(uri);
    if let Some(token) = token {
        builder = builder.header(
            axum::http::header::AUTHORIZATION,
            format!("Bearer {token}"),
        );
    }
    builder
        .body(axum::body::Body::empty())
        .expect("request builds")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn assert_status(response: &Response, expected: StatusCode) {
    assert_eq!(response.status(), expected);
}
