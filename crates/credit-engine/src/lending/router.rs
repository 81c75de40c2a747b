use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::approvals::{ApprovalAction, RequestKind};
use super::domain::{ApplicantId, Identity, LoanId, RequestId, TakeLoanRequest};
use super::error::LendingError;
use super::repository::{IdentityResolver, ScoreSource};
use super::service::{CreditEngine, SettlementOutcome};

/// Shared handler state: the engine plus the credential resolver.
pub struct LendingState<S, I> {
    engine: Arc<CreditEngine<S>>,
    identities: Arc<I>,
}

impl<S, I> Clone for LendingState<S, I> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            identities: Arc::clone(&self.identities),
        }
    }
}

/// Router builder exposing the borrower and approver endpoints.
pub fn lending_router<S, I>(engine: Arc<CreditEngine<S>>, identities: Arc<I>) -> Router
where
    S: ScoreSource + 'static,
    I: IdentityResolver + 'static,
{
    Router::new()
        .route("/api/v1/dashboard", get(dashboard_handler::<S, I>))
        .route(
            "/api/v1/evaluations/:applicant_id",
            get(evaluation_handler::<S, I>),
        )
        .route(
            "/api/v1/evaluations/:applicant_id/approval",
            post(approval_handler::<S, I>),
        )
        .route(
            "/api/v1/payments/loans",
            get(loans_handler::<S, I>).post(take_loan_handler::<S, I>),
        )
        .route("/api/v1/payments/settle", post(settle_handler::<S, I>))
        .route("/api/v1/payments/history", get(history_handler::<S, I>))
        .with_state(LendingState { engine, identities })
}

/// Whole-currency amount read from a number or a display string such as `"Rs. 1,000"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Money(pub i64);

impl Money {
    /// A missing value reads as 0 so that ledger validation names the field. Fractions,
    /// exponents and any other stray characters are rejected on `field`.
    pub fn parse(field: &'static str, value: &Value) -> Result<Self, LendingError> {
        let invalid = || LendingError::validation(field, "must be a whole currency amount");
        match value {
            Value::Null => Ok(Money(0)),
            Value::Number(number) => match number.as_i64() {
                Some(amount) => Ok(Money(amount)),
                None => number
                    .as_f64()
                    .filter(|amount| amount.fract() == 0.0 && amount.abs() < i64::MAX as f64)
                    .map(|amount| Money(amount as i64))
                    .ok_or_else(invalid),
            },
            Value::String(text) if text.trim().is_empty() => Ok(Money(0)),
            Value::String(text) => parse_amount_text(text).map(Money).ok_or_else(invalid),
            _ => Err(invalid()),
        }
    }
}

fn parse_amount_text(text: &str) -> Option<i64> {
    let body = text
        .trim()
        .trim_start_matches(|c: char| c.is_alphabetic() || matches!(c, '.' | ' ' | '₹'));
    let (negative, digits) = match body.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, body),
    };

    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty()
        || !fraction.chars().all(|c| c == '0')
        || !whole.chars().all(|c| c.is_ascii_digit() || c == ',')
    {
        return None;
    }

    let whole: String = whole.chars().filter(|c| *c != ',').collect();
    let amount = whole.parse::<i64>().ok()?;
    Some(if negative { -amount } else { amount })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TakeLoanBody {
    #[serde(default)]
    category: String,
    #[serde(default)]
    amount: Value,
    #[serde(default, alias = "tenure", alias = "tenure_months")]
    tenure_months: Value,
    #[serde(default)]
    purpose: String,
    #[serde(default, alias = "employment_type")]
    employment_type: String,
    #[serde(default)]
    income: Value,
}

impl TryFrom<TakeLoanBody> for TakeLoanRequest {
    type Error = LendingError;

    fn try_from(body: TakeLoanBody) -> Result<Self, Self::Error> {
        let tenure_months = match body.tenure_months {
            Value::Null => None,
            ref raw => {
                let months = Money::parse("tenureMonths", raw)?;
                Some(u32::try_from(months.0).unwrap_or(0))
            }
        };

        Ok(Self {
            category: body.category,
            amount: Money::parse("amount", &body.amount)?.0,
            tenure_months,
            purpose: body.purpose,
            employment_type: body.employment_type,
            income: Money::parse("income", &body.income)?.0,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SettleBody {
    #[serde(default, alias = "loan_id", alias = "id", alias = "account_id")]
    loan_id: String,
    #[serde(default, alias = "payAmount", alias = "paymentAmount")]
    amount: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApprovalBody {
    #[serde(default, alias = "request_type", alias = "type")]
    request_type: String,
    #[serde(default, alias = "request_id")]
    request_id: String,
    #[serde(default)]
    action: String,
}

pub(crate) async fn dashboard_handler<S, I>(
    State(state): State<LendingState<S, I>>,
    headers: HeaderMap,
) -> Response
where
    S: ScoreSource + 'static,
    I: IdentityResolver + 'static,
{
    let identity = match authenticate(state.identities.as_ref(), &headers) {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    let summary = state.engine.dashboard(&identity);
    (StatusCode::OK, axum::Json(summary)).into_response()
}

pub(crate) async fn evaluation_handler<S, I>(
    State(state): State<LendingState<S, I>>,
    Path(applicant_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    S: ScoreSource + 'static,
    I: IdentityResolver + 'static,
{
    if let Err(response) = authorize_admin(state.identities.as_ref(), &headers) {
        return response;
    }

    let applicant = ApplicantId::canonical(&applicant_id);
    match state.engine.evaluation(&applicant) {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn approval_handler<S, I>(
    State(state): State<LendingState<S, I>>,
    Path(applicant_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    S: ScoreSource + 'static,
    I: IdentityResolver + 'static,
{
    let actor = match authorize_admin(state.identities.as_ref(), &headers) {
        Ok(identity) => identity,
        Err(response) => return response,
    };
    let body: ApprovalBody = match decode_body(&body) {
        Ok(body) => body,
        Err(response) => return response,
    };

    let Some(kind) = RequestKind::parse(&body.request_type) else {
        return error_response(&LendingError::validation(
            "requestType",
            "must be LOAN or SETTLEMENT",
        ));
    };
    let Some(action) = ApprovalAction::parse(&body.action) else {
        return error_response(&LendingError::validation(
            "action",
            "must be APPROVE or REJECT",
        ));
    };
    if body.request_id.trim().is_empty() {
        return error_response(&LendingError::validation("requestId", "is required"));
    }

    let applicant = ApplicantId::canonical(&applicant_id);
    let request_id = RequestId(body.request_id.trim().to_string());
    let today = Utc::now().date_naive();

    match state
        .engine
        .resolve(&applicant, kind, &request_id, action, &actor, today)
    {
        Ok(request) => {
            let message = format!(
                "{} request {}",
                kind.label().to_lowercase(),
                request.status.label().to_lowercase()
            );
            let payload = json!({
                "message": message,
                "status": request.status.label(),
                "requestId": request.request_id,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn loans_handler<S, I>(
    State(state): State<LendingState<S, I>>,
    headers: HeaderMap,
) -> Response
where
    S: ScoreSource + 'static,
    I: IdentityResolver + 'static,
{
    let identity = match authenticate(state.identities.as_ref(), &headers) {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    let payload = json!({ "loans": state.engine.loans(&identity) });
    (StatusCode::OK, axum::Json(payload)).into_response()
}

pub(crate) async fn take_loan_handler<S, I>(
    State(state): State<LendingState<S, I>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    S: ScoreSource + 'static,
    I: IdentityResolver + 'static,
{
    let identity = match authenticate(state.identities.as_ref(), &headers) {
        Ok(identity) => identity,
        Err(response) => return response,
    };
    let request = match decode_body::<TakeLoanBody>(&body).and_then(|body| {
        TakeLoanRequest::try_from(body).map_err(|err| error_response(&err))
    }) {
        Ok(request) => request,
        Err(response) => return response,
    };

    match state.engine.take_loan(&identity, request) {
        Ok(application) => {
            let payload = json!({
                "message": "Loan request submitted for approval",
                "loan": application.loan,
                "approval": application.approval,
            });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn settle_handler<S, I>(
    State(state): State<LendingState<S, I>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    S: ScoreSource + 'static,
    I: IdentityResolver + 'static,
{
    let identity = match authenticate(state.identities.as_ref(), &headers) {
        Ok(identity) => identity,
        Err(response) => return response,
    };
    let body: SettleBody = match decode_body(&body) {
        Ok(body) => body,
        Err(response) => return response,
    };

    if body.loan_id.trim().is_empty() {
        return error_response(&LendingError::validation("loanId", "is required"));
    }
    let amount = match Money::parse("amount", &body.amount) {
        Ok(amount) => amount,
        Err(err) => return error_response(&err),
    };

    let loan_id = LoanId(body.loan_id.trim().to_string());
    let today = Utc::now().date_naive();
    match state.engine.settle(&identity, &loan_id, amount.0, today) {
        Ok(SettlementOutcome::Committed(settlement)) => {
            let message = if settlement.closed {
                "Loan settled and closed"
            } else {
                "Payment recorded"
            };
            let payload = json!({
                "message": message,
                "remainingBalance": settlement.remaining_balance,
                "closed": settlement.closed,
                "payment": settlement.payment,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Ok(SettlementOutcome::Pending {
            approval,
            remaining_balance,
        }) => {
            let payload = json!({
                "message": "Settlement submitted for approval",
                "remainingBalance": remaining_balance,
                "closed": false,
                "approval": approval,
            });
            (StatusCode::ACCEPTED, axum::Json(payload)).into_response()
        }
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn history_handler<S, I>(
    State(state): State<LendingState<S, I>>,
    headers: HeaderMap,
) -> Response
where
    S: ScoreSource + 'static,
    I: IdentityResolver + 'static,
{
    let identity = match authenticate(state.identities.as_ref(), &headers) {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    let payload = json!({ "history": state.engine.history(&identity) });
    (StatusCode::OK, axum::Json(payload)).into_response()
}

/// Bodies are decoded only after the caller is authenticated.
fn decode_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, Response> {
    serde_json::from_slice(body).map_err(|err| {
        let payload = json!({ "error": format!("invalid JSON body: {err}") });
        (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
    })
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim()).filter(|token| !token.is_empty())
}

fn authenticate<I: IdentityResolver>(
    identities: &I,
    headers: &HeaderMap,
) -> Result<Identity, Response> {
    bearer_token(headers)
        .and_then(|token| identities.resolve(token))
        .ok_or_else(|| {
            let payload = json!({ "error": "missing or invalid bearer token" });
            (StatusCode::UNAUTHORIZED, axum::Json(payload)).into_response()
        })
}

fn authorize_admin<I: IdentityResolver>(
    identities: &I,
    headers: &HeaderMap,
) -> Result<Identity, Response> {
    let identity = authenticate(identities, headers)?;
    if !identity.is_admin {
        let payload = json!({ "error": "admin access required" });
        return Err((StatusCode::FORBIDDEN, axum::Json(payload)).into_response());
    }
    Ok(identity)
}

fn error_response(err: &LendingError) -> Response {
    let payload = match err {
        LendingError::Validation { field, .. } => json!({
            "error": err.to_string(),
            "field": field,
        }),
        LendingError::AlreadyResolved { status, .. } => json!({
            "error": err.to_string(),
            "status": status.label(),
        }),
        other => json!({
            "error": other.to_string(),
        }),
    };
    (err.status_code(), axum::Json(payload)).into_response()
}
