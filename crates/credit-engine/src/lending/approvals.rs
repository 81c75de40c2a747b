use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{ApplicantId, Loan, LoanId, RequestId};
use super::error::LendingError;
use super::ledger::{check_settlement, LoanLedger};
use super::locks::{lock, read, write};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestKind {
    Loan,
    Settlement,
}

impl RequestKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "LOAN" => Some(Self::Loan),
            "SETTLEMENT" => Some(Self::Settlement),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            RequestKind::Loan => "LOAN",
            RequestKind::Settlement => "SETTLEMENT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Approved => "APPROVED",
            RequestStatus::Rejected => "REJECTED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalAction {
    Approve,
    Reject,
}

impl ApprovalAction {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "APPROVE" | "APPROVED" | "ACCEPT" => Some(Self::Approve),
            "REJECT" | "REJECTED" | "DECLINE" => Some(Self::Reject),
            _ => None,
        }
    }

    const fn outcome(self) -> RequestStatus {
        match self {
            ApprovalAction::Approve => RequestStatus::Approved,
            ApprovalAction::Reject => RequestStatus::Rejected,
        }
    }
}

/// A loan or settlement awaiting an approver's decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub request_id: RequestId,
    pub kind: RequestKind,
    pub applicant: ApplicantId,
    pub loan_id: LoanId,
    pub amount: u64,
    pub status: RequestStatus,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

type Shared<T> = Arc<Mutex<T>>;

/// Pending-approval state machine. Requests are never removed; resolved ones stay so that a
/// replayed decision reports the original outcome.
pub struct ApprovalWorkflow {
    ledger: Arc<LoanLedger>,
    requests: RwLock<HashMap<RequestId, Shared<ApprovalRequest>>>,
    sequence: AtomicU64,
}

impl ApprovalWorkflow {
    pub fn new(ledger: Arc<LoanLedger>) -> Self {
        Self {
            ledger,
            requests: RwLock::new(HashMap::new()),
            sequence: AtomicU64::new(1),
        }
    }

    pub fn submit_loan(&self, loan: &Loan) -> ApprovalRequest {
        let request = ApprovalRequest {
            request_id: self.next_id(),
            kind: RequestKind::Loan,
            applicant: loan.owner.clone(),
            loan_id: loan.id.clone(),
            amount: loan.principal,
            status: RequestStatus::Pending,
            title: loan.title().to_string(),
            purpose: Some(loan.purpose.clone()),
            created_at: Utc::now(),
            resolved_by: None,
            resolved_at: None,
        };
        self.store(request)
    }

    /// Queue a settlement for sign-off. The amount is checked against the balance now and
    /// again when the request is approved.
    pub fn submit_settlement(
        &self,
        owner: &ApplicantId,
        loan_id: &LoanId,
        amount: i64,
    ) -> Result<ApprovalRequest, LendingError> {
        let loan = self.ledger.get(loan_id)?;
        if &loan.owner != owner {
            return Err(LendingError::not_found("loan", loan_id));
        }
        let amount = check_settlement(&loan, amount)?;

        let request = ApprovalRequest {
            request_id: self.next_id(),
            kind: RequestKind::Settlement,
            applicant: owner.clone(),
            loan_id: loan.id.clone(),
            amount,
            status: RequestStatus::Pending,
            title: format!("{} settlement", loan.title()),
            purpose: None,
            created_at: Utc::now(),
            resolved_by: None,
            resolved_at: None,
        };
        Ok(self.store(request))
    }

    /// Pending requests for an applicant, oldest first.
    pub fn list_pending(&self, applicant: &ApplicantId) -> Vec<ApprovalRequest> {
        let entries: Vec<Shared<ApprovalRequest>> =
            read(&self.requests).values().cloned().collect();

        let mut pending: Vec<ApprovalRequest> = entries
            .iter()
            .map(|entry| lock(entry).clone())
            .filter(|request| {
                &request.applicant == applicant && request.status == RequestStatus::Pending
            })
            .collect();
        pending.sort_by(|a, b| a.request_id.cmp(&b.request_id));
        pending
    }

    pub fn get(&self, request_id: &RequestId) -> Result<ApprovalRequest, LendingError> {
        let entry = self.entry(request_id)?;
        let request = lock(&entry).clone();
        Ok(request)
    }

    /// Apply an approver decision exactly once. The request lock is held across the status
    /// check, the ledger effect and the status write, so concurrent deciders serialize and
    /// all but the first observe `AlreadyResolved`.
    pub fn resolve(
        &self,
        applicant: &ApplicantId,
        kind: RequestKind,
        request_id: &RequestId,
        action: ApprovalAction,
        actor: &str,
        today: NaiveDate,
    ) -> Result<ApprovalRequest, LendingError> {
        let entry = self.entry(request_id)?;
        let mut request = lock(&entry);

        if &request.applicant != applicant || request.kind != kind {
            return Err(LendingError::not_found("approval request", request_id));
        }
        if request.status != RequestStatus::Pending {
            return Err(LendingError::AlreadyResolved {
                request_id: request_id.to_string(),
                status: request.status,
            });
        }

        if action == ApprovalAction::Approve {
            self.apply(&request, today).map_err(|err| {
                warn!(request_id = %request.request_id, error = %err, "approval effect failed; request stays pending");
                err
            })?;
        }

        request.status = action.outcome();
        request.resolved_by = Some(actor.to_string());
        request.resolved_at = Some(Utc::now());

        info!(
            request_id = %request.request_id,
            kind = request.kind.label(),
            status = request.status.label(),
            actor,
            "approval request resolved"
        );
        Ok(request.clone())
    }

    fn apply(&self, request: &ApprovalRequest, today: NaiveDate) -> Result<(), LendingError> {
        match request.kind {
            RequestKind::Loan => {
                self.ledger.confirm(&request.loan_id, today)?;
            }
            RequestKind::Settlement => {
                let amount = i64::try_from(request.amount)
                    .map_err(|_| LendingError::validation("amount", "exceeds supported range"))?;
                self.ledger.settle(&request.loan_id, amount, today)?;
            }
        }
        Ok(())
    }

    fn entry(&self, request_id: &RequestId) -> Result<Shared<ApprovalRequest>, LendingError> {
        read(&self.requests)
            .get(request_id)
            .cloned()
            .ok_or_else(|| LendingError::not_found("approval request", request_id))
    }

    fn store(&self, request: ApprovalRequest) -> ApprovalRequest {
        write(&self.requests).insert(
            request.request_id.clone(),
            Arc::new(Mutex::new(request.clone())),
        );
        info!(
            request_id = %request.request_id,
            kind = request.kind.label(),
            loan_id = %request.loan_id,
            amount = request.amount,
            "approval request submitted"
        );
        request
    }

    fn next_id(&self) -> RequestId {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed);
        RequestId(format!("REQ-{id:06}"))
    }
}
